// src/error.rs

//! Unified error handling for the grade synchronizer.

use std::fmt;

use thiserror::Error;

/// Result type alias for synchronizer operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Session or login failure
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Non-2xx response or failed request for a resource
    #[error("Transport error for {url}: {message}")]
    Transport {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Expected page structure was absent
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Snapshot store failure
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// A sync run is already executing on this engine
    #[error("sync already in progress")]
    AlreadyInProgress,

    /// The session could not be established for a run
    #[error("authentication failed: {0}")]
    AuthenticationFailed(SessionError),

    /// The overview page could not be fetched or parsed
    #[error("overview fetch failed for {url}: {message}")]
    OverviewFetchFailed { url: String, message: String },

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an extraction error.
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    /// Create a transport error for a response with an unexpected status.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Transport {
            url: url.into(),
            status: Some(status),
            message: format!("unexpected status {status}"),
        }
    }

    /// True if this is the snapshot store's "never synced" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Snapshot(SnapshotError::NotFound { .. }))
    }
}

/// Authentication state failures.
///
/// Cloneable so that a single login attempt can report the same outcome to
/// every caller that joined it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("not logged in")]
    NotAuthenticated,

    #[error("wrong credentials")]
    WrongCredentials,

    #[error("could not find login form on the page")]
    LoginFormNotFound,

    #[error("login form does not have an action attribute")]
    MissingFormAction,

    #[error("invalid login form action '{0}'")]
    InvalidFormAction(String),

    #[error("login was not accepted")]
    LoginRejected,

    #[error("login request failed: {0}")]
    Transport(String),
}

/// Snapshot store failures.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// No snapshot was ever written for this entity.
    #[error("no snapshot for '{entity}'")]
    NotFound { entity: String },

    #[error("snapshot I/O failed for '{entity}': {source}")]
    Io {
        entity: String,
        #[source]
        source: std::io::Error,
    },

    /// The file header names a schema this build cannot read.
    #[error("snapshot for '{entity}' uses unsupported schema '{found}'")]
    SchemaMismatch { entity: String, found: String },
}
