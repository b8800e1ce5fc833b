// src/services/session.rs

//! Cookie-session management against the Moodle login flow.
//!
//! - `is_authenticated`: probe the home page
//! - `login`: submit the login form; concurrent callers share one attempt
//! - `fetch`: GET a page, re-authenticating once if the session was lost

use std::fmt;
use std::sync::{Arc, Mutex};

use scraper::{ElementRef, Html};
use url::Url;

use super::transport::PageTransport;
use crate::error::{AppError, Result, SessionError};
use crate::models::{Config, LoginConfig};
use crate::utils::{SingleFlight, contains_any_ignore_case, resolve_url};

/// Authentication state of the shared cookie jar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// Login credentials.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// True when a response was served from somewhere other than the requested
/// resource, which means the server bounced us to its login page.
pub fn response_indicates_session_loss(requested: &Url, final_url: &Url) -> bool {
    let mut requested = requested.clone();
    let mut final_url = final_url.clone();
    requested.set_fragment(None);
    final_url.set_fragment(None);
    requested != final_url
}

/// Two-step login form lookup: by form id, then the first form holding
/// both the username and password inputs.
#[derive(Debug, Clone)]
pub struct LoginFormLocator {
    form_id: String,
    username_field: String,
    password_field: String,
}

/// A login form ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub action: Url,
    pub fields: Vec<(String, String)>,
}

impl LoginForm {
    /// Set a field, replacing an existing value of the same name.
    fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }
}

impl LoginFormLocator {
    pub fn new(
        form_id: impl Into<String>,
        username_field: impl Into<String>,
        password_field: impl Into<String>,
    ) -> Self {
        Self {
            form_id: form_id.into(),
            username_field: username_field.into(),
            password_field: password_field.into(),
        }
    }

    pub fn from_config(config: &LoginConfig) -> Self {
        Self::new(
            &config.form_id,
            &config.username_field,
            &config.password_field,
        )
    }

    /// Primary lookup: the form with the configured id.
    pub fn by_id<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        elements(document.root_element(), "form")
            .find(|form| form.value().id() == Some(self.form_id.as_str()))
    }

    /// Fallback: the first form containing both credential inputs.
    pub fn by_fields<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        elements(document.root_element(), "form").find(|form| {
            let has_input = |wanted: &str| {
                elements(*form, "input").any(|input| input.value().attr("name") == Some(wanted))
            };
            has_input(&self.username_field) && has_input(&self.password_field)
        })
    }

    pub fn locate<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        self.by_id(document).or_else(|| self.by_fields(document))
    }

    /// Build the POST for the login form found on `html`.
    ///
    /// Every named non-submit input is carried over (hidden tokens
    /// included), then the credential fields are overwritten.
    pub fn prepare(
        &self,
        html: &str,
        page_url: &Url,
        credentials: &Credentials,
    ) -> std::result::Result<LoginForm, SessionError> {
        let document = Html::parse_document(html);
        let form = self
            .locate(&document)
            .ok_or(SessionError::LoginFormNotFound)?;

        let action = form
            .value()
            .attr("action")
            .ok_or(SessionError::MissingFormAction)?;
        let action = resolve_url(page_url, action)
            .ok_or_else(|| SessionError::InvalidFormAction(action.to_string()))?;

        let mut login_form = LoginForm {
            action,
            fields: Vec::new(),
        };
        for input in elements(form, "input") {
            let Some(name) = input.value().attr("name").map(str::trim) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let kind = input.value().attr("type").unwrap_or("text");
            if kind.eq_ignore_ascii_case("submit") || kind.eq_ignore_ascii_case("button") {
                continue;
            }
            login_form.set(name, input.value().attr("value").unwrap_or(""));
        }

        login_form.set(&self.username_field, &credentials.username);
        login_form.set(&self.password_field, &credentials.password);
        Ok(login_form)
    }
}

fn elements<'a>(root: ElementRef<'a>, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    root.descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |e| e.value().name() == tag)
}

/// Decide whether a login POST succeeded.
pub fn evaluate_login_response(
    config: &LoginConfig,
    final_url: &Url,
    body: &str,
) -> std::result::Result<(), SessionError> {
    let reached_dashboard =
        !config.success_path.is_empty() && final_url.as_str().contains(&config.success_path);
    if reached_dashboard || contains_any_ignore_case(body, &config.success_markers) {
        return Ok(());
    }
    if contains_any_ignore_case(body, &config.failure_markers) {
        return Err(SessionError::WrongCredentials);
    }
    Err(SessionError::LoginRejected)
}

fn has_logout_link(html: &str) -> bool {
    let document = Html::parse_document(html);
    elements(document.root_element(), "a")
        .filter_map(|a| a.value().attr("href"))
        .any(|href| href.contains("logout"))
}

/// HTTP session holder shared by every fetch of a sync run.
pub struct SessionFetcher {
    transport: Arc<dyn PageTransport>,
    home_url: Url,
    login_url: Url,
    credentials: Credentials,
    locator: LoginFormLocator,
    login_config: LoginConfig,
    state: Mutex<SessionState>,
    login_flight: SingleFlight<std::result::Result<(), SessionError>>,
}

impl SessionFetcher {
    pub fn new(
        transport: Arc<dyn PageTransport>,
        home_url: Url,
        login_url: Url,
        credentials: Credentials,
        login_config: LoginConfig,
    ) -> Self {
        Self {
            transport,
            home_url,
            login_url,
            credentials,
            locator: LoginFormLocator::from_config(&login_config),
            login_config,
            state: Mutex::new(SessionState::Unknown),
            login_flight: SingleFlight::new(),
        }
    }

    /// Build a fetcher from the `[moodle]` and `[login]` sections.
    pub fn from_config(config: &Config, transport: Arc<dyn PageTransport>) -> Result<Self> {
        Ok(Self::new(
            transport,
            Url::parse(&config.moodle.home_url)?,
            Url::parse(&config.moodle.login_url)?,
            Credentials {
                username: config.moodle.username.clone(),
                password: config.moodle.password.clone(),
            },
            config.login.clone(),
        ))
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Probe the home page. Network failure is an error, not "logged out".
    pub async fn is_authenticated(&self) -> Result<bool> {
        let response = self.transport.get(&self.home_url).await?;
        let authenticated =
            has_logout_link(&response.text()) || response.final_url == self.home_url;

        log::debug!(
            "Session probe: final_url={} authenticated={}",
            response.final_url,
            authenticated
        );
        self.set_state(if authenticated {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        });
        Ok(authenticated)
    }

    /// Log in. Concurrent callers collapse into one attempt and all
    /// receive its result.
    pub async fn login(&self) -> std::result::Result<(), SessionError> {
        let result = self.login_flight.run(|| self.login_once()).await;
        self.set_state(match result {
            Ok(()) => SessionState::Authenticated,
            Err(_) => SessionState::Unauthenticated,
        });
        result
    }

    async fn login_once(&self) -> std::result::Result<(), SessionError> {
        log::info!("Logging in as {}", self.credentials.username);

        let page = self
            .transport
            .get(&self.login_url)
            .await
            .map_err(|e| SessionError::Transport(format!("error fetching login page: {e}")))?;
        if !page.is_success() {
            return Err(SessionError::Transport(format!(
                "login page returned status {}",
                page.status
            )));
        }

        let form = self
            .locator
            .prepare(&page.text(), &page.final_url, &self.credentials)?;
        log::debug!(
            "Submitting login form to {} with {} fields",
            form.action,
            form.fields.len()
        );

        let response = self
            .transport
            .post_form(&form.action, &form.fields)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        match evaluate_login_response(&self.login_config, &response.final_url, &response.text()) {
            Ok(()) => {
                log::info!("Login successful");
                Ok(())
            }
            Err(e) => {
                log::warn!("Login failed: {}", e);
                Err(e)
            }
        }
    }

    /// GET `url`, logging in and retrying once if the session was lost.
    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let mut response = self.transport.get(url).await?;

        if response_indicates_session_loss(url, &response.final_url) {
            log::info!(
                "Session lost fetching {} (landed on {}); logging in again",
                url,
                response.final_url
            );
            self.set_state(SessionState::Unauthenticated);
            self.login().await?;

            response = self.transport.get(url).await?;
            if response_indicates_session_loss(url, &response.final_url) {
                return Err(AppError::Session(SessionError::NotAuthenticated));
            }
        }

        if !response.is_success() {
            return Err(AppError::status(url.as_str(), response.status));
        }
        Ok(response.body)
    }
}
