//! Application configuration structures.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use super::GradeSelectors;
use crate::error::{AppError, Result};

/// Environment variable overriding `moodle.username`.
pub const USERNAME_ENV: &str = "GRADESYNC_USERNAME";
/// Environment variable overriding `moodle.password`.
pub const PASSWORD_ENV: &str = "GRADESYNC_PASSWORD";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote gradebook endpoints and credentials
    #[serde(default)]
    pub moodle: MoodleConfig,

    /// Login form discovery and outcome detection
    #[serde(default)]
    pub login: LoginConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Snapshot persistence settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sync run settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Page scraping selectors
    #[serde(default)]
    pub selectors: GradeSelectors,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Overlay credentials from the environment.
    pub fn apply_env(mut self) -> Self {
        if let Ok(user) = env::var(USERNAME_ENV) {
            self.moodle.username = user;
        }
        if let Ok(pass) = env::var(PASSWORD_ENV) {
            self.moodle.password = pass;
        }
        self
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("moodle.home_url", &self.moodle.home_url),
            ("moodle.login_url", &self.moodle.login_url),
            ("moodle.overview_url", &self.moodle.overview_url),
        ] {
            Url::parse(value)
                .map_err(|e| AppError::validation(format!("{key} is not a valid URL: {e}")))?;
        }
        if self.moodle.username.trim().is_empty() {
            return Err(AppError::validation(format!(
                "moodle.username is empty (set it or {USERNAME_ENV})"
            )));
        }
        if self.moodle.password.is_empty() {
            return Err(AppError::validation(format!(
                "moodle.password is empty (set it or {PASSWORD_ENV})"
            )));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == Some(0) {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        self.storage.delimiter_byte()?;
        if self.sync.interval_secs == 0 {
            return Err(AppError::validation("sync.interval_secs must be > 0"));
        }
        Ok(())
    }
}

/// Remote gradebook endpoints and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodleConfig {
    /// Page used to probe whether the session is alive
    #[serde(default = "defaults::home_url")]
    pub home_url: String,

    /// Page hosting the login form
    #[serde(default = "defaults::login_url")]
    pub login_url: String,

    /// Grade overview report listing one row per course
    #[serde(default = "defaults::overview_url")]
    pub overview_url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

impl Default for MoodleConfig {
    fn default() -> Self {
        Self {
            home_url: defaults::home_url(),
            login_url: defaults::login_url(),
            overview_url: defaults::overview_url(),
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Login form discovery and outcome detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    /// `id` attribute of the login form
    #[serde(default = "defaults::form_id")]
    pub form_id: String,

    /// Name of the username input
    #[serde(default = "defaults::username_field")]
    pub username_field: String,

    /// Name of the password input
    #[serde(default = "defaults::password_field")]
    pub password_field: String,

    /// Fragment of the post-login URL that signals success
    #[serde(default = "defaults::success_path")]
    pub success_path: String,

    /// Body markers (case-insensitive) that signal success
    #[serde(default = "defaults::success_markers")]
    pub success_markers: Vec<String>,

    /// Body markers (case-insensitive) that signal rejected credentials
    #[serde(default = "defaults::failure_markers")]
    pub failure_markers: Vec<String>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            form_id: defaults::form_id(),
            username_field: defaults::username_field(),
            password_field: defaults::password_field(),
            success_path: defaults::success_path(),
            success_markers: defaults::success_markers(),
            failure_markers: defaults::failure_markers(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds; unset means no timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: None,
        }
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one snapshot file per course
    #[serde(default = "defaults::storage_dir")]
    pub dir: PathBuf,

    /// Field delimiter of snapshot records
    #[serde(default = "defaults::delimiter")]
    pub delimiter: char,
}

impl StorageConfig {
    /// The delimiter as the single byte the record codec works with.
    pub fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter {
            '"' | '\n' | '\r' => Err(AppError::validation(
                "storage.delimiter cannot be a quote or line break",
            )),
            c if c.is_ascii() => Ok(c as u8),
            c => Err(AppError::validation(format!(
                "storage.delimiter must be an ASCII character, got '{c}'"
            ))),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::storage_dir(),
            delimiter: defaults::delimiter(),
        }
    }
}

/// Sync run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Course titles skipped during discovery (exact match)
    #[serde(default)]
    pub excluded_courses: Vec<String>,

    /// Seconds between scheduled runs
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            excluded_courses: Vec::new(),
            interval_secs: defaults::interval(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Moodle defaults
    pub fn home_url() -> String {
        "https://moodle.example.edu/my/".into()
    }
    pub fn login_url() -> String {
        "https://moodle.example.edu/login/index.php".into()
    }
    pub fn overview_url() -> String {
        "https://moodle.example.edu/grade/report/overview/index.php".into()
    }

    // Login defaults
    pub fn form_id() -> String {
        "login".into()
    }
    pub fn username_field() -> String {
        "username".into()
    }
    pub fn password_field() -> String {
        "password".into()
    }
    pub fn success_path() -> String {
        "/my/".into()
    }
    pub fn success_markers() -> Vec<String> {
        vec!["log out".into(), "dashboard".into()]
    }
    pub fn failure_markers() -> Vec<String> {
        vec!["invalid".into(), "incorrect".into()]
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; gradesync/0.1)".into()
    }

    // Storage defaults
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("csvs")
    }
    pub fn delimiter() -> char {
        ';'
    }

    // Sync defaults
    pub fn interval() -> u64 {
        30 * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_credentials() -> Config {
        let mut config = Config::default();
        config.moodle.username = "student".to_string();
        config.moodle.password = "secret".to_string();
        config
    }

    #[test]
    fn validate_default_with_credentials_ok() {
        assert!(with_credentials().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_url() {
        let mut config = with_credentials();
        config.moodle.overview_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_quote_delimiter() {
        let mut config = with_credentials();
        config.storage.delimiter = '"';
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_ascii_delimiter() {
        let mut config = with_credentials();
        config.storage.delimiter = '§';
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
        assert!(config.storage.delimiter_byte().is_err());

        config.storage.delimiter = ',';
        assert_eq!(config.storage.delimiter_byte().unwrap(), b',');
    }

    #[test]
    fn load_missing_file_is_config_error_naming_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");

        match Config::load(&path) {
            Err(AppError::Config(message)) => assert!(message.contains("absent.toml")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn load_reads_file_and_reports_bad_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let good = tmp.path().join("config.toml");
        fs::write(&good, "[moodle]\nusername = \"student\"\n").unwrap();
        assert_eq!(Config::load(&good).unwrap().moodle.username, "student");

        let bad = tmp.path().join("bad.toml");
        fs::write(&bad, "[moodle\n").unwrap();
        assert!(matches!(Config::load(&bad), Err(AppError::Toml(_))));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [moodle]
            overview_url = "https://lms.example.org/grade/report/overview/index.php"
            username = "student"

            [sync]
            excluded_courses = ["Orientation"]

            [storage]
            delimiter = ","
            "#,
        )
        .unwrap();

        assert_eq!(config.moodle.username, "student");
        assert_eq!(config.moodle.login_url, defaults::login_url());
        assert_eq!(config.sync.excluded_courses, vec!["Orientation"]);
        assert_eq!(config.storage.delimiter, ',');
        assert_eq!(config.login.form_id, "login");
        assert_eq!(config.http.timeout_secs, None);
    }
}
