//! Configuration management for the admin client.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the data API, including its version path
    pub api_url: String,
    /// Application id sent with every request
    pub app_id: String,
    /// Master key for privileged requests (optional)
    pub master_key: Option<String>,
    /// Where the signed-in session is persisted
    pub session_file: PathBuf,
    /// How long a session stays usable after sign-in
    pub session_max_age: Duration,
    /// Per-request timeout
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = env::var("BALLOT_API_URL").map_err(|_| ConfigError::MissingApiUrl)?;
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(ConfigError::InvalidApiUrl(api_url));
        }

        let app_id = env::var("BALLOT_APP_ID").map_err(|_| ConfigError::MissingAppId)?;

        let master_key = env::var("BALLOT_MASTER_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        let session_file = env::var("BALLOT_SESSION_FILE")
            .unwrap_or_else(|_| ".ballot-session.json".to_string())
            .into();

        let max_age_hours: u64 = env::var("BALLOT_SESSION_MAX_AGE_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidSessionMaxAge)?;

        let timeout_secs: u64 = env::var("BALLOT_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            app_id,
            master_key,
            session_file,
            session_max_age: session_max_age(max_age_hours)?,
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Configuration pointing at `api_url` with defaults for everything else.
    pub fn new(api_url: impl Into<String>, app_id: impl Into<String>) -> Self {
        let api_url = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            master_key: None,
            session_file: PathBuf::from(".ballot-session.json"),
            session_max_age: Duration::from_secs(24 * 3600),
            http_timeout: Duration::from_secs(15),
        }
    }
}

/// Session lifetime from a number of hours.
fn session_max_age(hours: u64) -> Result<Duration, ConfigError> {
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or(ConfigError::InvalidSessionMaxAge)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("BALLOT_API_URL environment variable is required")]
    MissingApiUrl,

    #[error("BALLOT_API_URL must be an http(s) URL, got '{0}'")]
    InvalidApiUrl(String),

    #[error("BALLOT_APP_ID environment variable is required")]
    MissingAppId,

    #[error("Invalid BALLOT_SESSION_MAX_AGE_HOURS value")]
    InvalidSessionMaxAge,

    #[error("Invalid BALLOT_HTTP_TIMEOUT_SECS value")]
    InvalidTimeout,
}
