//! SSO client configuration.

use crate::error::{SsoError, SsoResult};
use bon::Builder;
use config::{Config as ConfigBuilder, Environment};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Production SSO API
pub const DEFAULT_BASE_URL: &str = "https://sso-api.treer.ru";
pub const DEFAULT_TIMEOUT_SECS: i64 = 30;
pub const DEFAULT_MAX_RETRIES: i64 = 3;

const TOKEN_PATH: &str = "/api/v1/oauth/token";
const USER_INFO_PATH: &str = "/api/v1/users/me";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> i64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_retries() -> i64 {
    DEFAULT_MAX_RETRIES
}

fn default_verify_tls() -> bool {
    true
}

/// Unvalidated configuration input.
///
/// Built in code through [`SsoSettings::builder`] or read from the environment
/// by [`SsoConfig::from_env`], then turned into an [`SsoConfig`] with
/// [`SsoSettings::validate`].
#[derive(Clone, Builder, Deserialize)]
pub struct SsoSettings {
    #[builder(into)]
    pub client_id: String,

    #[builder(into)]
    pub client_secret: String,

    #[builder(into, default = default_base_url())]
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[builder(default = DEFAULT_TIMEOUT_SECS)]
    #[serde(default = "default_timeout")]
    pub timeout: i64,

    /// Carried for callers that implement their own retry policy; the client never retries
    #[builder(default = DEFAULT_MAX_RETRIES)]
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,

    #[builder(default = true)]
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

impl SsoSettings {
    /// Validate the settings and produce an immutable configuration
    pub fn validate(self) -> SsoResult<SsoConfig> {
        if self.client_id.is_empty() {
            return Err(SsoError::config("client_id must not be empty"));
        }
        if self.client_secret.is_empty() {
            return Err(SsoError::config("client_secret must not be empty"));
        }
        if self.base_url.is_empty() {
            return Err(SsoError::config("base_url must not be empty"));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(SsoError::config(
                "base_url must start with http:// or https://",
            ));
        }
        let parsed = Url::parse(&self.base_url)
            .map_err(|e| SsoError::config(format!("base_url is not a valid URL: {}", e)))?;
        if parsed.host_str().is_none() {
            return Err(SsoError::config("base_url is not a valid URL: missing host"));
        }

        if self.timeout <= 0 {
            return Err(SsoError::config("timeout must be greater than 0"));
        }
        if self.max_retries < 0 {
            return Err(SsoError::config("max_retries must not be negative"));
        }
        let max_retries = u32::try_from(self.max_retries)
            .map_err(|_| SsoError::config("max_retries is too large"))?;

        Ok(SsoConfig {
            client_id: self.client_id,
            client_secret: self.client_secret,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.timeout as u64),
            max_retries,
            verify_tls: self.verify_tls,
        })
    }
}

impl fmt::Debug for SsoSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SsoSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

/// Validated SSO client configuration
#[derive(Clone, PartialEq, Eq)]
pub struct SsoConfig {
    client_id: String,
    client_secret: String,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    verify_tls: bool,
}

impl SsoConfig {
    /// Configuration for the production service with default settings
    pub fn new<S: Into<String>>(client_id: S, client_secret: S) -> SsoResult<Self> {
        SsoSettings::builder()
            .client_id(client_id)
            .client_secret(client_secret)
            .build()
            .validate()
    }

    /// Load configuration from `SSO_*` environment variables
    ///
    /// Reads `SSO_CLIENT_ID`, `SSO_CLIENT_SECRET`, `SSO_BASE_URL`, `SSO_TIMEOUT`,
    /// `SSO_MAX_RETRIES` and `SSO_VERIFY_TLS`. Only the first two are required.
    pub fn from_env() -> SsoResult<Self> {
        Self::from_environment(Environment::with_prefix("SSO"))
    }

    fn from_environment(environment: Environment) -> SsoResult<Self> {
        let settings: SsoSettings = ConfigBuilder::builder()
            .add_source(environment.try_parsing(true))
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| {
                SsoError::config(format!("failed to load configuration from environment: {}", e))
            })?;

        debug!("Loaded SSO settings from environment: {:?}", settings);
        settings.validate()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    pub fn token_url(&self) -> String {
        format!("{}{}", self.base_url, TOKEN_PATH)
    }

    pub fn user_info_url(&self) -> String {
        format!("{}{}", self.base_url, USER_INFO_PATH)
    }
}

impl TryFrom<SsoSettings> for SsoConfig {
    type Error = SsoError;

    fn try_from(settings: SsoSettings) -> SsoResult<Self> {
        settings.validate()
    }
}

impl fmt::Debug for SsoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SsoConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}
