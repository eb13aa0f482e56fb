//! Client SDK for the Treer SSO service.
//!
//! Implements the client side of the OAuth 2.0 authorization code flow against
//! Treer SSO: an authorization code is exchanged for an access token, and the
//! token is used to fetch the signed-in user's profile.
//!
//! ```rust,ignore
//! use treer_sso_sdk::{SsoApi, SsoConfig, TreerSsoClient};
//!
//! let client = TreerSsoClient::new(SsoConfig::new("client_id", "client_secret")?);
//! let user = client
//!     .scoped(|client| client.get_user_info_by_code("auth_code", None))
//!     .await?;
//! println!("signed in as {}", user.username);
//! ```

mod client;
mod config;
mod error;
mod response;
mod transport;
mod types;

#[cfg(test)]
mod tests;

pub use client::{SsoApi, TreerSsoClient, get_user_info_by_code};
pub use config::{
    DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS, SsoConfig, SsoSettings,
};
pub use error::{ErrorInfo, SsoError, SsoResult};
pub use response::{ErrorEnvelope, INVALID_CODE_ERRORS, TokenReply, UserInfoReply};
pub use transport::{
    HttpTransport, MAX_CONNECTIONS, MAX_IDLE_CONNECTIONS, ReqwestTransport, RequestOptions,
    TransportError, TransportResponse, TransportResult,
};
pub use types::{TokenResponse, UserInfo, UserProfile, parse_timestamp};

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
