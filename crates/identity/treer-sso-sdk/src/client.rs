//! Treer SSO client: authorization code exchange and user info retrieval.

use crate::config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, SsoConfig, SsoSettings};
use crate::error::{ErrorInfo, SsoError, SsoResult};
use crate::response::{ErrorEnvelope, INVALID_CODE_ERRORS, TokenReply, UserInfoReply};
use crate::transport::{HttpTransport, ReqwestTransport, RequestOptions, TransportResponse};
use crate::types::{TokenResponse, UserInfo};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Operations offered by an SSO client
#[async_trait]
pub trait SsoApi: Send + Sync {
    /// Exchange an authorization code for an access token
    async fn get_access_token(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> SsoResult<TokenResponse>;

    /// Fetch the user the access token belongs to
    async fn get_user_info(&self, access_token: &str) -> SsoResult<UserInfo>;

    /// Exchange the code, then fetch the user with the issued token
    async fn get_user_info_by_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> SsoResult<UserInfo> {
        let token = self.get_access_token(code, redirect_uri).await?;
        self.get_user_info(&token.access_token).await
    }
}

/// Client for the Treer SSO API
#[derive(Clone)]
pub struct TreerSsoClient {
    config: SsoConfig,
    transport: Arc<dyn HttpTransport>,
}

impl TreerSsoClient {
    /// Create a client that owns a pooled HTTP transport
    pub fn new(config: SsoConfig) -> Self {
        let transport = Arc::new(ReqwestTransport::new(&config));
        Self { config, transport }
    }

    /// Create a client on top of an existing transport
    pub fn with_transport(config: SsoConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &SsoConfig {
        &self.config
    }

    /// Release the transport's connections. Safe to call repeatedly.
    pub async fn close(&self) {
        self.transport.close().await;
    }

    /// Run `f` with this client, then close it whatever the outcome
    pub async fn scoped<'a, F, Fut, T>(&'a self, f: F) -> T
    where
        F: FnOnce(&'a Self) -> Fut,
        Fut: Future<Output = T>,
    {
        let output = f(self).await;
        self.close().await;
        output
    }
}

#[async_trait]
impl SsoApi for TreerSsoClient {
    async fn get_access_token(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> SsoResult<TokenResponse> {
        let url = self.config.token_url();

        let mut form = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
            ("client_id".to_string(), self.config.client_id().to_string()),
            (
                "client_secret".to_string(),
                self.config.client_secret().to_string(),
            ),
        ];
        if let Some(redirect_uri) = redirect_uri.filter(|uri| !uri.is_empty()) {
            form.push(("redirect_uri".to_string(), redirect_uri.to_string()));
        }

        debug!("Requesting access token: {}", url);
        let response = self
            .transport
            .post(&url, RequestOptions::new().form(form))
            .await
            .map_err(SsoError::network)?;

        if response.status != 200 {
            return token_failure(response);
        }

        match TokenReply::decode(response.json().map_err(SsoError::decode)?)? {
            TokenReply::Issued(token) => {
                info!("Successfully exchanged authorization code for access token");
                Ok(token)
            }
            TokenReply::Rejected(envelope) => {
                error!(
                    "Token exchange rejected: {:?} {:?}",
                    envelope.code, envelope.message
                );
                let invalid_code = envelope
                    .code
                    .as_deref()
                    .is_some_and(|code| INVALID_CODE_ERRORS.contains(&code));
                let info = envelope.into_info("failed to obtain access token", "unknown");
                if invalid_code {
                    Err(SsoError::InvalidCode(info))
                } else {
                    Err(SsoError::Authentication(info))
                }
            }
            TokenReply::Unrecognized => Err(SsoError::Sso(ErrorInfo::new(
                "malformed response: missing access_token",
            ))),
        }
    }

    async fn get_user_info(&self, access_token: &str) -> SsoResult<UserInfo> {
        let url = self.config.user_info_url();

        debug!("Requesting user info: {}", url);
        let response = self
            .transport
            .get(
                &url,
                RequestOptions::new().header("Authorization", format!("Bearer {}", access_token)),
            )
            .await
            .map_err(SsoError::network)?;

        if response.status != 200 {
            return user_info_failure(response);
        }

        match UserInfoReply::decode(response.json().map_err(SsoError::decode)?) {
            UserInfoReply::User(payload) => {
                let user = UserInfo::from_dict(&payload)?;
                debug!("Successfully retrieved user info for user: {}", user.id);
                Ok(user)
            }
            UserInfoReply::Failed(envelope) => {
                error!(
                    "User info request rejected: {:?} {:?}",
                    envelope.code, envelope.message
                );
                Err(SsoError::Sso(
                    envelope.into_info("failed to fetch user info", "unknown"),
                ))
            }
        }
    }
}

fn token_failure(response: TransportResponse) -> SsoResult<TokenResponse> {
    match response.status {
        400 => {
            let envelope = error_body(&response)?;
            Err(SsoError::InvalidCode(
                envelope.into_info("invalid authorization code", "invalid_code"),
            ))
        }
        status => Err(SsoError::Authentication(
            ErrorInfo::new(format!("failed to obtain access token: HTTP {}", status))
                .with_code(format!("http_{}", status)),
        )),
    }
}

fn user_info_failure(response: TransportResponse) -> SsoResult<UserInfo> {
    match response.status {
        401 => {
            let envelope = error_body(&response)?;
            Err(SsoError::InvalidToken(envelope.into_info(
                "access token is invalid or expired",
                "invalid_token",
            )))
        }
        status => Err(SsoError::Sso(
            ErrorInfo::new(format!("failed to fetch user info: HTTP {}", status))
                .with_code(format!("http_{}", status)),
        )),
    }
}

/// Parse a JSON error body; anything that is not declared as JSON yields an empty envelope
fn error_body(response: &TransportResponse) -> SsoResult<ErrorEnvelope> {
    if !response.is_json() {
        return Ok(ErrorEnvelope::default());
    }
    let body: Value = response.json().map_err(SsoError::decode)?;
    Ok(ErrorEnvelope::from_value(&body))
}

/// Fetch user info for an authorization code in one call.
///
/// Builds a configuration (production URL and a 30 second timeout unless
/// given), runs the code exchange and user lookup, and closes the client's
/// connections before returning.
///
/// ```rust,ignore
/// let user = treer_sso_sdk::get_user_info_by_code(
///     "auth_code",
///     "client_id",
///     "client_secret",
///     None,
///     Some("https://app.example.com/callback"),
///     None,
/// )
/// .await?;
/// println!("{} <{:?}>", user.username, user.email);
/// ```
pub async fn get_user_info_by_code(
    code: &str,
    client_id: &str,
    client_secret: &str,
    base_url: Option<&str>,
    redirect_uri: Option<&str>,
    timeout_secs: Option<i64>,
) -> SsoResult<UserInfo> {
    let config = SsoSettings::builder()
        .client_id(client_id)
        .client_secret(client_secret)
        .base_url(base_url.unwrap_or(DEFAULT_BASE_URL))
        .timeout(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
        .build()
        .validate()?;

    let client = TreerSsoClient::new(config);
    client
        .scoped(|client| client.get_user_info_by_code(code, redirect_uri))
        .await
}
