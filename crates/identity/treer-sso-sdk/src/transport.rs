//! HTTP transport abstraction and the pooled reqwest implementation.

use crate::config::SsoConfig;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{RwLock, Semaphore};
use tracing::debug;

/// Maximum number of requests in flight per transport
pub const MAX_CONNECTIONS: usize = 10;
/// Maximum number of idle keep-alive connections per host
pub const MAX_IDLE_CONNECTIONS: usize = 5;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Headers and optional form body for a single request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub form: Option<Vec<(String, String)>>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Send the given fields as an `application/x-www-form-urlencoded` body
    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.form = Some(fields);
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .as_ref()?
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Status, content type and body of a completed request
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl TransportResponse {
    pub fn new<S: Into<String>>(status: u16, content_type: Option<&str>, body: S) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    /// Convenience constructor for an `application/json` response
    pub fn json_body(status: u16, body: &Value) -> Self {
        Self::new(status, Some("application/json"), body.to_string())
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Minimal HTTP capability used by the SSO client
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a GET request
    async fn get(&self, url: &str, options: RequestOptions) -> TransportResult<TransportResponse>;

    /// Send a POST request
    async fn post(&self, url: &str, options: RequestOptions)
    -> TransportResult<TransportResponse>;

    /// Release pooled connections. Calling it more than once is a no-op.
    async fn close(&self);
}

/// Transport backed by a lazily created, pooled [`reqwest::Client`]
pub struct ReqwestTransport {
    timeout: Duration,
    verify_tls: bool,
    client: RwLock<Option<Client>>,
    permits: Semaphore,
    #[cfg(test)]
    pools_created: std::sync::atomic::AtomicUsize,
}

impl ReqwestTransport {
    pub fn new(config: &SsoConfig) -> Self {
        Self {
            timeout: config.timeout(),
            verify_tls: config.verify_tls(),
            client: RwLock::new(None),
            permits: Semaphore::new(MAX_CONNECTIONS),
            #[cfg(test)]
            pools_created: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Whether a connection pool currently exists
    pub async fn is_open(&self) -> bool {
        self.client.read().await.is_some()
    }

    async fn client(&self) -> TransportResult<Client> {
        if let Some(client) = self.client.read().await.as_ref() {
            return Ok(client.clone());
        }

        let mut slot = self.client.write().await;
        // Another task may have won the race while we waited for the write lock
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(!self.verify_tls)
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS)
            .build()?;
        #[cfg(test)]
        self.pools_created
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        debug!(
            "Created HTTP client (timeout: {:?}, verify_tls: {})",
            self.timeout, self.verify_tls
        );
        *slot = Some(client.clone());
        Ok(client)
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        options: RequestOptions,
    ) -> TransportResult<TransportResponse> {
        let mut request = request;
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(fields) = &options.form {
            request = request.form(fields);
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| TransportError::unavailable("connection limiter closed"))?;

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, options: RequestOptions) -> TransportResult<TransportResponse> {
        debug!("Sending GET request: {}", url);
        let client = self.client().await?;
        self.execute(client.get(url), options).await
    }

    async fn post(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> TransportResult<TransportResponse> {
        debug!("Sending POST request: {}", url);
        let client = self.client().await?;
        self.execute(client.post(url), options).await
    }

    async fn close(&self) {
        if self.client.write().await.take().is_some() {
            debug!("HTTP client closed");
        }
    }
}
