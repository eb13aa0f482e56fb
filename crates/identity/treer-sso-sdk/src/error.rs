//! SSO error types.

use crate::transport::TransportError;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub type SsoResult<T> = Result<T, SsoError>;

/// Message, machine readable code and structured details carried by every [`SsoError`].
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub message: String,
    pub code: Option<String>,
    pub details: Option<Value>,
}

impl ErrorInfo {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            code: None,
            details: None,
        }
    }

    pub fn with_code<S: Into<String>>(mut self, code: S) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: Option<Value>) -> Self {
        self.details = details;
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Errors returned by the SSO client.
///
/// `Authentication`, `InvalidToken` and `InvalidCode` form the authentication
/// family, see [`SsoError::is_authentication`].
#[derive(Debug, Error)]
pub enum SsoError {
    /// Generic SSO failure, including business errors declared by the server
    #[error("{0}")]
    Sso(ErrorInfo),

    /// Invalid client configuration
    #[error("{0}")]
    Config(ErrorInfo),

    /// The server rejected the client or the request
    #[error("{0}")]
    Authentication(ErrorInfo),

    /// The access token is invalid or expired
    #[error("{0}")]
    InvalidToken(ErrorInfo),

    /// The authorization code is invalid or already used
    #[error("{0}")]
    InvalidCode(ErrorInfo),

    /// Connection, timeout or TLS failure
    #[error("{info}")]
    Network {
        info: ErrorInfo,
        #[source]
        source: TransportError,
    },

    /// Response body was not valid JSON
    #[error("{info}")]
    Decode {
        info: ErrorInfo,
        #[source]
        source: serde_json::Error,
    },
}

impl SsoError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(ErrorInfo::new(msg))
    }

    /// Create a network error wrapping a transport failure
    pub fn network(source: TransportError) -> Self {
        Self::Network {
            info: ErrorInfo::new(format!("network request failed: {}", source)),
            source,
        }
    }

    /// Create a decode error wrapping a JSON parse failure
    pub fn decode(source: serde_json::Error) -> Self {
        Self::Decode {
            info: ErrorInfo::new(format!("failed to parse response: {}", source)),
            source,
        }
    }

    /// Create a generic error for a payload that does not describe a user
    pub fn invalid_payload<S: Into<String>>(msg: S) -> Self {
        Self::Sso(ErrorInfo::new(msg).with_code("invalid_payload"))
    }

    pub fn info(&self) -> &ErrorInfo {
        match self {
            Self::Sso(info)
            | Self::Config(info)
            | Self::Authentication(info)
            | Self::InvalidToken(info)
            | Self::InvalidCode(info) => info,
            Self::Network { info, .. } | Self::Decode { info, .. } => info,
        }
    }

    pub fn message(&self) -> &str {
        &self.info().message
    }

    pub fn code(&self) -> Option<&str> {
        self.info().code.as_deref()
    }

    pub fn details(&self) -> Option<&Value> {
        self.info().details.as_ref()
    }

    /// Check if this error belongs to the authentication family
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_) | Self::InvalidToken(_) | Self::InvalidCode(_)
        )
    }
}
