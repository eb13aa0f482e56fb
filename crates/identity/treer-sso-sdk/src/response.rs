//! Decoding of SSO response bodies into explicit outcomes.

use crate::error::{ErrorInfo, SsoResult};
use crate::types::TokenResponse;
use serde_json::{Map, Value};

/// Server codes that mean the authorization code itself was rejected
pub const INVALID_CODE_ERRORS: &[&str] = &["oauth.invalid_code", "oauth.authorization_failed"];

/// Error envelope `{success, code, message, details}` used by the SSO API
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorEnvelope {
    pub success: Option<bool>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<Value>,
}

impl ErrorEnvelope {
    /// Read the envelope fields from a JSON body, ignoring anything malformed
    pub fn from_value(value: &Value) -> Self {
        match value.as_object() {
            Some(object) => Self::from_object(object),
            None => Self::default(),
        }
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let code = match object.get("code") {
            Some(Value::String(code)) => Some(code.clone()),
            Some(Value::Number(code)) => Some(code.to_string()),
            _ => None,
        };

        Self {
            success: object.get("success").map(is_truthy),
            code,
            message: object
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            details: object.get("details").filter(|d| !d.is_null()).cloned(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.success == Some(false)
    }

    /// Merge the envelope with fallback message and code
    pub fn into_info(self, default_message: &str, default_code: &str) -> ErrorInfo {
        ErrorInfo::new(self.message.unwrap_or_else(|| default_message.to_string()))
            .with_code(self.code.unwrap_or_else(|| default_code.to_string()))
            .with_details(self.details)
    }
}

/// Truthiness of a JSON flag: `null`, `false`, zero and empty values are false
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Outcome of a successful (HTTP 200) token endpoint call
#[derive(Debug, Clone, PartialEq)]
pub enum TokenReply {
    /// The body carries an access token
    Issued(TokenResponse),
    /// No access token and `success: false`
    Rejected(ErrorEnvelope),
    /// Neither a token nor an error envelope
    Unrecognized,
}

impl TokenReply {
    pub fn decode(body: Value) -> SsoResult<Self> {
        let Some(object) = body.as_object() else {
            return Ok(Self::Unrecognized);
        };

        if object.contains_key("access_token") {
            return Ok(Self::Issued(TokenResponse::from_dict(&body)?));
        }

        let envelope = ErrorEnvelope::from_object(object);
        if envelope.is_failure() {
            Ok(Self::Rejected(envelope))
        } else {
            Ok(Self::Unrecognized)
        }
    }
}

/// Outcome of a successful (HTTP 200) user info call
#[derive(Debug, Clone, PartialEq)]
pub enum UserInfoReply {
    /// User payload, unwrapped from `data` when the body is an envelope
    User(Value),
    /// `success: false`
    Failed(ErrorEnvelope),
}

impl UserInfoReply {
    pub fn decode(body: Value) -> Self {
        let envelope = ErrorEnvelope::from_value(&body);
        if envelope.is_failure() {
            return Self::Failed(envelope);
        }

        match body {
            Value::Object(mut object) if object.contains_key("data") => {
                Self::User(object.remove("data").unwrap_or(Value::Null))
            }
            other => Self::User(other),
        }
    }
}
