//! SSO data models.

use crate::error::{SsoError, SsoResult};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::warn;

pub const DEFAULT_LOCALE: &str = "zh";
pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

/// User profile attached to a [`UserInfo`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Attributes the server reports beyond the fixed profile fields
    #[serde(default)]
    pub additional_info: Map<String, Value>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            first_name: None,
            last_name: None,
            avatar_url: None,
            locale: default_locale(),
            timezone: default_timezone(),
            additional_info: Map::new(),
        }
    }
}

impl UserProfile {
    /// Non-empty name parts joined by a space, empty when neither is set
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            first_name: string_field(object, "first_name"),
            last_name: string_field(object, "last_name"),
            avatar_url: string_field(object, "avatar_url"),
            locale: string_field(object, "locale").unwrap_or_else(default_locale),
            timezone: string_field(object, "timezone").unwrap_or_else(default_timezone),
            additional_info: object
                .get("additional_info")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// User returned by the `/api/v1/users/me` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<FixedOffset>>,
}

impl UserInfo {
    /// A user with only the required fields set
    pub fn new<S: Into<String>>(id: S, username: S) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: None,
            phone: None,
            is_active: true,
            profile: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Build a user from an untyped JSON payload.
    ///
    /// `id` and `username` are required. Timestamps that cannot be parsed are
    /// dropped instead of failing the whole payload.
    pub fn from_dict(data: &Value) -> SsoResult<Self> {
        let object = data
            .as_object()
            .ok_or_else(|| SsoError::invalid_payload("user payload is not a JSON object"))?;

        let id = match object.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            Some(_) => return Err(SsoError::invalid_payload("invalid field: id")),
            None => return Err(SsoError::invalid_payload("missing required field: id")),
        };
        let username = match object.get("username") {
            Some(Value::String(username)) => username.clone(),
            Some(Value::Number(username)) => username.to_string(),
            Some(_) => return Err(SsoError::invalid_payload("invalid field: username")),
            None => {
                return Err(SsoError::invalid_payload(
                    "missing required field: username",
                ));
            }
        };

        let profile = object
            .get("profile")
            .and_then(Value::as_object)
            .filter(|profile| !profile.is_empty())
            .map(UserProfile::from_object);

        Ok(Self {
            id,
            username,
            email: string_field(object, "email"),
            phone: string_field(object, "phone"),
            is_active: object
                .get("is_active")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            profile,
            created_at: timestamp_field(object, "created_at"),
            updated_at: timestamp_field(object, "updated_at"),
        })
    }

    /// Convert back into a JSON payload accepted by [`UserInfo::from_dict`]
    pub fn to_dict(&self) -> Value {
        let mut result = json!({
            "id": self.id,
            "username": self.username,
            "email": self.email,
            "phone": self.phone,
            "is_active": self.is_active,
        });

        if let Some(object) = result.as_object_mut() {
            if let Some(profile) = &self.profile {
                object.insert(
                    "profile".to_string(),
                    json!({
                        "first_name": profile.first_name,
                        "last_name": profile.last_name,
                        "avatar_url": profile.avatar_url,
                        "locale": profile.locale,
                        "timezone": profile.timezone,
                        "additional_info": profile.additional_info,
                    }),
                );
            }
            if let Some(created_at) = &self.created_at {
                object.insert("created_at".to_string(), json!(created_at.to_rfc3339()));
            }
            if let Some(updated_at) = &self.updated_at {
                object.insert("updated_at".to_string(), json!(updated_at.to_rfc3339()));
            }
        }

        result
    }
}

impl TryFrom<Value> for UserInfo {
    type Error = SsoError;

    fn try_from(value: Value) -> SsoResult<Self> {
        Self::from_dict(&value)
    }
}

/// Token endpoint response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn new<S: Into<String>>(access_token: S) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in: None,
            refresh_token: None,
            scope: None,
        }
    }

    /// Read a token endpoint payload.
    ///
    /// Only `access_token` is required. A missing or null `token_type` falls
    /// back to `Bearer`, and an `expires_in` that is neither a number nor a
    /// numeric string is dropped.
    pub fn from_dict(data: &Value) -> SsoResult<Self> {
        let object = data
            .as_object()
            .ok_or_else(|| SsoError::invalid_payload("token payload is not a JSON object"))?;

        let access_token = match object.get("access_token") {
            Some(Value::String(token)) => token.clone(),
            Some(_) => return Err(SsoError::invalid_payload("invalid field: access_token")),
            None => {
                return Err(SsoError::invalid_payload(
                    "missing required field: access_token",
                ));
            }
        };

        let expires_in = match object.get("expires_in") {
            Some(Value::Number(secs)) => secs
                .as_u64()
                .or_else(|| secs.as_f64().filter(|s| *s >= 0.0).map(|s| s as u64)),
            Some(Value::String(secs)) => secs.trim().parse().ok(),
            _ => None,
        };

        Ok(Self {
            access_token,
            token_type: string_field(object, "token_type").unwrap_or_else(default_token_type),
            expires_in,
            refresh_token: string_field(object, "refresh_token"),
            scope: string_field(object, "scope"),
        })
    }

    /// Value for the `Authorization` header, e.g. `Bearer <token>`
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl TryFrom<Value> for TokenResponse {
    type Error = SsoError;

    fn try_from(value: Value) -> SsoResult<Self> {
        Self::from_dict(&value)
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn timestamp_field(object: &Map<String, Value>, key: &str) -> Option<DateTime<FixedOffset>> {
    let raw = match object.get(key) {
        None | Some(Value::Null) => return None,
        Some(Value::String(raw)) if raw.is_empty() => return None,
        Some(Value::String(raw)) => raw,
        Some(other) => {
            warn!("Ignoring non-string {} value: {}", key, other);
            return None;
        }
    };

    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        warn!("Ignoring unparsable {} value: {}", key, raw);
    }
    parsed
}

/// Parse an ISO-8601 timestamp. Values without an offset are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    let utc = FixedOffset::east_opt(0)?;

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"] {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().with_timezone(&utc));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().with_timezone(&utc))
}
