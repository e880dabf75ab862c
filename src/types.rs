//! Wire types shared by the session store and the HTTP client

use crate::error::{ClientError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message used when the server reports a failure without one
const DEFAULT_FAILURE_MESSAGE: &str = "Request failed";

/// Access + refresh token pair returned by `/auth/login` and `/auth/refresh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: u64,
    /// Refresh token lifetime in seconds
    #[serde(default)]
    pub refresh_expires_in: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `{code, message, data}` wrapper around every server reply
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Recognize an envelope: a JSON object carrying a numeric `code`.
    /// Anything else is a bare payload.
    pub fn detect(body: &Value) -> Option<Envelope> {
        let object = body.as_object()?;
        let code = object.get("code")?.as_i64()?;
        let message = object
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let data = object.get("data").cloned().unwrap_or(Value::Null);
        Some(Envelope { code, message, data })
    }

    pub fn into_outcome<T: DeserializeOwned>(self) -> Result<ApiOutcome<T>> {
        if self.code == 0 {
            return Ok(ApiOutcome::Success(serde_json::from_value(self.data)?));
        }
        let message = if self.message.is_empty() {
            DEFAULT_FAILURE_MESSAGE.to_string()
        } else {
            self.message
        };
        Ok(ApiOutcome::Failure { code: self.code, message })
    }
}

/// Result of a call as reported by the server
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome<T> {
    Success(T),
    Failure { code: i64, message: String },
}

impl<T> ApiOutcome<T> {
    pub fn into_result(self) -> Result<T> {
        match self {
            ApiOutcome::Success(data) => Ok(data),
            ApiOutcome::Failure { code, message } => Err(ClientError::Api { code, message }),
        }
    }
}

/// Decode a response body into its payload, unwrapping the envelope when present
pub fn unwrap_body<T: DeserializeOwned>(body: Value) -> Result<T> {
    match Envelope::detect(&body) {
        Some(envelope) => envelope.into_outcome()?.into_result(),
        None => Ok(serde_json::from_value(body)?),
    }
}

/// Parse raw response bytes; an empty body reads as JSON `null`
pub fn parse_body(bytes: &[u8]) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// Best-effort human readable message from an error response body
pub fn failure_message(bytes: &[u8]) -> String {
    if let Ok(body) = serde_json::from_slice::<Value>(bytes) {
        if let Some(message) = body.get("message").and_then(Value::as_str) {
            if !message.is_empty() {
                return message.to_string();
            }
        }
    }
    String::from_utf8_lossy(bytes).trim().to_string()
}
