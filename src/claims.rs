//! Access token claims and permission checks
//!
//! Claims are read straight out of the token payload without verifying the
//! signature. The server stays the only authority on validity; what is decoded
//! here only drives what the client chooses to show.

use crate::error::{ClientError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Identity and authorization attributes carried by an access token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID as string)
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: BTreeSet<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub permissions: BTreeSet<String>,
    /// Expiration time (Unix timestamp)
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn satisfies(&self, required: &PermissionRequirement) -> bool {
        required.codes().iter().all(|code| self.permissions.contains(code))
    }

    /// Check expiry against a Unix timestamp. Tokens without `exp` never expire here.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }
}

/// Missing and `null` claims both read as empty
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode the claims of a JWT-shaped token (`header.payload.signature`)
pub fn parse_token(token: &str) -> Result<Claims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => return Err(ClientError::Decode("expected three dot-separated segments".to_string())),
    };

    // Some issuers pad the payload; the URL-safe engine here does not accept padding.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ClientError::Decode(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ClientError::Decode(format!("payload is not a claims object: {e}")))
}

/// Permission codes a route or action requires. Empty means no requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionRequirement {
    #[default]
    None,
    One(String),
    All(Vec<String>),
}

impl PermissionRequirement {
    pub fn codes(&self) -> &[String] {
        match self {
            PermissionRequirement::None => &[],
            PermissionRequirement::One(code) => std::slice::from_ref(code),
            PermissionRequirement::All(codes) => codes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.codes().is_empty()
    }
}

impl From<&PermissionRequirement> for PermissionRequirement {
    fn from(required: &PermissionRequirement) -> Self {
        required.clone()
    }
}

impl From<&str> for PermissionRequirement {
    fn from(code: &str) -> Self {
        PermissionRequirement::One(code.to_string())
    }
}

impl From<String> for PermissionRequirement {
    fn from(code: String) -> Self {
        PermissionRequirement::One(code)
    }
}

impl From<Vec<String>> for PermissionRequirement {
    fn from(codes: Vec<String>) -> Self {
        PermissionRequirement::All(codes)
    }
}

impl From<&[&str]> for PermissionRequirement {
    fn from(codes: &[&str]) -> Self {
        PermissionRequirement::All(codes.iter().map(|c| c.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PermissionRequirement {
    fn from(codes: [&str; N]) -> Self {
        PermissionRequirement::All(codes.iter().map(|c| c.to_string()).collect())
    }
}

impl<T: Into<PermissionRequirement>> From<Option<T>> for PermissionRequirement {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn forge(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn test_parse_token_claims() {
        let token = forge(json!({
            "sub": "42",
            "username": "alice",
            "roles": ["admin"],
            "permissions": ["asset:view", "audit:view"],
            "type": "ACCESS",
            "exp": 1_900_000_000
        }));

        let claims = parse_token(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.username, "alice");
        assert!(claims.has_role("admin"));
        assert!(claims.permissions.contains("audit:view"));
        assert_eq!(claims.exp, Some(1_900_000_000));
        assert!(!claims.is_expired_at(1_800_000_000));
        assert!(claims.is_expired_at(1_900_000_000));
    }

    #[test]
    fn test_missing_claims_default_to_empty() {
        let claims = parse_token(&forge(json!({"sub": "7"}))).unwrap();
        assert!(claims.username.is_empty());
        assert!(claims.roles.is_empty());
        assert!(claims.permissions.is_empty());
        assert!(!claims.is_expired_at(i64::MAX));
    }

    #[test]
    fn test_null_claims_read_as_empty() {
        let token = forge(json!({
            "sub": "9",
            "username": "carol",
            "roles": null,
            "permissions": null,
            "exp": null
        }));

        let claims = parse_token(&token).unwrap();
        assert_eq!(claims.username, "carol");
        assert!(claims.roles.is_empty());
        assert!(claims.permissions.is_empty());
        assert_eq!(claims.exp, None);

        let claims = parse_token(&forge(json!({"username": null, "roles": ["auditor"]}))).unwrap();
        assert!(claims.username.is_empty());
        assert!(claims.has_role("auditor"));
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["", "not-a-token", "a.b", "a.b.c.d", "a.!!!.c", "a..c"] {
            assert!(matches!(parse_token(token), Err(ClientError::Decode(_))), "{token}");
        }

        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode("plain text"));
        assert!(matches!(parse_token(&not_json), Err(ClientError::Decode(_))));
    }

    #[test]
    fn test_permission_requirement() {
        let claims = Claims {
            permissions: ["asset:view", "asset:stockin"].iter().map(|p| p.to_string()).collect(),
            ..Claims::default()
        };

        assert!(claims.satisfies(&PermissionRequirement::None));
        assert!(claims.satisfies(&PermissionRequirement::All(vec![])));
        assert!(claims.satisfies(&"asset:view".into()));
        assert!(claims.satisfies(&["asset:view", "asset:stockin"].into()));
        assert!(!claims.satisfies(&["asset:view", "audit:view"].into()));
        assert!(!claims.satisfies(&"user:manage".into()));
        assert!(claims.satisfies(&PermissionRequirement::from(None::<&str>)));
    }

    #[test]
    fn test_permission_requirement_from_json() {
        let one: PermissionRequirement = serde_json::from_value(json!("asset:admin")).unwrap();
        assert_eq!(one, PermissionRequirement::One("asset:admin".into()));

        let all: PermissionRequirement = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(all.codes(), ["a".to_string(), "b".to_string()]);

        let none: PermissionRequirement = serde_json::from_value(json!(null)).unwrap();
        assert!(none.is_empty());
    }
}
