use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;

/// Typed view of the standard id token claims.
///
/// Every field is optional: providers differ in what they emit and the raw
/// claim map is always kept alongside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct IdTokenClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default, deserialize_with = "audience")]
    pub aud: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub upn: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
}

// `aud` may be a string or an array; the first entry identifies the client.
fn audience<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Aud {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Aud>::deserialize(deserializer)? {
        Some(Aud::One(aud)) => Some(aud),
        Some(Aud::Many(list)) => list.into_iter().next(),
        None => None,
    })
}

/// Decoded (unverified) OIDC id token.
#[derive(Debug, Clone, PartialEq)]
pub struct IdToken {
    raw: String,
    claims: IdTokenClaims,
    raw_claims: Map<String, JsonValue>,
}

impl IdToken {
    /// Decodes the payload segment of a compact JWT.
    ///
    /// The signature is not checked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if the token is not a three-part JWT or the
    /// payload is not a base64url JSON object.
    pub fn decode(raw: &str) -> Result<Self, Error> {
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::Token("id token is not a compact JWT".into()));
        }

        let payload = URL_SAFE_NO_PAD
            .decode(parts[1].trim_end_matches('='))
            .map_err(|e| Error::Token(format!("invalid id token payload: {e}")))?;

        let raw_claims: Map<String, JsonValue> = serde_json::from_slice(&payload)
            .map_err(|e| Error::Token(format!("invalid id token claims: {e}")))?;

        let claims: IdTokenClaims = serde_json::from_value(JsonValue::Object(raw_claims.clone()))
            .map_err(|e| Error::Token(format!("invalid id token claims: {e}")))?;

        Ok(Self {
            raw: raw.to_owned(),
            claims,
            raw_claims,
        })
    }

    /// The compact token as received.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn claims(&self) -> &IdTokenClaims {
        &self.claims
    }

    /// Every claim, including non-standard ones.
    #[must_use]
    pub fn raw_claims(&self) -> &Map<String, JsonValue> {
        &self.raw_claims
    }

    /// Object id if present, else subject.
    #[must_use]
    pub fn local_account_id(&self) -> Option<&str> {
        self.claims.oid.as_deref().or(self.claims.sub.as_deref())
    }

    /// Sign-in name: `preferred_username`, else `upn`, else `email`.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.claims
            .preferred_username
            .as_deref()
            .or(self.claims.upn.as_deref())
            .or(self.claims.email.as_deref())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;

    /// Unsigned JWT carrying `claims`.
    pub(crate) fn encode_jwt(claims: &JsonValue) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn test_decode_standard_claims() {
        let raw = encode_jwt(&json!({
            "iss": "https://login.example.com/tenant-1/v2.0",
            "sub": "subject-1",
            "aud": "client-a",
            "exp": 1_700_000_000,
            "nonce": "n1",
            "name": "Ada Lovelace",
            "preferred_username": "ada@example.com",
            "oid": "object-1",
            "tid": "tenant-1",
            "custom": true,
        }));

        let token = IdToken::decode(&raw).unwrap();
        assert_eq!(token.raw(), raw);
        assert_eq!(token.claims().nonce.as_deref(), Some("n1"));
        assert_eq!(token.claims().aud.as_deref(), Some("client-a"));
        assert_eq!(token.local_account_id(), Some("object-1"));
        assert_eq!(token.username(), Some("ada@example.com"));
        assert_eq!(token.raw_claims()["custom"], json!(true));
    }

    #[test]
    fn test_audience_array_takes_first() {
        let raw = encode_jwt(&json!({ "sub": "s", "aud": ["client-a", "api"] }));
        let token = IdToken::decode(&raw).unwrap();
        assert_eq!(token.claims().aud.as_deref(), Some("client-a"));
    }

    #[test]
    fn test_fallbacks_without_oid_or_preferred_username() {
        let raw = encode_jwt(&json!({ "sub": "subject-1", "upn": "ada@corp" }));
        let token = IdToken::decode(&raw).unwrap();
        assert_eq!(token.local_account_id(), Some("subject-1"));
        assert_eq!(token.username(), Some("ada@corp"));
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert!(matches!(IdToken::decode("not-a-jwt"), Err(Error::Token(_))));
        assert!(matches!(IdToken::decode("a.!!!.c"), Err(Error::Token(_))));

        let not_object = format!("h.{}.s", URL_SAFE_NO_PAD.encode("[1,2]"));
        assert!(matches!(IdToken::decode(&not_object), Err(Error::Token(_))));
    }
}
