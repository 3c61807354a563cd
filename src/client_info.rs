use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::id_token::IdToken;
use crate::types::HomeAccountId;

/// Provider-issued `{uid, utid}` pair, sent when `client_info=1` is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub uid: String,
    pub utid: String,
}

impl ClientInfo {
    /// Decodes the base64url JSON form carried in the response fragment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if the value is not base64url JSON with `uid`
    /// and `utid` strings.
    pub fn decode(raw: &str) -> Result<Self, Error> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw.trim().trim_end_matches('='))
            .map_err(|e| Error::Token(format!("invalid client info encoding: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Token(format!("invalid client info: {e}")))
    }

    /// Builds client info from id token claims for providers that omit it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if the token carries neither `oid` nor `sub`.
    pub fn from_id_token(id_token: &IdToken) -> Result<Self, Error> {
        let uid = id_token
            .local_account_id()
            .ok_or_else(|| Error::Token("id token has no oid or sub claim".into()))?;
        Ok(Self {
            uid: uid.to_owned(),
            utid: id_token.claims().tid.clone().unwrap_or_default(),
        })
    }

    /// Base64url JSON form, as persisted.
    #[must_use]
    pub fn encode(&self) -> String {
        let json = serde_json::json!({ "uid": self.uid, "utid": self.utid });
        URL_SAFE_NO_PAD.encode(json.to_string())
    }

    #[must_use]
    pub fn home_account_id(&self) -> HomeAccountId {
        HomeAccountId::new(&self.uid, &self.utid)
    }
}
