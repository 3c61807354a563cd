use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use url::Url;

use crate::cache::{CacheManager, CacheStorage, PersistentCacheKey};
use crate::client_info::ClientInfo;
use crate::error::Error;
use crate::id_token::IdToken;
use crate::types::{HomeAccountId, TenantId};

/// Signed-in user, derived from an id token and the matching client info.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Account {
    pub home_account_id: HomeAccountId,
    /// `oid` claim, else `sub`.
    pub local_account_id: Option<String>,
    /// Sign-in name, used as `login_hint`.
    pub username: Option<String>,
    /// Display name.
    pub name: Option<String>,
    pub tenant_id: Option<TenantId>,
    /// Issuer host.
    pub environment: Option<String>,
    pub id_token_claims: Map<String, JsonValue>,
}

impl Account {
    #[must_use]
    pub fn from_tokens(id_token: &IdToken, client_info: &ClientInfo) -> Self {
        let claims = id_token.claims();

        let tenant_id = Some(client_info.utid.as_str())
            .filter(|utid| !utid.is_empty())
            .or(claims.tid.as_deref())
            .map(|t| TenantId(t.to_owned()));

        let environment = claims
            .iss
            .as_deref()
            .and_then(|iss| Url::parse(iss).ok())
            .and_then(|iss| iss.host_str().map(str::to_owned));

        Self {
            home_account_id: client_info.home_account_id(),
            local_account_id: id_token.local_account_id().map(str::to_owned),
            username: id_token.username().map(str::to_owned),
            name: claims.name.clone(),
            tenant_id,
            environment,
            id_token_claims: id_token.raw_claims().clone(),
        }
    }

    /// `sid` claim, used to target an existing provider session.
    #[must_use]
    pub fn sid(&self) -> Option<&str> {
        self.id_token_claims.get("sid").and_then(JsonValue::as_str)
    }
}

/// Re-derives the account from the persisted id token and client info.
///
/// Returns `Ok(None)` when either entry is missing or empty: no session is a
/// normal state.
///
/// # Errors
///
/// Returns [`Error::Token`] if a persisted entry is present but cannot be
/// decoded.
pub fn resolve_persisted<S: CacheStorage>(
    cache: &CacheManager<S>,
) -> Result<Option<Account>, Error> {
    let Some(raw_id_token) = cache.get_persistent(PersistentCacheKey::IdToken) else {
        return Ok(None);
    };
    let Some(raw_client_info) = cache.get_persistent(PersistentCacheKey::ClientInfo) else {
        return Ok(None);
    };

    let id_token = IdToken::decode(&raw_id_token)?;
    let client_info = ClientInfo::decode(&raw_client_info)?;

    Ok(Some(Account::from_tokens(&id_token, &client_info)))
}
