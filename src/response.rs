//! Parsing of the provider's redirect fragment.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use time::{Duration, OffsetDateTime};

use crate::account::Account;
use crate::cache::{CacheManager, CacheStorage, PersistentCacheKey, TemporaryCacheKey};
use crate::client_info::ClientInfo;
use crate::error::Error;
use crate::id_token::IdToken;
use crate::scopes;
use crate::types::TenantId;

/// Provider error codes that can be resolved by an interactive request.
const INTERACTION_REQUIRED_CODES: [&str; 3] =
    ["interaction_required", "login_required", "consent_required"];

/// Echoed `state` and whether it matches the cached request state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseStateInfo {
    pub state: String,
    pub state_match: bool,
}

/// Kind of token carried by an [`AuthResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    IdToken,
    AccessToken,
}

/// Successful authentication response.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct AuthResponse {
    /// `oid` or `sub` of the signed-in user.
    pub unique_id: Option<String>,
    pub tenant_id: Option<TenantId>,
    pub token_type: TokenType,
    pub id_token: Option<String>,
    pub id_token_claims: Map<String, JsonValue>,
    pub access_token: Option<String>,
    pub scopes: Vec<String>,
    pub expires_on: Option<OffsetDateTime>,
    pub account: Option<Arc<Account>>,
    /// The `state` echoed by the provider.
    pub account_state: String,
    /// Page the login started from, for navigating back.
    pub redirect_start_page: Option<String>,
}

/// Strips the leading `#` (or `#/`) and any URL before it.
fn hash_payload(hash: &str) -> &str {
    let hash = match hash.split_once('#') {
        Some((_, fragment)) => fragment,
        None => hash,
    };
    hash.strip_prefix('/').unwrap_or(hash)
}

/// Decodes a URL fragment into its key/value pairs.
///
/// Accepts a bare fragment (`#a=b`, `a=b`, `#/a=b`) or a whole URL.
///
/// # Errors
///
/// Returns [`Error::UnexpectedResponse`] if the fragment is empty or holds no
/// `key=value` pair.
pub fn deserialize_hash(hash: &str) -> Result<HashMap<String, String>, Error> {
    let payload = hash_payload(hash.trim());
    if payload.is_empty() {
        return Err(Error::UnexpectedResponse("hash is empty".into()));
    }
    if !payload.contains('=') {
        return Err(Error::UnexpectedResponse(
            "hash does not contain key/value pairs".into(),
        ));
    }

    Ok(url::form_urlencoded::parse(payload.as_bytes())
        .into_owned()
        .collect())
}

/// Reads the echoed `state` and compares it with the cached request state.
///
/// A missing cached state counts as a mismatch.
///
/// # Errors
///
/// Returns [`Error::UnexpectedResponse`] if the fragment cannot be decoded or
/// has no `state`.
pub fn extract_response_state<S: CacheStorage>(
    hash: &str,
    cache: &CacheManager<S>,
) -> Result<ResponseStateInfo, Error> {
    let params = deserialize_hash(hash)?;
    let state = params
        .get("state")
        .cloned()
        .ok_or_else(|| Error::UnexpectedResponse("hash does not contain state".into()))?;

    let cached = cache.get_temporary(TemporaryCacheKey::RequestState);
    let state_match = cached.as_deref() == Some(state.as_str());

    Ok(ResponseStateInfo { state, state_match })
}

/// Turns a validated fragment into an [`AuthResponse`].
///
/// On success the id token and client info are persisted. The temporary
/// entries of the flow are consumed whatever the outcome.
pub struct ResponseParser<'a, S> {
    client_id: &'a str,
    cache: &'a CacheManager<S>,
    account: Option<Arc<Account>>,
}

impl<'a, S: CacheStorage> ResponseParser<'a, S> {
    pub fn new(
        client_id: &'a str,
        cache: &'a CacheManager<S>,
        account: Option<Arc<Account>>,
    ) -> Self {
        Self {
            client_id,
            cache,
            account,
        }
    }

    /// # Errors
    ///
    /// - [`Error::StateMismatch`] if `state_info` did not match; nothing is parsed.
    /// - [`Error::Server`] / [`Error::InteractionRequired`] for provider errors.
    /// - [`Error::NonceMismatch`] if the id token was not issued for this request.
    /// - [`Error::Token`] if the id token or client info cannot be decoded.
    /// - [`Error::UnexpectedResponse`] if the fragment carries no token or an
    ///   invalid `expires_in`.
    pub fn parse_response_from_hash(
        &self,
        hash: &str,
        state_info: &ResponseStateInfo,
    ) -> Result<AuthResponse, Error> {
        let params = deserialize_hash(hash)?;

        if !state_info.state_match {
            tracing::warn!(client_id = self.client_id, "Response state does not match request state");
            self.cache.reset_temporary();
            return Err(Error::StateMismatch);
        }

        let cached_nonce = self.cache.get_temporary(TemporaryCacheKey::Nonce);
        let cached_scopes = self.cache.get_temporary(TemporaryCacheKey::RequestScopes);
        let redirect_start_page = self.cache.get_temporary(TemporaryCacheKey::LoginStartPage);
        self.cache.reset_temporary();

        if let Some(code) = params.get("error") {
            let description = params
                .get("error_description")
                .cloned()
                .unwrap_or_default();
            tracing::warn!(error = %code, description = %description, "Error response from provider");
            return Err(if INTERACTION_REQUIRED_CODES.contains(&code.as_str()) {
                Error::InteractionRequired {
                    code: code.clone(),
                    description,
                }
            } else {
                Error::Server {
                    code: code.clone(),
                    description,
                }
            });
        }

        let access_token = params.get("access_token").cloned();
        let expires_on = match params.get("expires_in") {
            Some(raw) if access_token.is_some() => Some(expires_on_from(raw)?),
            _ => None,
        };
        let id_token = params
            .get("id_token")
            .map(|raw| IdToken::decode(raw))
            .transpose()?;

        if id_token.is_none() && access_token.is_none() {
            return Err(Error::UnexpectedResponse(
                "hash contains neither an id token nor an access token".into(),
            ));
        }

        let mut response = AuthResponse {
            unique_id: None,
            tenant_id: None,
            token_type: TokenType::IdToken,
            id_token: None,
            id_token_claims: Map::new(),
            access_token: None,
            scopes: Vec::new(),
            expires_on: None,
            account: self.account.clone(),
            account_state: state_info.state.clone(),
            redirect_start_page,
        };

        if let Some(id_token) = &id_token {
            if id_token.claims().nonce.is_none() || id_token.claims().nonce != cached_nonce {
                tracing::warn!(client_id = self.client_id, "Id token nonce does not match request nonce");
                return Err(Error::NonceMismatch);
            }

            let client_info = match params.get("client_info") {
                Some(raw) => ClientInfo::decode(raw)?,
                None => ClientInfo::from_id_token(id_token)?,
            };
            let account = Arc::new(Account::from_tokens(id_token, &client_info));

            self.cache
                .set_persistent(PersistentCacheKey::IdToken, id_token.raw());
            self.cache
                .set_persistent(PersistentCacheKey::ClientInfo, &client_info.encode());

            response.unique_id = account.local_account_id.clone();
            response.tenant_id = account.tenant_id.clone();
            response.id_token = Some(id_token.raw().to_owned());
            response.id_token_claims = id_token.raw_claims().clone();
            response.scopes = scopes::LOGIN_SCOPES.iter().map(|s| (*s).to_owned()).collect();
            response.expires_on = id_token
                .claims()
                .exp
                .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok());
            response.account = Some(account);
        } else if let Some(account) = &self.account {
            response.unique_id = account.local_account_id.clone();
            response.tenant_id = account.tenant_id.clone();
            response.id_token_claims = account.id_token_claims.clone();
        }

        if let Some(access_token) = access_token {
            response.token_type = TokenType::AccessToken;
            response.access_token = Some(access_token);
            response.scopes = params
                .get("scope")
                .or(cached_scopes.as_ref())
                .map(|s| scopes::parse_scopes(s))
                .unwrap_or_default();
            response.expires_on = expires_on;
        }

        Ok(response)
    }
}

/// Absolute expiry for an `expires_in` lifetime in seconds.
fn expires_on_from(expires_in: &str) -> Result<OffsetDateTime, Error> {
    let invalid = || Error::UnexpectedResponse(format!("invalid expires_in: '{expires_in}'"));
    let secs: i64 = expires_in.trim().parse().map_err(|_| invalid())?;
    if secs < 0 {
        return Err(invalid());
    }
    OffsetDateTime::now_utc()
        .checked_add(Duration::seconds(secs))
        .ok_or_else(invalid)
}
