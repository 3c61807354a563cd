use std::sync::{Arc, Mutex, PoisonError};

use url::Url;

use crate::account::{self, Account};
use crate::authority::Authority;
use crate::cache::{CacheManager, CacheStorage, TemporaryCacheKey};
use crate::config::{AuthConfig, UriSource};
use crate::error::Error;
use crate::network::NetworkModule;
use crate::request::AuthenticationParameters;
use crate::request_params::ServerRequestParameters;
use crate::response::{self, AuthResponse, ResponseParser, ResponseStateInfo};
use crate::scopes;

#[cfg(feature = "reqwest")]
use crate::network::ReqwestNetwork;

/// Implicit-flow client.
///
/// The flow runs in two phases separated by a full page navigation:
///
/// 1. [`create_login_url`](Self::create_login_url) issues a `state` and `nonce`,
///    records them in the temporary cache and returns the URL to navigate to.
/// 2. After the provider redirects back,
///    [`handle_response`](Self::handle_response) matches the echoed `state`,
///    parses the fragment and persists the session.
///
/// Both phases only share what is in the [`CacheStorage`], so the client may
/// be rebuilt between them.
pub struct AuthClient<S, N> {
    config: AuthConfig,
    cache: CacheManager<S>,
    network: N,
    default_authority: Mutex<Authority>,
    account: Mutex<Option<Arc<Account>>>,
}

#[cfg(feature = "reqwest")]
impl<S: CacheStorage> AuthClient<S, ReqwestNetwork> {
    /// Create a client using `reqwest` for authority discovery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the configured authority is invalid.
    pub fn with_reqwest(config: AuthConfig, storage: Arc<S>) -> Result<Self, Error> {
        Self::new(config, storage, ReqwestNetwork::new())
    }
}

impl<S: CacheStorage, N: NetworkModule> AuthClient<S, N> {
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the configured authority is invalid.
    pub fn new(config: AuthConfig, storage: Arc<S>, network: N) -> Result<Self, Error> {
        let default_authority = Authority::resolve(config.authority())?;
        let cache = CacheManager::new(storage, config.client_id());
        Ok(Self {
            config,
            cache,
            network,
            default_authority: Mutex::new(default_authority),
            account: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &CacheManager<S> {
        &self.cache
    }

    /// Builds the login navigation URL and records the flow in the temporary cache.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if no redirect URI is configured or the
    ///   authority cannot be resolved.
    /// - [`Error::InvalidRequest`] if the request parameters conflict.
    /// - [`Error::Network`] / [`Error::Discovery`] if endpoint discovery fails.
    pub async fn create_login_url(&self, request: AuthenticationParameters) -> Result<String, Error> {
        self.create_navigate_url(request, true).await
    }

    /// Builds a token request navigation URL for `request.scopes`.
    ///
    /// # Errors
    ///
    /// Same as [`create_login_url`](Self::create_login_url); additionally
    /// [`Error::InvalidRequest`] if no scopes are requested.
    pub async fn create_acquire_token_url(
        &self,
        request: AuthenticationParameters,
    ) -> Result<String, Error> {
        self.create_navigate_url(request, false).await
    }

    async fn create_navigate_url(
        &self,
        mut request: AuthenticationParameters,
        is_login_call: bool,
    ) -> Result<String, Error> {
        let redirect_uri = self.get_redirect_uri()?;
        let authority = self.resolve_authority(request.authority.as_deref()).await?;

        if is_login_call {
            let mut merged = self.config.login_scopes().to_vec();
            scopes::append_unique(&mut merged, request.scopes.as_slice());
            request.scopes = merged;
        }

        let account = match request.account.clone() {
            Some(account) => Some(account),
            None => self.session_account(),
        };
        request.account = account.clone();

        let mut params = ServerRequestParameters::new(
            authority,
            self.config.client_id(),
            &request,
            is_login_call,
            false,
            account,
            redirect_uri.as_str(),
        )?;
        params.append_extra_scopes();
        params.populate_query_params();
        let url = params.create_navigate_url()?;

        let start_page = request
            .redirect_start_page
            .clone()
            .unwrap_or_else(|| redirect_uri.clone());
        self.cache
            .set_temporary(TemporaryCacheKey::RequestState, params.state());
        self.cache
            .set_temporary(TemporaryCacheKey::Nonce, params.nonce());
        self.cache.set_temporary(
            TemporaryCacheKey::RequestScopes,
            &scopes::join_scopes(params.scopes()),
        );
        self.cache
            .set_temporary(TemporaryCacheKey::LoginStartPage, &start_page);

        tracing::debug!(
            correlation_id = %params.correlation_id(),
            is_login_call,
            "Navigation URL created"
        );

        Ok(url)
    }

    /// Request override if any, else the default authority (discovered once).
    async fn resolve_authority(&self, authority_override: Option<&str>) -> Result<Authority, Error> {
        if let Some(url) = authority_override {
            return Authority::resolve(url)?
                .resolve_endpoints(&self.network)
                .await;
        }

        let current = self.default_authority();
        if current.is_resolved() {
            return Ok(current);
        }

        let resolved = current.resolve_endpoints(&self.network).await?;
        *self
            .default_authority
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = resolved.clone();
        Ok(resolved)
    }

    fn default_authority(&self) -> Authority {
        self.default_authority
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reads the echoed `state` and compares it with the cached request state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedResponse`] if the fragment cannot be decoded
    /// or has no `state`.
    pub fn extract_response_state(&self, hash: &str) -> Result<ResponseStateInfo, Error> {
        response::extract_response_state(hash, &self.cache)
    }

    /// Validates the provider's redirect fragment and establishes the session.
    ///
    /// `hash` may be the bare fragment or the full URL the provider redirected to.
    ///
    /// # Errors
    ///
    /// - [`Error::UnexpectedResponse`] if the fragment is not an
    ///   authentication response; the cache is left untouched.
    /// - [`Error::StateMismatch`] if the state was not issued by this client;
    ///   no token material is used.
    /// - Provider, nonce and token decoding errors from [`ResponseParser`].
    pub fn handle_response(&self, hash: &str) -> Result<AuthResponse, Error> {
        let state_info = self.extract_response_state(hash)?;
        let account = self.session_account();

        let response = ResponseParser::new(self.config.client_id(), &self.cache, account)
            .parse_response_from_hash(hash, &state_info)?;

        if let (Some(_), Some(account)) = (&response.id_token, &response.account) {
            *self.account.lock().unwrap_or_else(PoisonError::into_inner) = Some(account.clone());
            tracing::info!(
                home_account_id = %account.home_account_id,
                "Session established"
            );
        }

        Ok(response)
    }

    /// Account used for SSO hints and response handling.
    ///
    /// An unreadable persisted session is discarded so a new sign-in can
    /// replace it.
    fn session_account(&self) -> Option<Arc<Account>> {
        match self.get_account() {
            Ok(account) => account,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted session");
                self.cache.clear_persistent();
                None
            }
        }
    }

    /// Current account, loaded from the persistent cache on first use.
    ///
    /// Returns `Ok(None)` when there is no session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if the persisted session cannot be decoded.
    pub fn get_account(&self) -> Result<Option<Arc<Account>>, Error> {
        let mut slot = self.account.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(account) = slot.as_ref() {
            return Ok(Some(account.clone()));
        }

        let Some(account) = account::resolve_persisted(&self.cache)? else {
            return Ok(None);
        };
        let account = Arc::new(account);
        *slot = Some(account.clone());
        Ok(Some(account))
    }

    /// Forgets the in-memory account; the next read reloads it from the cache.
    pub fn clear_account(&self) {
        *self.account.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no redirect URI is configured.
    pub fn get_redirect_uri(&self) -> Result<String, Error> {
        resolve_uri(self.config.redirect_uri(), "redirect_uri")
    }

    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no post-logout redirect URI is configured.
    pub fn get_post_logout_redirect_uri(&self) -> Result<String, Error> {
        resolve_uri(
            self.config.post_logout_redirect_uri(),
            "post_logout_redirect_uri",
        )
    }

    /// Ends the local session and returns the provider's sign-out URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the provider has no end-session
    /// endpoint, or discovery errors. The session is kept on error.
    pub async fn create_logout_url(&self) -> Result<String, Error> {
        let authority = self.resolve_authority(None).await?;
        let mut url: Url = authority
            .end_session_endpoint()
            .cloned()
            .ok_or_else(|| {
                Error::Configuration("authority has no end_session_endpoint".into())
            })?;

        if let Some(uri) = self.config.post_logout_redirect_uri() {
            url.query_pairs_mut()
                .append_pair("post_logout_redirect_uri", &uri.resolve());
        }

        self.cache.clear_persistent();
        self.cache.reset_temporary();
        self.clear_account();
        tracing::info!(client_id = self.config.client_id(), "Signed out");

        Ok(url.into())
    }
}

fn resolve_uri(source: Option<&UriSource>, name: &str) -> Result<String, Error> {
    source
        .map(UriSource::resolve)
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| Error::Configuration(format!("{name} is not configured")))
}
