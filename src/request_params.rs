//! Authorization request construction.

use std::sync::Arc;

use crate::account::Account;
use crate::authority::Authority;
use crate::error::Error;
use crate::random;
use crate::request::{AuthenticationParameters, Prompt};
use crate::scopes;
use crate::types::CorrelationId;

/// Home tenant of personal accounts; selects `domain_hint=consumers`.
const CONSUMER_TENANT_ID: &str = "9188040d-6c67-4c5b-b112-36a304b66dad";

/// Keys the builder owns; callers may not override them.
const RESERVED_PARAMETERS: [&str; 7] = [
    "state",
    "nonce",
    "client_id",
    "response_type",
    "redirect_uri",
    "scope",
    "response_mode",
];

/// Validated request ready to be turned into a navigation URL.
///
/// Owns the freshly issued `state` and `nonce`, which the caller must cache
/// before navigating.
#[derive(Debug, Clone)]
pub struct ServerRequestParameters {
    authority: Authority,
    client_id: String,
    redirect_uri: String,
    scopes: Vec<String>,
    extra_scopes_to_consent: Vec<String>,
    response_type: &'static str,
    state: String,
    nonce: String,
    correlation_id: CorrelationId,
    prompt: Option<Prompt>,
    login_hint: Option<String>,
    sid: Option<String>,
    domain_hint: Option<String>,
    extra_query_parameters: Vec<(String, String)>,
    query_parameters: Vec<(String, String)>,
    account: Option<Arc<Account>>,
    is_silent_call: bool,
}

impl ServerRequestParameters {
    /// Validates `request` and issues the state and nonce for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for malformed scopes, a token request
    /// without scopes, a `sid` combined with `prompt=login` or
    /// `prompt=select_account`, or extra query parameters that shadow protocol
    /// parameters.
    pub fn new(
        authority: Authority,
        client_id: impl Into<String>,
        request: &AuthenticationParameters,
        is_login_call: bool,
        is_silent_call: bool,
        account: Option<Arc<Account>>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self, Error> {
        let client_id = client_id.into();

        scopes::validate_scopes(&request.scopes)?;
        scopes::validate_scopes(&request.extra_scopes_to_consent)?;
        Self::validate_prompt(request)?;
        Self::validate_extra_query_parameters(&request.extra_query_parameters)?;

        let scopes = Self::normalize_scopes(&request.scopes, &client_id, is_login_call)?;
        let identity_only = scopes::is_identity_only(&scopes, &client_id);
        let response_type = if identity_only {
            "id_token"
        } else if is_login_call {
            "id_token token"
        } else {
            "token"
        };

        Ok(Self {
            authority,
            client_id,
            redirect_uri: redirect_uri.into(),
            scopes,
            extra_scopes_to_consent: request.extra_scopes_to_consent.clone(),
            response_type,
            state: request.state.clone().unwrap_or_else(random::generate_state),
            nonce: random::generate_nonce(),
            correlation_id: CorrelationId::generate(),
            prompt: request.prompt,
            login_hint: request.login_hint.clone(),
            sid: request.sid.clone(),
            domain_hint: request.domain_hint.clone(),
            extra_query_parameters: request.extra_query_parameters.clone(),
            query_parameters: Vec::new(),
            account,
            is_silent_call,
        })
    }

    fn validate_prompt(request: &AuthenticationParameters) -> Result<(), Error> {
        match (request.prompt, request.sid.as_deref()) {
            (Some(prompt @ (Prompt::Login | Prompt::SelectAccount)), Some(_)) => {
                Err(Error::InvalidRequest(format!(
                    "sid targets an existing session and cannot be combined with prompt={prompt}"
                )))
            }
            _ => Ok(()),
        }
    }

    fn validate_extra_query_parameters(params: &[(String, String)]) -> Result<(), Error> {
        if let Some((key, _)) = params
            .iter()
            .find(|(key, _)| RESERVED_PARAMETERS.contains(&key.as_str()))
        {
            return Err(Error::InvalidRequest(format!(
                "extra query parameter '{key}' is reserved"
            )));
        }
        Ok(())
    }

    fn normalize_scopes(
        requested: &[String],
        client_id: &str,
        is_login_call: bool,
    ) -> Result<Vec<String>, Error> {
        if !is_login_call && requested.is_empty() {
            return Err(Error::InvalidRequest(
                "scopes are required for token requests".into(),
            ));
        }

        let has_client_id = requested.iter().any(|s| s == client_id);
        let mut normalized = Vec::with_capacity(requested.len() + 2);
        if is_login_call || has_client_id {
            scopes::append_unique(&mut normalized, scopes::LOGIN_SCOPES.as_slice());
        }
        let rest: Vec<&String> = requested.iter().filter(|s| *s != client_id).collect();
        scopes::append_unique(&mut normalized, rest.as_slice());
        Ok(normalized)
    }

    /// Adds the scopes the caller wants consented up front.
    pub fn append_extra_scopes(&mut self) {
        let extra = std::mem::take(&mut self.extra_scopes_to_consent);
        scopes::append_unique(&mut self.scopes, extra.as_slice());
    }

    /// Whether single sign-on hints are available for this request.
    #[must_use]
    pub fn is_sso_param(&self, account: Option<&Account>) -> bool {
        self.sid.is_some()
            || self.login_hint.is_some()
            || account.is_some()
            || self
                .extra_query_parameters
                .iter()
                .any(|(key, _)| key == "sid" || key == "login_hint")
    }

    /// Computes SSO hints and appends the caller's extra query parameters.
    ///
    /// Explicit hints win over hints derived from the account; `sid` wins over
    /// `login_hint`. A hint the caller also passes as an extra query parameter
    /// is left to the caller's value.
    pub fn populate_query_params(&mut self) {
        let mut params: Vec<(String, String)> = Vec::new();

        if self.is_sso_param(self.account.as_deref()) {
            let account = self.account.as_deref();
            let mut derived_from_account = false;

            if let Some(sid) = &self.sid {
                params.push(("sid".into(), sid.clone()));
            } else if let Some(hint) = &self.login_hint {
                params.push(("login_hint".into(), hint.clone()));
            } else if let Some(account) = account {
                if let Some(sid) = account.sid().filter(|_| self.is_silent_call) {
                    params.push(("sid".into(), sid.to_owned()));
                } else if let Some(username) = &account.username {
                    params.push(("login_hint".into(), username.clone()));
                    derived_from_account = true;
                }
            }

            let domain_hint = self.domain_hint.clone().or_else(|| {
                account
                    .filter(|_| derived_from_account)
                    .and_then(|a| a.tenant_id.as_ref())
                    .map(|tenant| {
                        if tenant.as_str() == CONSUMER_TENANT_ID {
                            "consumers".to_owned()
                        } else {
                            "organizations".to_owned()
                        }
                    })
            });
            if let Some(domain_hint) = domain_hint {
                params.push(("domain_hint".into(), domain_hint));
            }

            params.retain(|(key, _)| {
                !self
                    .extra_query_parameters
                    .iter()
                    .any(|(extra, _)| extra == key)
            });
        } else if let Some(domain_hint) = &self.domain_hint {
            params.push(("domain_hint".into(), domain_hint.clone()));
        }

        params.extend(self.extra_query_parameters.iter().cloned());
        self.query_parameters = params;
    }

    /// Full authorization URL for browser navigation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the authority endpoints are not
    /// resolved.
    pub fn create_navigate_url(&self) -> Result<String, Error> {
        let mut url = self.authority.authorization_endpoint()?.clone();
        let scope = scopes::join_scopes(&self.scopes);
        let correlation_id = self.correlation_id.to_string();

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", self.response_type)
                .append_pair("scope", &scope)
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("state", &self.state)
                .append_pair("nonce", &self.nonce)
                .append_pair("client_info", "1")
                .append_pair("client-request-id", &correlation_id)
                .append_pair("response_mode", "fragment");

            if let Some(prompt) = self.prompt {
                query.append_pair("prompt", prompt.as_str());
            }
            for (key, value) in &self.query_parameters {
                query.append_pair(key, value);
            }
        }

        tracing::debug!(
            correlation_id = %self.correlation_id,
            response_type = self.response_type,
            "Built authorization URL"
        );

        Ok(url.into())
    }

    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn response_type(&self) -> &'static str {
        self.response_type
    }

    #[must_use]
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }
}
