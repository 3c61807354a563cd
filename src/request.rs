use std::fmt;
use std::sync::Arc;

use crate::account::Account;

/// `prompt` values accepted by the authorization endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Prompt {
    Login,
    SelectAccount,
    Consent,
    None,
}

impl Prompt {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::SelectAccount => "select_account",
            Self::Consent => "consent",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied options for a login or token request.
///
/// ```rust,ignore
/// let request = AuthenticationParameters::new()
///     .with_scopes(["User.Read"])
///     .with_prompt(Prompt::SelectAccount)
///     .with_extra_query_parameter("ui_locales", "fr");
/// ```
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct AuthenticationParameters {
    pub scopes: Vec<String>,
    pub extra_scopes_to_consent: Vec<String>,
    pub prompt: Option<Prompt>,
    /// Used verbatim as the `state` token when set.
    pub state: Option<String>,
    /// Overrides the client's default authority for this request.
    pub authority: Option<String>,
    pub login_hint: Option<String>,
    pub sid: Option<String>,
    pub domain_hint: Option<String>,
    /// Page to return to after the response is handled.
    pub redirect_start_page: Option<String>,
    pub extra_query_parameters: Vec<(String, String)>,
    /// Filled in by the client from the current session.
    pub account: Option<Arc<Account>>,
}

impl AuthenticationParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_extra_scopes_to_consent<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_scopes_to_consent = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: Prompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    #[must_use]
    pub fn with_login_hint(mut self, login_hint: impl Into<String>) -> Self {
        self.login_hint = Some(login_hint.into());
        self
    }

    #[must_use]
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    #[must_use]
    pub fn with_domain_hint(mut self, domain_hint: impl Into<String>) -> Self {
        self.domain_hint = Some(domain_hint.into());
        self
    }

    #[must_use]
    pub fn with_redirect_start_page(mut self, page: impl Into<String>) -> Self {
        self.redirect_start_page = Some(page.into());
        self
    }

    #[must_use]
    pub fn with_extra_query_parameter(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.extra_query_parameters.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_account(mut self, account: Arc<Account>) -> Self {
        self.account = Some(account);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let request = AuthenticationParameters::new()
            .with_scopes(["User.Read"])
            .with_prompt(Prompt::Consent)
            .with_state("s1")
            .with_extra_query_parameter("ui_locales", "fr");

        assert_eq!(request.scopes, vec!["User.Read".to_string()]);
        assert_eq!(request.prompt, Some(Prompt::Consent));
        assert_eq!(request.state.as_deref(), Some("s1"));
        assert_eq!(
            request.extra_query_parameters,
            vec![("ui_locales".to_string(), "fr".to_string())]
        );
    }

    #[test]
    fn test_prompt_wire_values() {
        assert_eq!(Prompt::SelectAccount.to_string(), "select_account");
        assert_eq!(Prompt::None.as_str(), "none");
    }
}
