use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::error::Error;
use crate::scopes;

/// A configured URI: either a fixed value or a callback evaluated at read time.
///
/// Callbacks let the redirect target follow the hosting page (for example the
/// current origin) without rebuilding the client.
#[derive(Clone)]
pub enum UriSource {
    Literal(String),
    Callback(Arc<dyn Fn() -> String + Send + Sync>),
}

impl UriSource {
    /// Wraps a closure as a callback source.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    /// Current value. Callbacks are re-evaluated on every call.
    #[must_use]
    pub fn resolve(&self) -> String {
        match self {
            Self::Literal(uri) => uri.clone(),
            Self::Callback(f) => f(),
        }
    }
}

impl fmt::Debug for UriSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(uri) => f.debug_tuple("Literal").field(uri).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl From<&str> for UriSource {
    fn from(uri: &str) -> Self {
        Self::Literal(uri.to_owned())
    }
}

impl From<String> for UriSource {
    fn from(uri: String) -> Self {
        Self::Literal(uri)
    }
}

impl From<Url> for UriSource {
    fn from(uri: Url) -> Self {
        Self::Literal(uri.into())
    }
}

/// Implicit-flow client configuration.
///
/// Required fields are constructor parameters. Redirect URIs are optional here
/// and checked when they are read, so a client can be built before the hosting
/// page knows its own location.
///
/// ```rust,ignore
/// use implicit_auth::{AuthConfig, UriSource};
///
/// let config = AuthConfig::new("my-client-id", "https://login.example.com/contoso")
///     .with_redirect_uri("https://my-app.com/")
///     .with_post_logout_redirect_uri(UriSource::callback(|| current_origin()));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct AuthConfig {
    pub(crate) client_id: String,
    pub(crate) authority: String,
    pub(crate) redirect_uri: Option<UriSource>,
    pub(crate) post_logout_redirect_uri: Option<UriSource>,
    pub(crate) login_scopes: Vec<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(client_id: impl Into<String>, authority: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            authority: authority.into(),
            redirect_uri: None,
            post_logout_redirect_uri: None,
            login_scopes: scopes::LOGIN_SCOPES.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `IMPLICIT_AUTH_CLIENT_ID`: client identifier registered with the provider
    /// - `IMPLICIT_AUTH_AUTHORITY`: issuer URL (https)
    ///
    /// # Optional env vars
    /// - `IMPLICIT_AUTH_REDIRECT_URI`
    /// - `IMPLICIT_AUTH_POST_LOGOUT_REDIRECT_URI`
    /// - `IMPLICIT_AUTH_SCOPES`: comma-separated default login scopes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if required env vars are missing or a
    /// redirect URI is not a valid URL.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from `IMPLICIT_AUTH_*` values supplied by `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name).ok_or_else(|| Error::Configuration(format!("{name} is required")))
        };
        let uri = |name: &str| -> Result<Option<Url>, Error> {
            lookup(name)
                .map(|uri| {
                    uri.parse()
                        .map_err(|e| Error::Configuration(format!("{name}: {e}")))
                })
                .transpose()
        };

        let mut config = Self::new(
            required("IMPLICIT_AUTH_CLIENT_ID")?,
            required("IMPLICIT_AUTH_AUTHORITY")?,
        );

        if let Some(uri) = uri("IMPLICIT_AUTH_REDIRECT_URI")? {
            config = config.with_redirect_uri(uri);
        }
        if let Some(uri) = uri("IMPLICIT_AUTH_POST_LOGOUT_REDIRECT_URI")? {
            config = config.with_post_logout_redirect_uri(uri);
        }
        if let Some(list) = lookup("IMPLICIT_AUTH_SCOPES") {
            config = config.with_login_scopes(
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<UriSource>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn with_post_logout_redirect_uri(mut self, uri: impl Into<UriSource>) -> Self {
        self.post_logout_redirect_uri = Some(uri.into());
        self
    }

    /// Override the scopes requested on login (default: `["openid", "profile"]`).
    ///
    /// `openid` and `profile` are always added back when the URL is built.
    #[must_use]
    pub fn with_login_scopes(mut self, scopes: Vec<String>) -> Self {
        self.login_scopes = scopes;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Default authority URL, as configured.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    #[must_use]
    pub fn redirect_uri(&self) -> Option<&UriSource> {
        self.redirect_uri.as_ref()
    }

    #[must_use]
    pub fn post_logout_redirect_uri(&self) -> Option<&UriSource> {
        self.post_logout_redirect_uri.as_ref()
    }

    #[must_use]
    pub fn login_scopes(&self) -> &[String] {
        &self.login_scopes
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_config_constructor() {
        let config = AuthConfig::new("my-app", "https://login.example.com/common");

        assert_eq!(config.client_id(), "my-app");
        assert_eq!(config.authority(), "https://login.example.com/common");
        assert!(config.redirect_uri().is_none());
        assert_eq!(config.login_scopes(), &["openid", "profile"]);
    }

    fn lookup_from(
        vars: &[(&'static str, &'static str)],
    ) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        move |name| vars.get(name).map(|v| (*v).to_string())
    }

    #[test]
    fn test_from_lookup() {
        let config = AuthConfig::from_lookup(lookup_from(&[
            ("IMPLICIT_AUTH_CLIENT_ID", "env-app"),
            ("IMPLICIT_AUTH_AUTHORITY", "https://login.example.com/contoso"),
            ("IMPLICIT_AUTH_REDIRECT_URI", "https://my-app.com/"),
            ("IMPLICIT_AUTH_SCOPES", "openid, User.Read,,"),
        ]))
        .unwrap();

        assert_eq!(config.client_id(), "env-app");
        assert_eq!(config.authority(), "https://login.example.com/contoso");
        assert_eq!(
            config.redirect_uri().map(UriSource::resolve).as_deref(),
            Some("https://my-app.com/")
        );
        assert!(config.post_logout_redirect_uri().is_none());
        assert_eq!(config.login_scopes(), &["openid", "User.Read"]);
    }

    #[test]
    fn test_from_lookup_errors() {
        let bad_uri = AuthConfig::from_lookup(lookup_from(&[
            ("IMPLICIT_AUTH_CLIENT_ID", "env-app"),
            ("IMPLICIT_AUTH_AUTHORITY", "https://login.example.com/contoso"),
            ("IMPLICIT_AUTH_REDIRECT_URI", "not a url"),
        ]));
        assert!(matches!(bad_uri, Err(Error::Configuration(_))));

        let missing = AuthConfig::from_lookup(lookup_from(&[(
            "IMPLICIT_AUTH_AUTHORITY",
            "https://login.example.com/contoso",
        )]));
        assert!(matches!(missing, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_literal_uri_resolves_unchanged() {
        let source = UriSource::from("https://my-app.com/callback");
        assert_eq!(source.resolve(), "https://my-app.com/callback");
    }

    #[test]
    fn test_callback_uri_evaluated_each_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let source = UriSource::callback(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            format!("https://my-app.com/{n}")
        });

        assert_eq!(source.resolve(), "https://my-app.com/0");
        assert_eq!(source.resolve(), "https://my-app.com/1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_url_source_keeps_serialization() {
        let url: Url = "https://my-app.com/".parse().unwrap();
        let source = UriSource::from(url);
        assert_eq!(source.resolve(), "https://my-app.com/");
        assert_eq!(format!("{source:?}"), "Literal(\"https://my-app.com/\")");
    }
}
