//! Issuer descriptor and OIDC endpoint discovery.

use serde::Deserialize;
use url::Url;

use crate::error::Error;
use crate::network::NetworkModule;

const OPENID_CONFIGURATION_PATH: &str = ".well-known/openid-configuration";

/// Endpoints advertised by the authority's discovery document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct AuthorityEndpoints {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub end_session_endpoint: Option<Url>,
}

#[derive(Deserialize)]
struct OpenIdConfiguration {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    #[serde(default)]
    end_session_endpoint: Option<String>,
}

/// Resolved issuer: canonical URL, tenant, and (after discovery) endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    canonical: Url,
    tenant: String,
    endpoints: Option<AuthorityEndpoints>,
}

impl Authority {
    /// Parses and normalizes an authority URL.
    ///
    /// The canonical form is lower-case, always ends with `/`, and drops any
    /// query or fragment. The first path segment is the tenant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the URL is not `https` (plain `http`
    /// is accepted for loopback hosts) or has no tenant segment.
    pub fn resolve(authority_url: &str) -> Result<Self, Error> {
        let trimmed = authority_url.trim();
        if trimmed.is_empty() {
            return Err(Error::Configuration("authority is not configured".into()));
        }

        let mut canonical: Url = trimmed
            .to_ascii_lowercase()
            .parse()
            .map_err(|e| Error::Configuration(format!("invalid authority '{trimmed}': {e}")))?;

        if canonical.scheme() != "https" && !is_loopback_http(&canonical) {
            return Err(Error::Configuration(format!(
                "authority must use https: '{trimmed}'"
            )));
        }

        canonical.set_query(None);
        canonical.set_fragment(None);
        if !canonical.path().ends_with('/') {
            let path = format!("{}/", canonical.path());
            canonical.set_path(&path);
        }

        let tenant = canonical
            .path_segments()
            .and_then(|mut segments| segments.find(|s| !s.is_empty()))
            .map(str::to_owned)
            .ok_or_else(|| {
                Error::Configuration(format!("authority has no tenant segment: '{trimmed}'"))
            })?;

        Ok(Self {
            canonical,
            tenant,
            endpoints: None,
        })
    }

    /// Returns a copy of this authority with its endpoints discovered.
    ///
    /// Already-resolved authorities are returned as-is without a network call.
    ///
    /// # Errors
    ///
    /// Returns the network module's error on transport failure, or
    /// [`Error::Discovery`] if the document lacks required endpoints.
    pub async fn resolve_endpoints<N: NetworkModule>(&self, network: &N) -> Result<Self, Error> {
        if self.endpoints.is_some() {
            return Ok(self.clone());
        }

        let url = self.openid_configuration_url()?;
        tracing::debug!(url = %url, "Resolving authority endpoints");

        let document = network.get_json(&url).await?;
        let config: OpenIdConfiguration = serde_json::from_value(document)
            .map_err(|e| Error::Discovery(format!("invalid openid configuration: {e}")))?;

        let endpoints = AuthorityEndpoints {
            issuer: config.issuer,
            authorization_endpoint: parse_endpoint(
                "authorization_endpoint",
                &config.authorization_endpoint,
            )?,
            token_endpoint: parse_endpoint("token_endpoint", &config.token_endpoint)?,
            end_session_endpoint: config
                .end_session_endpoint
                .as_deref()
                .map(|e| parse_endpoint("end_session_endpoint", e))
                .transpose()?,
        };

        Ok(Self {
            endpoints: Some(endpoints),
            ..self.clone()
        })
    }

    /// Canonical authority URL (trailing slash included).
    #[must_use]
    pub fn canonical_authority(&self) -> &Url {
        &self.canonical
    }

    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.endpoints.is_some()
    }

    #[must_use]
    pub fn endpoints(&self) -> Option<&AuthorityEndpoints> {
        self.endpoints.as_ref()
    }

    /// Discovery document location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the canonical URL cannot be joined.
    pub fn openid_configuration_url(&self) -> Result<Url, Error> {
        self.canonical
            .join(OPENID_CONFIGURATION_PATH)
            .map_err(|e| Error::Configuration(format!("invalid discovery url: {e}")))
    }

    /// Authorization endpoint, available once endpoints are resolved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if discovery has not run.
    pub fn authorization_endpoint(&self) -> Result<&Url, Error> {
        self.endpoints
            .as_ref()
            .map(|e| &e.authorization_endpoint)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "authority endpoints not resolved: {}",
                    self.canonical
                ))
            })
    }

    /// End-session endpoint, if the provider advertises one.
    #[must_use]
    pub fn end_session_endpoint(&self) -> Option<&Url> {
        self.endpoints.as_ref().and_then(|e| e.end_session_endpoint.as_ref())
    }
}

/// Plain http is tolerated for local development providers only.
fn is_loopback_http(url: &Url) -> bool {
    url.scheme() == "http"
        && matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"))
}

fn parse_endpoint(name: &str, value: &str) -> Result<Url, Error> {
    value
        .parse()
        .map_err(|e| Error::Discovery(format!("{name} '{value}': {e}")))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{Value as JsonValue, json};

    use super::*;

    /// Discovery stub answering every URL with the same document.
    #[derive(Default)]
    pub(crate) struct StaticNetwork {
        pub(crate) calls: AtomicUsize,
        pub(crate) document: Option<JsonValue>,
    }

    impl StaticNetwork {
        pub(crate) fn for_issuer(issuer: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                document: Some(json!({
                    "issuer": issuer,
                    "authorization_endpoint": format!("{issuer}/oauth2/authorize"),
                    "token_endpoint": format!("{issuer}/oauth2/token"),
                    "end_session_endpoint": format!("{issuer}/oauth2/logout"),
                })),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl NetworkModule for StaticNetwork {
        async fn get_json(&self, url: &Url) -> Result<JsonValue, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.document.clone().ok_or_else(|| Error::Network {
                operation: "authority discovery",
                status: Some(404),
                detail: url.to_string(),
            })
        }
    }

    #[test]
    fn test_resolve_normalizes() {
        let authority = Authority::resolve("https://Login.Example.com/Contoso?x=1").unwrap();
        assert_eq!(
            authority.canonical_authority().as_str(),
            "https://login.example.com/contoso/"
        );
        assert_eq!(authority.tenant(), "contoso");
        assert!(!authority.is_resolved());
    }

    #[test]
    fn test_resolve_rejects_http_and_missing_tenant() {
        assert!(matches!(
            Authority::resolve("http://login.example.com/common"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Authority::resolve("https://login.example.com/"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(Authority::resolve(""), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_resolve_allows_loopback_http() {
        let authority = Authority::resolve("http://127.0.0.1:8080/dev").unwrap();
        assert_eq!(authority.tenant(), "dev");
    }

    #[test]
    fn test_discovery_url() {
        let authority = Authority::resolve("https://login.example.com/common").unwrap();
        assert_eq!(
            authority.openid_configuration_url().unwrap().as_str(),
            "https://login.example.com/common/.well-known/openid-configuration"
        );
    }

    #[test]
    fn test_unresolved_authorization_endpoint_is_config_error() {
        let authority = Authority::resolve("https://login.example.com/common").unwrap();
        assert!(matches!(
            authority.authorization_endpoint(),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_endpoints_once() {
        let network = StaticNetwork::for_issuer("https://login.example.com/common");
        let authority = Authority::resolve("https://login.example.com/common").unwrap();

        let resolved = authority.resolve_endpoints(&network).await.unwrap();
        assert_eq!(
            resolved.authorization_endpoint().unwrap().as_str(),
            "https://login.example.com/common/oauth2/authorize"
        );
        assert!(resolved.end_session_endpoint().is_some());

        let again = resolved.resolve_endpoints(&network).await.unwrap();
        assert_eq!(again, resolved);
        assert_eq!(network.call_count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_endpoints_propagates_network_error() {
        let network = StaticNetwork::default();
        let authority = Authority::resolve("https://login.example.com/common").unwrap();
        let err = authority.resolve_endpoints(&network).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_document_is_discovery_error() {
        let network = StaticNetwork {
            calls: AtomicUsize::new(0),
            document: Some(json!({ "issuer": "x" })),
        };
        let authority = Authority::resolve("https://login.example.com/common").unwrap();
        assert!(matches!(
            authority.resolve_endpoints(&network).await,
            Err(Error::Discovery(_))
        ));
    }
}
