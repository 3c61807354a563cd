use std::future::Future;

use serde_json::Value as JsonValue;
use url::Url;

use crate::error::Error;

/// Transport used for authority discovery.
///
/// # Example
///
/// ```rust,ignore
/// impl NetworkModule for FetchNetwork {
///     async fn get_json(&self, url: &Url) -> Result<serde_json::Value, Error> {
///         let body = self.fetch(url.as_str()).await?;
///         serde_json::from_str(&body).map_err(|e| Error::Discovery(e.to_string()))
///     }
/// }
/// ```
pub trait NetworkModule: Send + Sync {
    /// `GET` the URL and return the body parsed as JSON.
    fn get_json(&self, url: &Url) -> impl Future<Output = Result<JsonValue, Error>> + Send;
}

/// [`NetworkModule`] backed by a `reqwest` client.
#[cfg(feature = "reqwest")]
#[derive(Debug, Clone, Default)]
pub struct ReqwestNetwork {
    http: reqwest::Client,
}

#[cfg(feature = "reqwest")]
impl ReqwestNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Network {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

#[cfg(feature = "reqwest")]
impl NetworkModule for ReqwestNetwork {
    async fn get_json(&self, url: &Url) -> Result<JsonValue, Error> {
        let response = self.http.get(url.clone()).send().await?;
        let response = Self::ensure_success(response, "authority discovery").await?;
        response.json::<JsonValue>().await.map_err(Into::into)
    }
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_get_json_parses_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "issuer": "x" })))
            .mount(&server)
            .await;

        let url: Url = format!("{}/doc", server.uri()).parse().unwrap();
        let body = ReqwestNetwork::new().get_json(&url).await.unwrap();
        assert_eq!(body["issuer"], "x");
    }

    #[tokio::test]
    async fn test_get_json_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .mount(&server)
            .await;

        let url: Url = format!("{}/missing", server.uri()).parse().unwrap();
        let err = ReqwestNetwork::new().get_json(&url).await.unwrap_err();
        match err {
            Error::Network { status, detail, .. } => {
                assert_eq!(status, Some(404));
                assert_eq!(detail, "not here");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
