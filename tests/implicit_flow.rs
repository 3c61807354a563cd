#![cfg(feature = "reqwest")]

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use implicit_auth::{
    AuthClient, AuthConfig, AuthenticationParameters, ClientInfo, Error, MemoryStorage,
    TemporaryCacheKey,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn unsigned_jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.")
}

async fn provider() -> MockServer {
    let server = MockServer::start().await;
    let issuer = format!("{}/tenant-1", server.uri());

    Mock::given(method("GET"))
        .and(path("/tenant-1/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/oauth2/v2.0/authorize"),
            "token_endpoint": format!("{issuer}/oauth2/v2.0/token"),
            "end_session_endpoint": format!("{issuer}/oauth2/v2.0/logout"),
        })))
        .expect(1)
        .mount(&server)
        .await;

    server
}

fn query(url: &str) -> HashMap<String, String> {
    Url::parse(url).unwrap().query_pairs().into_owned().collect()
}

#[tokio::test]
async fn login_round_trip_across_page_loads() {
    let server = provider().await;
    let authority = format!("{}/tenant-1", server.uri());
    let storage = Arc::new(MemoryStorage::new());
    let config =
        AuthConfig::new("client-a", &authority).with_redirect_uri("https://app.example.com/");

    // Page load 1: build the login URL.
    let client = AuthClient::with_reqwest(config.clone(), storage.clone()).unwrap();
    let url = client
        .create_login_url(
            AuthenticationParameters::new()
                .with_redirect_start_page("https://app.example.com/inbox"),
        )
        .await
        .unwrap();
    assert!(url.starts_with(&format!("{authority}/oauth2/v2.0/authorize?")));
    let q = query(&url);
    drop(client);

    // Page load 2: the provider redirected back with tokens in the fragment.
    let id_token = unsigned_jwt(&json!({
        "iss": format!("{authority}/v2.0"),
        "sub": "subject-1",
        "oid": "object-1",
        "tid": "tenant-1",
        "name": "Ada Lovelace",
        "preferred_username": "ada@example.com",
        "nonce": q["nonce"],
    }));
    let client_info = ClientInfo {
        uid: "user-1".into(),
        utid: "tenant-1".into(),
    }
    .encode();
    let redirect = format!(
        "https://app.example.com/#state={}&id_token={id_token}&client_info={client_info}",
        q["state"]
    );

    let client = AuthClient::with_reqwest(config.clone(), storage.clone()).unwrap();
    let response = client.handle_response(&redirect).unwrap();
    assert_eq!(
        response.redirect_start_page.as_deref(),
        Some("https://app.example.com/inbox")
    );
    assert_eq!(response.unique_id.as_deref(), Some("object-1"));

    // Page load 3: the session is restored from persistent storage.
    let client = AuthClient::with_reqwest(config, storage.clone()).unwrap();
    let account = client.get_account().unwrap().unwrap();
    assert_eq!(account.home_account_id.as_str(), "user-1.tenant-1");
    assert_eq!(account.username.as_deref(), Some("ada@example.com"));
    assert!(client.cache().get_temporary(TemporaryCacheKey::RequestState).is_none());

    // Replaying the same fragment finds no cached state.
    assert!(matches!(
        client.handle_response(&redirect),
        Err(Error::StateMismatch)
    ));
}

#[tokio::test]
async fn discovery_failure_surfaces_as_retryable_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = AuthConfig::new("client-a", format!("{}/tenant-1", server.uri()))
        .with_redirect_uri("https://app.example.com/");
    let client = AuthClient::with_reqwest(config, Arc::new(MemoryStorage::new())).unwrap();

    let err = client
        .create_login_url(AuthenticationParameters::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Network { status: Some(500), .. }));
    assert!(err.is_retryable());
    assert!(client.cache().storage().is_empty());
}
