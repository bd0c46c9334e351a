//! Shared fixtures: a router wired to an in-memory user store and a mock
//! provider JWKS endpoint.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use tokengate_api::{AppState, config::ApiConfig};
use tokengate_core::auth::{
    AuthService, Claims, ClaimsReconciler, ExternalClaims, FederationValidator, JwksKeySource,
    ProviderKeyCache, TokenIssuer,
};
use tokengate_core::config::AuthConfig;
use tokengate_core::users::MemoryUserRepository;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LOCAL_PRIVATE_PEM: &str =
    include_str!("../../../tokengate_core/testdata/local_private.pem");
pub const LOCAL_PUBLIC_PEM: &str =
    include_str!("../../../tokengate_core/testdata/local_public.pem");
pub const PROVIDER_PRIVATE_PEM: &str =
    include_str!("../../../tokengate_core/testdata/provider_private.pem");
pub const UNTRUSTED_PRIVATE_PEM: &str =
    include_str!("../../../tokengate_core/testdata/untrusted_private.pem");
pub const PROVIDER_JWKS: &str =
    include_str!("../../../tokengate_core/testdata/provider_jwks.json");

pub const PROVIDER_KID: &str = "provider-key-1";
pub const AUDIENCE: &str = "client-id.apps.example.com";
pub const GOOGLE: &str = "https://accounts.google.com";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub users: Arc<MemoryUserRepository>,
    /// Kept alive for the duration of the test.
    pub provider: MockServer,
}

pub async fn spawn_app() -> TestApp {
    let provider = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oauth2/v3/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PROVIDER_JWKS, "application/json"))
        .mount(&provider)
        .await;

    let config = AuthConfig {
        private_key_pem: LOCAL_PRIVATE_PEM.into(),
        public_key_pem: LOCAL_PUBLIC_PEM.into(),
        provider_audience: AUDIENCE.into(),
        provider_issuers: vec!["accounts.google.com".into(), GOOGLE.into()],
        provider_jwks_url: format!("{}/oauth2/v3/certs", provider.uri()),
        access_ttl: Duration::from_secs(300),
        refresh_ttl: Duration::from_secs(600),
        grace: Duration::from_secs(5),
    };

    let users = Arc::new(MemoryUserRepository::new());
    let source = JwksKeySource::new(&config.provider_jwks_url).expect("http client");
    let auth = AuthService::new(
        FederationValidator::new(Arc::new(source), ProviderKeyCache::new(), &config),
        ClaimsReconciler::new(users.clone()),
        TokenIssuer::from_config(&config).expect("key material"),
    );

    let state = AppState {
        auth: Arc::new(auth),
        users: users.clone(),
        config: ApiConfig::default(),
    };

    TestApp {
        router: tokengate_api::router(state.clone()),
        state,
        users,
        provider,
    }
}

pub fn provider_claims(sub: &str) -> ExternalClaims {
    let now = Utc::now().timestamp();
    ExternalClaims {
        sub: sub.into(),
        email: "ada@example.com".into(),
        email_verified: true,
        given_name: "Ada".into(),
        family_name: "Lovelace".into(),
        name: "Ada Lovelace".into(),
        picture: "https://example.com/ada.png".into(),
        iss: GOOGLE.into(),
        aud: [AUDIENCE.to_string()].into(),
        iat: Some(now),
        nbf: None,
        exp: now + 3600,
    }
}

pub fn sign_provider(claims: &ExternalClaims, private_pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(PROVIDER_KID.to_string());
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

/// Sign local claims verbatim with the service's own key.
pub fn sign_local(claims: &Claims) -> String {
    let key = EncodingKey::from_rsa_pem(LOCAL_PRIVATE_PEM.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
}

pub async fn post_json(router: &Router, uri: &str, body: &str) -> Response<Body> {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    router.clone().oneshot(req).await.expect("request")
}

pub async fn get_with_bearer(router: &Router, uri: &str, token: Option<&str>) -> Response<Body> {
    let mut req = Request::builder().uri(uri);
    if let Some(token) = token {
        req = req.header("authorization", format!("Bearer {token}"));
    }
    router
        .clone()
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .expect("request")
}

pub async fn json_body(resp: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("parse JSON")
}

/// Log in as a provider identity and return the token pair as JSON.
pub async fn login(app: &TestApp, sub: &str) -> serde_json::Value {
    let token = sign_provider(&provider_claims(sub), PROVIDER_PRIVATE_PEM);
    let resp = post_json(
        &app.router,
        "/v1/login",
        &serde_json::json!({ "token": token }).to_string(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    json_body(resp).await
}
