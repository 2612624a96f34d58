//! Shared setup for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use sellersync_api::{router, AppContext};
use sellersync_domain::{Config, Secret};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const FRONTEND: &str = "http://dashboard.test";

/// A wired application over a temp database and a mock marketplace.
pub struct TestApp {
    pub ctx: Arc<AppContext>,
    pub marketplace: MockServer,
    /// Keep temporary directory alive for the lifetime of the app.
    _temp_dir: TempDir,
}

pub fn test_config(temp_dir: &TempDir, marketplace: &MockServer) -> Config {
    let mut config = Config::default();
    config.database.path = temp_dir.path().join("sellersync.db");
    config.database.pool_size = 4;
    config.database.encryption_key = Some(Secret::new(TEST_KEY));

    config.server.frontend_url = FRONTEND.to_string();
    config.server.cookie_secret = Some(Secret::new("0123456789abcdef0123456789abcdef"));

    config.marketplace.api_base_url = marketplace.uri();
    config.marketplace.authorization_url = format!("{}/authorization", marketplace.uri());
    config.marketplace.token_url = format!("{}/oauth/token", marketplace.uri());
    config.marketplace.client_id = "app-123".to_string();
    config.marketplace.request_timeout_secs = 5;

    config.vault.passphrase = Some(Secret::new("test-passphrase"));
    config.vault.memory_kib = 64;
    config.vault.iterations = 1;
    config.vault.parallelism = 1;

    config.sync.page_delay_ms = 0;
    config.sync.failure_backoff_ms = 0;
    config.sync.schedule_enabled = false;
    config.worker.poll_interval_ms = 20;
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = TempDir::new().expect("failed to create temporary directory");
    let marketplace = MockServer::start().await;
    let mut config = test_config(&temp_dir, &marketplace);
    customize(&mut config);

    let ctx = Arc::new(AppContext::new(config).await.expect("failed to build application context"));
    TestApp { ctx, marketplace, _temp_dir: temp_dir }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        router(Arc::clone(&self.ctx)).oneshot(request).await.expect("router is infallible")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str, body: &str) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Token endpoint answers with a token pair for `seller_id`.
    pub async fn mount_token_endpoint(&self, seller_id: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "APP_USR-access",
                "refresh_token": "TG-refresh",
                "token_type": "Bearer",
                "expires_in": 21600,
                "user_id": seller_id,
            })))
            .mount(&self.marketplace)
            .await;
    }

    /// Run the connect flow end to end; returns the callback response.
    pub async fn connect(&self, seller_id: u64) -> Response<Body> {
        self.mount_token_endpoint(seller_id).await;

        let start = self.get("/oauth/start").await;
        let state = query_value(location(&start), "state").expect("state in authorization url");
        let cookie = cookie_pair(&start);

        self.send(
            Request::get(format!("/oauth/callback?code=TG-code&state={state}"))
                .header("cookie", cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("redirect has a location")
}

pub fn set_cookie(response: &Response<Body>) -> &str {
    response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .expect("response sets a cookie")
}

/// `name=value` part of the Set-Cookie header, ready for a Cookie header.
pub fn cookie_pair(response: &Response<Body>) -> String {
    set_cookie(response).split(';').next().unwrap_or_default().to_string()
}

pub fn query_value(url: &str, key: &str) -> Option<String> {
    url.split(['?', '&'])
        .find_map(|pair| pair.strip_prefix(&format!("{key}=")))
        .map(ToString::to_string)
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), 1 << 20).await.expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
