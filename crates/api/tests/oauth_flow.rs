//! Integration tests for the marketplace connect flow

mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use support::{cookie_pair, json_body, location, query_value, set_cookie, spawn_app, FRONTEND};

/// Validates the redirect issued by `/oauth/start`.
///
/// Assertions:
/// - Redirects to the configured authorization URL with an S256 challenge.
/// - Sets an HTTP-only state cookie that lives five minutes.
/// - The cookie carries the same state token as the URL.
#[tokio::test]
async fn test_start_redirects_with_state_cookie() {
    let app = spawn_app().await;

    let response = app.get("/oauth/start").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let url = location(&response);
    assert!(url.starts_with(&format!("{}/authorization?", app.marketplace.uri())));
    assert!(url.contains("code_challenge_method=S256"));
    assert!(url.contains("client_id=app-123"));

    let cookie = set_cookie(&response);
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=300"));
    let state = query_value(url, "state").unwrap();
    assert!(cookie_pair(&response).starts_with(&format!("sellersync_oauth_state={state}.")));
}

/// Validates a successful callback.
///
/// Assertions:
/// - Redirects to the dashboard with the new account id.
/// - Clears the state cookie.
/// - The account is listed with the seller id from the token response.
#[tokio::test]
async fn test_callback_connects_account() {
    let app = spawn_app().await;

    let response = app.connect(1001).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response).to_string();
    assert!(target.starts_with(&format!("{FRONTEND}/connect/success?account_id=")), "{target}");
    assert!(set_cookie(&response).contains("Max-Age=0"));

    let accounts = json_body(app.get("/accounts").await).await;
    let accounts = accounts.as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["seller_id"], "1001");
    assert_eq!(Some(accounts[0]["id"].as_str().unwrap().to_string()), query_value(&target, "account_id"));

    app.ctx.shutdown().await;
}

/// Validates that a state can be redeemed once.
#[tokio::test]
async fn test_replayed_callback_is_rejected() {
    let app = spawn_app().await;
    app.mount_token_endpoint(1001).await;

    let start = app.get("/oauth/start").await;
    let state = query_value(location(&start), "state").unwrap();
    let callback = format!("/oauth/callback?code=TG-code&state={state}");

    let first = app.get(&callback).await;
    assert!(location(&first).contains("/connect/success"));

    let replay = app.get(&callback).await;
    assert_eq!(
        location(&replay),
        format!("{FRONTEND}/connect/error?reason=invalid_callback")
    );

    app.ctx.shutdown().await;
}

/// Validates the error redirects.
///
/// Assertions:
/// - A callback without a code fails with `invalid_callback`.
/// - A provider-side denial fails with `invalid_callback`.
/// - Nothing is exchanged with the token endpoint.
#[tokio::test]
async fn test_callback_errors_redirect_to_dashboard() {
    let app = spawn_app().await;

    let missing_code = app.get("/oauth/callback?state=abc").await;
    assert_eq!(missing_code.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&missing_code), format!("{FRONTEND}/connect/error?reason=invalid_callback"));

    let denied = app.get("/oauth/callback?error=access_denied&state=abc").await;
    assert_eq!(location(&denied), format!("{FRONTEND}/connect/error?reason=invalid_callback"));

    assert!(app.marketplace.received_requests().await.unwrap_or_default().is_empty());
}

/// Validates the cookie fallback when the pending state is gone.
///
/// A correctly signed cookie for a state the server no longer holds cannot
/// supply a PKCE verifier, so the callback asks the user to restart.
#[tokio::test]
async fn test_cookie_fallback_requires_verifier() {
    let app = spawn_app().await;
    let cookie = app.ctx.cookie_signer.sign("ghost-state", Utc::now() + Duration::minutes(5));

    let response = app
        .send(
            Request::get("/oauth/callback?code=TG-code&state=ghost-state")
                .header("cookie", format!("sellersync_oauth_state={cookie}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(
        location(&response),
        format!("{FRONTEND}/connect/error?reason=pkce_verifier_missing")
    );
}

/// Validates that a rejected exchange surfaces as a terminal failure.
#[tokio::test]
async fn test_rejected_exchange_redirects_with_reason() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .mount(&app.marketplace)
        .await;

    let start = app.get("/oauth/start").await;
    let state = query_value(location(&start), "state").unwrap();
    let response = app.get(&format!("/oauth/callback?code=bad&state={state}")).await;

    assert_eq!(
        location(&response),
        format!("{FRONTEND}/connect/error?reason=token_exchange_failed")
    );
    let accounts = json_body(app.get("/accounts").await).await;
    assert!(accounts.as_array().unwrap().is_empty());
}
