//! Marketplace connect flow
//!
//! GET /oauth/start    - redirect to the provider with a signed state cookie
//! GET /oauth/callback - exchange the code, clear the cookie, redirect to the dashboard

use axum::extract::{Query, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use sellersync_domain::constants::STATE_COOKIE_NAME;
use sellersync_domain::{SellerSyncError, SyncScope};
use serde::Deserialize;
use tracing::{info, warn};

use super::SharedContext;
use crate::error::ApiResult;

const COOKIE_PATH: &str = "/oauth";

pub async fn start(State(ctx): State<SharedContext>) -> ApiResult<Response> {
    let start = ctx.handshake.start_authorization().await?;

    let ttl = ctx.handshake.settings().state_ttl;
    let expires_at = Utc::now()
        + chrono::Duration::from_std(ttl)
            .map_err(|e| SellerSyncError::Config(format!("state ttl out of range: {e}")))?;
    let cookie = state_cookie(
        &ctx.cookie_signer.sign(&start.state, expires_at),
        ttl.as_secs(),
        ctx.config.server.cookie_secure,
    );

    Ok(([(SET_COOKIE, cookie)], Redirect::to(&start.authorization_url)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the seller denies access.
    pub error: Option<String>,
}

/// Always redirects to the dashboard; failures land on `/connect/error`.
pub async fn callback(
    State(ctx): State<SharedContext>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    let frontend = ctx.config.server.frontend_url.trim_end_matches('/');
    let clear = state_cookie("", 0, ctx.config.server.cookie_secure);

    if let Some(error) = params.error.as_deref() {
        warn!(provider_error = error, "Provider returned an authorization error");
        return failure_redirect(frontend, &SellerSyncError::InvalidCallback, clear);
    }

    let cookie_state = read_cookie(&headers, STATE_COOKIE_NAME)
        .and_then(|value| ctx.cookie_signer.verify(&value, Utc::now()));

    let connected = match ctx
        .handshake
        .complete_authorization(
            params.code.as_deref(),
            params.state.as_deref(),
            cookie_state.as_deref(),
        )
        .await
    {
        Ok(connected) => connected,
        Err(err) => return failure_redirect(frontend, &err, clear),
    };

    // The connect redirect does not wait for the initial sync.
    match ctx.orchestrator.start(connected.account_id, SyncScope::All, None).await {
        Ok(outcome) => info!(account_id = %connected.account_id, ?outcome, "Initial sync requested"),
        Err(err) => warn!(account_id = %connected.account_id, error = %err, "Initial sync not started"),
    }

    let target = format!("{frontend}/connect/success?account_id={}", connected.account_id);
    ([(SET_COOKIE, clear)], Redirect::to(&target)).into_response()
}

fn failure_redirect(frontend: &str, err: &SellerSyncError, clear: String) -> Response {
    warn!(code = err.code(), error = %err, "Connect flow failed");
    let target = format!("{frontend}/connect/error?reason={}", err.code());
    ([(SET_COOKIE, clear)], Redirect::to(&target)).into_response()
}

fn state_cookie(value: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{STATE_COOKIE_NAME}={value}; Path={COOKIE_PATH}; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
