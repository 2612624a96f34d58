//! HTTP routes

pub mod accounts;
pub mod health;
pub mod oauth;
pub mod webhooks;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

pub type SharedContext = Arc<AppContext>;

/// Build the application router.
pub fn router(ctx: SharedContext) -> Router {
    let oauth = Router::new()
        .route("/oauth/start", get(oauth::start))
        .route("/oauth/callback", get(oauth::callback));

    let accounts = Router::new()
        .route("/accounts", get(accounts::list))
        .route("/accounts/{id}/sync", post(accounts::start_sync).get(accounts::sync_status));

    Router::new()
        .route("/health", get(health::health))
        .route("/webhooks", post(webhooks::receive))
        .merge(oauth)
        .merge(accounts)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
