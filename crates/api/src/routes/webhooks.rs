//! Marketplace push notifications
//!
//! POST /webhooks acknowledges quickly; the worker does the fetching.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use sellersync_domain::{SellerSyncError, WebhookNotification};
use serde::Serialize;
use tracing::{info, warn};

use super::SharedContext;
use crate::error::ApiResult;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub topic: String,
    pub resource: String,
}

/// Duplicates are acknowledged with `200` like fresh events; only a failure
/// to record the event is an error.
pub async fn receive(State(ctx): State<SharedContext>, body: Bytes) -> ApiResult<Json<WebhookAck>> {
    let notification: WebhookNotification = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Rejecting malformed notification");
        SellerSyncError::InvalidInput(format!("malformed notification: {e}"))
    })?;

    let raw = String::from_utf8_lossy(&body);
    let outcome = ctx.ingester.accept(&notification, &raw).await?;
    info!(
        topic = %notification.topic,
        resource = %notification.resource,
        status = outcome.as_status(),
        "Notification received"
    );

    Ok(Json(WebhookAck {
        status: outcome.as_status(),
        topic: notification.topic,
        resource: notification.resource,
    }))
}
