//! Account listing and on-demand sync

use std::collections::BTreeMap;
use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sellersync_domain::{Account, ResourceKind, SellerSyncError, StartOutcome, SyncRun, SyncScope};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SharedContext;
use crate::error::ApiResult;

#[derive(Debug, Serialize)]
pub struct AccountSummary {
    #[serde(flatten)]
    pub account: Account,
    pub syncing: bool,
    pub mirrored: BTreeMap<ResourceKind, u64>,
}

pub async fn list(State(ctx): State<SharedContext>) -> ApiResult<Json<Vec<AccountSummary>>> {
    let accounts = ctx.accounts.list().await?;
    let mut summaries = Vec::with_capacity(accounts.len());
    for account in accounts {
        let mirrored = ctx.mirror.counts(account.id).await?;
        let syncing = ctx.orchestrator.is_running(account.id);
        summaries.push(AccountSummary { account, syncing, mirrored });
    }
    Ok(Json(summaries))
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncParams {
    pub scope: Option<String>,
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SyncAccepted {
    pub status: StartOutcome,
}

/// Responds `202` whether a run started or one was already active.
pub async fn start_sync(
    State(ctx): State<SharedContext>,
    Path(account_id): Path<Uuid>,
    Query(params): Query<SyncParams>,
) -> ApiResult<(StatusCode, Json<SyncAccepted>)> {
    let scope = match params.scope.as_deref() {
        Some(raw) => SyncScope::from_str(raw).map_err(SellerSyncError::InvalidInput)?,
        None => SyncScope::All,
    };

    let status = ctx.orchestrator.start(account_id, scope, params.days).await?;
    Ok((StatusCode::ACCEPTED, Json(SyncAccepted { status })))
}

pub async fn sync_status(
    State(ctx): State<SharedContext>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<SyncRun>> {
    Ok(Json(ctx.orchestrator.status(account_id)?))
}
