//! Commission ledger endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use referral_core::{Commission, CommissionListing, CommissionStatus, MarketerSummary, Money};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    #[serde(default)]
    pub status: Option<CommissionStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PendingTotal {
    pub pending_total: Money,
}

/// Marketer dashboard: rows narrowed by `?status=`, totals over everything.
pub async fn list_for_marketer(
    State(state): State<AppState>,
    Path(marketer_id): Path<String>,
    filter: Result<Query<StatusFilter>, QueryRejection>,
) -> ApiResult<Json<CommissionListing>> {
    let Query(filter) = filter?;
    Ok(Json(state.engine.list_commissions(&marketer_id, filter.status).await?))
}

pub async fn marketer_summary(
    State(state): State<AppState>,
    Path(marketer_id): Path<String>,
) -> ApiResult<Json<MarketerSummary>> {
    Ok(Json(state.engine.marketer_summary(&marketer_id).await?))
}

pub async fn list_all(
    State(state): State<AppState>,
    filter: Result<Query<StatusFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<Commission>>> {
    let Query(filter) = filter?;
    Ok(Json(state.engine.list_all_commissions(filter.status).await?))
}

pub async fn pending_total(State(state): State<AppState>) -> ApiResult<Json<PendingTotal>> {
    let pending_total = state.engine.pending_commission_total().await?;
    Ok(Json(PendingTotal { pending_total }))
}

pub async fn mark_paid(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Commission>> {
    Ok(Json(state.engine.mark_commission_paid(&id).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<CancelBody>, JsonRejection>,
) -> ApiResult<Json<Commission>> {
    let Json(body) = body?;
    Ok(Json(state.engine.cancel_commission(&id, body.reason.as_deref()).await?))
}
