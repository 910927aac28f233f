//! Checkout endpoints.
//!
//! The payment layer calls `finalize` once the gateway confirmed payment and
//! `fail` when it did not. `finalize` is safe to repeat.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use referral_core::{NewPurchase, Purchase, PurchaseOutcome};

use crate::error::ApiResult;
use crate::AppState;

/// Body of `finalize` and `reprice`.
#[derive(Debug, Default, Deserialize)]
pub struct CodeBody {
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundBody {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn create_purchase(
    State(state): State<AppState>,
    body: Result<Json<NewPurchase>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Purchase>)> {
    let Json(input) = body?;
    let purchase = state.engine.create_purchase(input).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

pub async fn get_purchase(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Purchase>> {
    Ok(Json(state.engine.get_purchase(&id).await?))
}

pub async fn finalize(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<CodeBody>, JsonRejection>,
) -> ApiResult<Json<PurchaseOutcome>> {
    let Json(body) = body?;
    let outcome = state
        .engine
        .finalize_purchase(&id, body.code.as_deref())
        .await?;
    Ok(Json(outcome))
}

pub async fn reprice(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<CodeBody>, JsonRejection>,
) -> ApiResult<Json<Purchase>> {
    let Json(body) = body?;
    Ok(Json(state.engine.reprice_purchase(&id, body.code.as_deref()).await?))
}

pub async fn mark_failed(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Purchase>> {
    Ok(Json(state.engine.mark_purchase_failed(&id).await?))
}

pub async fn refund(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<RefundBody>, JsonRejection>,
) -> ApiResult<Json<PurchaseOutcome>> {
    let Json(body) = body?;
    Ok(Json(state.engine.refund_purchase(&id, body.reason.as_deref()).await?))
}
