//! Referral code endpoints: checkout preview, marketer codes, admin edits.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use referral_core::{CodeFilter, DiscountPreview, Money, NewReferralCode, ReferralCode, ReferralCodePatch};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    pub code: String,
    /// Base price in Toman.
    pub amount: i64,
}

/// Prices a code for checkout without consuming a use.
///
/// Unknown, inactive and used-up codes come back as `CODE_NOT_FOUND`,
/// `CODE_INACTIVE` and `USAGE_LIMIT_REACHED`.
pub async fn preview_discount(
    State(state): State<AppState>,
    params: Result<Query<PreviewParams>, QueryRejection>,
) -> ApiResult<Json<DiscountPreview>> {
    let Query(params) = params?;
    let preview = state
        .engine
        .preview_discount(&params.code, Money::from_toman(params.amount))
        .await?;
    Ok(Json(preview))
}

pub async fn list_codes(
    State(state): State<AppState>,
    filter: Result<Query<CodeFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<ReferralCode>>> {
    let Query(filter) = filter?;
    Ok(Json(state.engine.list_codes(&filter).await?))
}

pub async fn get_code(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ReferralCode>> {
    Ok(Json(state.engine.get_code(&id).await?))
}

pub async fn list_marketer_codes(
    State(state): State<AppState>,
    Path(marketer_id): Path<String>,
) -> ApiResult<Json<Vec<ReferralCode>>> {
    Ok(Json(state.engine.list_marketer_codes(&marketer_id).await?))
}

pub async fn create_code(
    State(state): State<AppState>,
    Path(marketer_id): Path<String>,
    body: Result<Json<NewReferralCode>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ReferralCode>)> {
    let Json(input) = body?;
    let code = state.engine.create_referral_code(&marketer_id, input).await?;
    Ok((StatusCode::CREATED, Json(code)))
}

pub async fn update_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ReferralCodePatch>, JsonRejection>,
) -> ApiResult<Json<ReferralCode>> {
    let Json(patch) = body?;
    Ok(Json(state.engine.update_referral_code(&id, patch).await?))
}

pub async fn delete_code(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.engine.delete_referral_code(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A marketer editing one of their own codes. Other marketers' codes are 404.
pub async fn update_own_code(
    State(state): State<AppState>,
    Path((marketer_id, code_id)): Path<(String, String)>,
    body: Result<Json<ReferralCodePatch>, JsonRejection>,
) -> ApiResult<Json<ReferralCode>> {
    let Json(patch) = body?;
    let code = state
        .engine
        .update_marketer_code(&marketer_id, &code_id, patch)
        .await?;
    Ok(Json(code))
}

pub async fn delete_own_code(
    State(state): State<AppState>,
    Path((marketer_id, code_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.engine.delete_marketer_code(&marketer_id, &code_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
