//! Marketer application endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use referral_core::{MarketerProfile, MarketerRequest, RequestStatus, ReviewDecision};

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub user_id: String,
    pub profile: MarketerProfile,
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub admin_notes: Option<String>,
    pub reviewed_by: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueueFilter {
    #[serde(default)]
    pub status: Option<RequestStatus>,
}

pub async fn submit_request(
    State(state): State<AppState>,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MarketerRequest>)> {
    let Json(body) = body?;
    let request = state
        .engine
        .submit_marketer_request(&body.user_id, body.profile)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_requests(
    State(state): State<AppState>,
    filter: Result<Query<QueueFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<MarketerRequest>>> {
    let Query(filter) = filter?;
    Ok(Json(state.engine.list_requests(filter.status).await?))
}

pub async fn get_request(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MarketerRequest>> {
    Ok(Json(state.engine.get_request(&id).await?))
}

/// Latest request of a user; `null` when they never applied.
pub async fn latest_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Option<MarketerRequest>>> {
    Ok(Json(state.engine.latest_request_for_user(&user_id).await?))
}

pub async fn review_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ReviewBody>, JsonRejection>,
) -> ApiResult<Json<MarketerRequest>> {
    let Json(body) = body?;
    let request = state
        .engine
        .review_marketer_request(&id, body.decision, body.admin_notes.as_deref(), &body.reviewed_by)
        .await?;
    Ok(Json(request))
}

pub async fn resync_role(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MarketerRequest>> {
    Ok(Json(state.engine.resync_marketer_role(&id).await?))
}
