//! Default-rate administration.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use referral_core::{ReferralCodeSettings, SettingsPatch};

use crate::error::ApiResult;
use crate::AppState;

pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<ReferralCodeSettings>> {
    Ok(Json(state.engine.get_settings().await?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    body: Result<Json<SettingsPatch>, JsonRejection>,
) -> ApiResult<Json<ReferralCodeSettings>> {
    let Json(patch) = body?;
    Ok(Json(state.engine.update_settings(patch).await?))
}
