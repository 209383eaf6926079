use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::user::{Caller, UserProfile};
use crate::profile::TargetingPatch;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub ok: bool,
    pub profile: UserProfile,
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state
        .pipeline
        .profiles
        .ensure_profile(&caller.uid, caller.role, state.config.default_parse_tokens)
        .await?;
    Ok(Json(ProfileResponse { ok: true, profile }))
}

/// PUT /api/v1/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    caller: Caller,
    Json(patch): Json<TargetingPatch>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profiles = &state.pipeline.profiles;
    let current = profiles
        .ensure_profile(&caller.uid, caller.role, state.config.default_parse_tokens)
        .await?;
    let targeting = patch.apply(&current.targeting);
    let profile = profiles.update_targeting(&caller.uid, &targeting).await?;
    info!("Updated targeting for {}", caller.uid);
    Ok(Json(ProfileResponse { ok: true, profile }))
}
