//! Application settings
//!
//! Proxy transports read the settings on every call, so an update applies to
//! the next engine request without rebuilding anything.

use crate::error::ApiResult;
use crate::server::handlers::JsonBody;
use crate::server::state::AppState;
use crate::store::{PublicSettings, Settings};
use axum::Json;
use axum::extract::State;
use tracing::info;

/// `GET /api/settings/public`
pub async fn get_public_settings(State(state): State<AppState>) -> ApiResult<Json<PublicSettings>> {
    let settings = state.settings.settings()?;
    Ok(Json(PublicSettings::from(&settings)))
}

/// `GET /api/settings`
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.settings.settings()?))
}

/// `PUT /api/settings`
pub async fn update_settings(
    State(state): State<AppState>,
    JsonBody(settings): JsonBody<Settings>,
) -> ApiResult<Json<Settings>> {
    state.settings.store_settings(&settings)?;
    info!(
        black_listed_labels = settings.black_listed_labels.len(),
        allow_bind_mounts = settings.allow_bind_mounts_for_regular_users,
        allow_privileged = settings.allow_privileged_mode_for_regular_users,
        "Settings updated"
    );
    Ok(Json(settings))
}
