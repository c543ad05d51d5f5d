//! Resource control management
//!
//! Non-administrators may only create, change or delete controls according
//! to the ownership rules in [`crate::security`].

use crate::access_control::{ResourceControl, ResourceControlId, ResourceControlType};
use crate::error::{ApiError, ApiResult, StoreError};
use crate::security::{
    RestrictedContext, TeamId, UserId, authorized_resource_control_creation,
    authorized_resource_control_deletion, authorized_resource_control_update,
};
use crate::server::handlers::{JsonBody, parse_id};
use crate::server::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateResourceControlRequest {
    #[serde(rename = "ResourceID", default)]
    pub resource_id: String,
    #[serde(rename = "Type", default)]
    pub control_type: String,
    #[serde(default)]
    pub administrators_only: bool,
    #[serde(default)]
    pub users: Vec<UserId>,
    #[serde(default)]
    pub teams: Vec<TeamId>,
    #[serde(rename = "SubResourceIDs", default)]
    pub sub_resource_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateResourceControlRequest {
    #[serde(default)]
    pub administrators_only: bool,
    #[serde(default)]
    pub users: Vec<UserId>,
    #[serde(default)]
    pub teams: Vec<TeamId>,
}

/// `POST /api/resource_controls`
pub async fn create_resource_control(
    State(state): State<AppState>,
    context: RestrictedContext,
    JsonBody(request): JsonBody<CreateResourceControlRequest>,
) -> ApiResult<Json<ResourceControl>> {
    if request.resource_id.is_empty() {
        return Err(ApiError::invalid_request());
    }

    let control_type = ResourceControlType::try_parse(&request.control_type)
        .ok_or_else(|| ApiError::BadRequest("Unsupported resource control type".into()))?;

    if request.users.is_empty() && request.teams.is_empty() && !request.administrators_only {
        return Err(ApiError::invalid_request());
    }

    let mut control = ResourceControl::new(
        request.resource_id,
        control_type,
        &request.users,
        &request.teams,
    );
    control.sub_resource_ids = request.sub_resource_ids;
    control.administrators_only = request.administrators_only;

    if !authorized_resource_control_creation(&control, &context) {
        return Err(ApiError::access_denied());
    }

    match state.resource_controls.create_resource_control(&mut control) {
        Ok(()) => {}
        Err(StoreError::AlreadyExists { .. }) => {
            return Err(ApiError::Conflict(
                "A resource control is already applied on this resource".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    }
    info!(
        id = %control.id,
        resource_id = %control.resource_id,
        control_type = %control.control_type,
        user_id = %context.user_id,
        "Resource control created"
    );
    Ok(Json(control))
}

/// `PUT /api/resource_controls/{id}`
pub async fn update_resource_control(
    State(state): State<AppState>,
    context: RestrictedContext,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateResourceControlRequest>,
) -> ApiResult<Json<ResourceControl>> {
    let id = ResourceControlId(parse_id(&id)?);
    let current = state.resource_controls.resource_control(id)?;

    let mut updated = current.clone();
    updated.administrators_only = request.administrators_only;
    updated.set_grants(&request.users, &request.teams);

    if !authorized_resource_control_update(&current, &updated, &context) {
        return Err(ApiError::access_denied());
    }

    state.resource_controls.update_resource_control(id, &updated)?;
    info!(id = %id, user_id = %context.user_id, "Resource control updated");
    Ok(Json(updated))
}

/// `DELETE /api/resource_controls/{id}`
pub async fn delete_resource_control(
    State(state): State<AppState>,
    context: RestrictedContext,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = ResourceControlId(parse_id(&id)?);
    let control = state.resource_controls.resource_control(id)?;

    if !authorized_resource_control_deletion(&control, &context) {
        return Err(ApiError::access_denied());
    }

    state.resource_controls.delete_resource_control(id)?;
    info!(id = %id, user_id = %context.user_id, "Resource control deleted");
    Ok(())
}
