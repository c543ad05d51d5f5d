//! Compose stacks of an endpoint
//!
//! Stacks are guarded by the resource control whose resource id is the
//! stack name. Non-administrators must also be authorized on the endpoint.

use crate::access_control::{
    ExtendedStack, ResourceControl, ResourceControlIndex, can_access_stack, filter_stacks,
};
use crate::error::{ApiError, ApiResult};
use crate::file::COMPOSE_FILE_NAME;
use crate::security::{RestrictedContext, filter_registries, is_endpoint_access_authorized};
use crate::server::handlers::{JsonBody, parse_id};
use crate::server::state::AppState;
use crate::store::{Endpoint, EndpointId, EnvPair, Stack};
use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateStackRequest {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "SwarmID", default)]
    pub swarm_id: String,
    #[serde(default)]
    pub stack_file_content: String,
    #[serde(default)]
    pub env: Vec<EnvPair>,
}

#[derive(Debug, Serialize)]
pub struct CreateStackResponse {
    #[serde(rename = "Id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateStackRequest {
    #[serde(default)]
    pub stack_file_content: String,
    #[serde(default)]
    pub env: Vec<EnvPair>,
}

#[derive(Debug, Deserialize)]
pub struct StackListQuery {
    #[serde(rename = "swarmId", default)]
    pub swarm_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StackFileResponse {
    #[serde(rename = "StackFileContent")]
    pub stack_file_content: String,
}

/// Endpoint named in the path, if the caller may use it
fn authorized_endpoint(
    state: &AppState,
    raw_id: &str,
    context: &RestrictedContext,
) -> ApiResult<Endpoint> {
    let id: EndpointId = parse_id(raw_id)?;
    let endpoint = state.endpoints.endpoint(id)?;

    if !context.is_admin
        && !is_endpoint_access_authorized(&endpoint, context.user_id, &context.user_memberships)
    {
        return Err(ApiError::AccessDenied("Access denied to endpoint".into()));
    }
    Ok(endpoint)
}

/// Stack of `endpoint` with its control, 403 when the caller may not access it
fn accessible_stack(
    state: &AppState,
    endpoint: &Endpoint,
    stack_id: &str,
    context: &RestrictedContext,
) -> ApiResult<(Stack, Option<ResourceControl>)> {
    let stack = state.stacks.stack(stack_id)?;
    if stack.endpoint_id != endpoint.id {
        return Err(ApiError::NotFound("Stack not found".into()));
    }

    let control = match state.resource_controls.resource_control_by_resource_id(&stack.name) {
        Ok(control) => Some(control),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    if !can_access_stack(control.as_ref(), context) {
        return Err(ApiError::access_denied());
    }
    Ok((stack, control))
}

async fn deploy(
    state: &AppState,
    stack: &Stack,
    endpoint: &Endpoint,
    context: &RestrictedContext,
) -> ApiResult<()> {
    let dockerhub = state.dockerhub.dockerhub()?;
    let registries = filter_registries(state.registries.registries()?, context);
    state
        .deployer
        .deploy(stack, endpoint, &dockerhub, &registries)
        .await?;
    Ok(())
}

/// `POST /api/{endpointId}/stacks`
pub async fn create_stack(
    State(state): State<AppState>,
    context: RestrictedContext,
    Path(endpoint_id): Path<String>,
    JsonBody(request): JsonBody<CreateStackRequest>,
) -> ApiResult<Json<CreateStackResponse>> {
    let endpoint = authorized_endpoint(&state, &endpoint_id, &context)?;

    if request.name.is_empty() || request.swarm_id.is_empty() || request.stack_file_content.is_empty()
    {
        return Err(ApiError::invalid_request());
    }

    if state
        .stacks
        .stacks()?
        .iter()
        .any(|s| s.name.eq_ignore_ascii_case(&request.name))
    {
        return Err(ApiError::Conflict("A stack with this name already exists".into()));
    }

    let id = Stack::make_id(&request.name, &request.swarm_id);
    let project_path = state
        .files
        .store_stack_file(&id, COMPOSE_FILE_NAME, &request.stack_file_content)
        .await?;

    let stack = Stack {
        id,
        name: request.name,
        endpoint_id: endpoint.id,
        swarm_id: request.swarm_id,
        entry_point: COMPOSE_FILE_NAME.to_string(),
        env: request.env,
        project_path,
    };
    state.stacks.create_stack(&stack)?;

    deploy(&state, &stack, &endpoint, &context).await?;

    info!(endpoint_id = %endpoint.id, stack = %stack.name, user_id = %context.user_id, "Stack created");
    Ok(Json(CreateStackResponse { id: stack.id }))
}

/// `GET /api/{endpointId}/stacks[?swarmId=]`
pub async fn list_stacks(
    State(state): State<AppState>,
    context: RestrictedContext,
    Path(endpoint_id): Path<String>,
    Query(query): Query<StackListQuery>,
) -> ApiResult<Json<Vec<ExtendedStack>>> {
    let endpoint = authorized_endpoint(&state, &endpoint_id, &context)?;

    let stacks = match query.swarm_id.as_deref().filter(|s| !s.is_empty()) {
        Some(swarm_id) => state.stacks.stacks_by_swarm_id(swarm_id)?,
        None => state.stacks.stacks()?,
    };
    let stacks: Vec<Stack> = stacks
        .into_iter()
        .filter(|s| s.endpoint_id == endpoint.id)
        .collect();

    let controls = state.resource_controls.resource_controls()?;
    let index = ResourceControlIndex::new(&controls);
    Ok(Json(filter_stacks(stacks, &index, &context)))
}

/// `GET /api/{endpointId}/stacks/{id}`
pub async fn get_stack(
    State(state): State<AppState>,
    context: RestrictedContext,
    Path((endpoint_id, stack_id)): Path<(String, String)>,
) -> ApiResult<Json<ExtendedStack>> {
    let endpoint = authorized_endpoint(&state, &endpoint_id, &context)?;
    let (stack, resource_control) = accessible_stack(&state, &endpoint, &stack_id, &context)?;
    Ok(Json(ExtendedStack {
        stack,
        resource_control,
    }))
}

/// `PUT /api/{endpointId}/stacks/{id}`
pub async fn update_stack(
    State(state): State<AppState>,
    context: RestrictedContext,
    Path((endpoint_id, stack_id)): Path<(String, String)>,
    JsonBody(request): JsonBody<UpdateStackRequest>,
) -> ApiResult<()> {
    let endpoint = authorized_endpoint(&state, &endpoint_id, &context)?;
    let (mut stack, _) = accessible_stack(&state, &endpoint, &stack_id, &context)?;

    if request.stack_file_content.is_empty() {
        return Err(ApiError::invalid_request());
    }

    state
        .files
        .store_stack_file(&stack.id, &stack.entry_point, &request.stack_file_content)
        .await?;
    stack.env = request.env;
    state.stacks.update_stack(&stack.id, &stack)?;

    deploy(&state, &stack, &endpoint, &context).await?;

    info!(endpoint_id = %endpoint.id, stack = %stack.name, user_id = %context.user_id, "Stack updated");
    Ok(())
}

/// `DELETE /api/{endpointId}/stacks/{id}`
pub async fn delete_stack(
    State(state): State<AppState>,
    context: RestrictedContext,
    Path((endpoint_id, stack_id)): Path<(String, String)>,
) -> ApiResult<()> {
    let endpoint = authorized_endpoint(&state, &endpoint_id, &context)?;
    let (stack, control) = accessible_stack(&state, &endpoint, &stack_id, &context)?;

    state.deployer.remove(&stack, &endpoint).await?;
    state.stacks.delete_stack(&stack.id)?;

    if let Some(control) = control {
        if let Err(e) = state.resource_controls.delete_resource_control(control.id) {
            warn!(stack = %stack.name, error = %e, "Failed to remove resource control of deleted stack");
        }
    }

    state.files.remove_stack_project(&stack.id).await?;

    info!(endpoint_id = %endpoint.id, stack = %stack.name, user_id = %context.user_id, "Stack deleted");
    Ok(())
}

/// `GET /api/{endpointId}/stacks/{id}/stackfile`
pub async fn get_stack_file(
    State(state): State<AppState>,
    context: RestrictedContext,
    Path((endpoint_id, stack_id)): Path<(String, String)>,
) -> ApiResult<Json<StackFileResponse>> {
    let endpoint = authorized_endpoint(&state, &endpoint_id, &context)?;
    let (stack, _) = accessible_stack(&state, &endpoint, &stack_id, &context)?;

    let stack_file_content = state
        .files
        .read_stack_file(&stack.compose_file_path())
        .await?;
    Ok(Json(StackFileResponse { stack_file_content }))
}
