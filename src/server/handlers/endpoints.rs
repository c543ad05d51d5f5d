//! Endpoint management
//!
//! Creating, updating and deleting endpoints is refused with 503 when
//! endpoint management is disabled. Connection changes rebuild the
//! endpoint's proxy; deletion tears it down together with its TLS files.

use crate::error::{ApiError, ApiResult};
use crate::file::TlsFileKind;
use crate::security::{RestrictedContext, TeamId, UserId, filter_endpoints};
use crate::server::handlers::{JsonBody, parse_id};
use crate::server::state::AppState;
use crate::store::{Endpoint, EndpointId, TlsConfiguration};
use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Body of endpoint creation and update
///
/// On update, empty strings keep the current value.
#[derive(Debug, Deserialize)]
pub struct EndpointRequest {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "PublicURL", default)]
    pub public_url: String,
    #[serde(rename = "TLS", default)]
    pub tls: bool,
    #[serde(rename = "TLSSkipVerify", default)]
    pub tls_skip_verify: bool,
    #[serde(rename = "TLSSkipClientVerify", default)]
    pub tls_skip_client_verify: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateEndpointResponse {
    #[serde(rename = "Id")]
    pub id: EndpointId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEndpointAccessRequest {
    #[serde(rename = "AuthorizedUsers", default)]
    pub authorized_users: Option<Vec<UserId>>,
    #[serde(rename = "AuthorizedTeams", default)]
    pub authorized_teams: Option<Vec<TeamId>>,
}

fn ensure_management_enabled(state: &AppState) -> ApiResult<()> {
    if state.flags.endpoint_management {
        Ok(())
    } else {
        Err(ApiError::Unavailable(
            "Endpoint management is disabled".into(),
        ))
    }
}

/// TLS configuration pointing at the upload folder of `id`
fn tls_paths(
    state: &AppState,
    id: EndpointId,
    skip_verify: bool,
    skip_client_verify: bool,
) -> ApiResult<TlsConfiguration> {
    let folder = id.to_string();
    let mut config = TlsConfiguration {
        tls: true,
        tls_skip_verify: skip_verify,
        ..Default::default()
    };

    if !skip_verify {
        config.tls_ca_cert_path = Some(state.files.path_for_tls_file(&folder, TlsFileKind::Ca)?);
    }
    if !skip_client_verify {
        config.tls_cert_path = Some(state.files.path_for_tls_file(&folder, TlsFileKind::Cert)?);
        config.tls_key_path = Some(state.files.path_for_tls_file(&folder, TlsFileKind::Key)?);
    }
    Ok(config)
}

/// `GET /api/endpoints`
pub async fn list_endpoints(
    State(state): State<AppState>,
    context: RestrictedContext,
) -> ApiResult<Json<Vec<Endpoint>>> {
    let endpoints = state.endpoints.endpoints()?;
    Ok(Json(filter_endpoints(endpoints, &context)))
}

/// `GET /api/endpoints/{id}`
pub async fn get_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Endpoint>> {
    let id: EndpointId = parse_id(&id)?;
    Ok(Json(state.endpoints.endpoint(id)?))
}

/// `POST /api/endpoints`
pub async fn create_endpoint(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<EndpointRequest>,
) -> ApiResult<Json<CreateEndpointResponse>> {
    ensure_management_enabled(&state)?;

    if request.name.is_empty() || request.url.is_empty() {
        return Err(ApiError::invalid_request());
    }

    let mut endpoint = Endpoint {
        id: EndpointId(0),
        name: request.name,
        url: request.url,
        public_url: request.public_url,
        tls_config: TlsConfiguration::default(),
        authorized_users: Vec::new(),
        authorized_teams: Vec::new(),
    };
    state.endpoints.create_endpoint(&mut endpoint)?;

    if request.tls {
        endpoint.tls_config = tls_paths(
            &state,
            endpoint.id,
            request.tls_skip_verify,
            request.tls_skip_client_verify,
        )?;
        state.endpoints.update_endpoint(endpoint.id, &endpoint)?;
    }

    info!(endpoint_id = %endpoint.id, url = %endpoint.url, "Endpoint created");
    Ok(Json(CreateEndpointResponse { id: endpoint.id }))
}

/// `PUT /api/endpoints/{id}`
pub async fn update_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<EndpointRequest>,
) -> ApiResult<Json<Endpoint>> {
    ensure_management_enabled(&state)?;

    let id: EndpointId = parse_id(&id)?;
    let mut endpoint = state.endpoints.endpoint(id)?;

    if !request.name.is_empty() {
        endpoint.name = request.name;
    }
    if !request.url.is_empty() {
        endpoint.url = request.url;
    }
    if !request.public_url.is_empty() {
        endpoint.public_url = request.public_url;
    }

    let mut unused_files = Vec::new();
    let tls_enabled = request.tls;
    if tls_enabled {
        endpoint.tls_config = tls_paths(
            &state,
            id,
            request.tls_skip_verify,
            request.tls_skip_client_verify,
        )?;
        if request.tls_skip_verify {
            unused_files.push(TlsFileKind::Ca);
        }
        if request.tls_skip_client_verify {
            unused_files.extend([TlsFileKind::Cert, TlsFileKind::Key]);
        }
    } else {
        endpoint.tls_config = TlsConfiguration::default();
    }

    // A stale transport is replaced, never mutated
    state.proxies.create_and_register_proxy(&endpoint).await?;
    state.endpoints.update_endpoint(id, &endpoint)?;

    // Only once nothing refers to them any more
    let folder = id.to_string();
    if tls_enabled {
        for kind in unused_files {
            state.files.delete_tls_file(&folder, kind).await?;
        }
    } else {
        state.files.delete_tls_files(&folder).await?;
    }

    info!(endpoint_id = %id, "Endpoint updated");
    Ok(Json(endpoint))
}

/// `PUT /api/endpoints/{id}/access`
pub async fn update_endpoint_access(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateEndpointAccessRequest>,
) -> ApiResult<Json<Endpoint>> {
    let id: EndpointId = parse_id(&id)?;
    let mut endpoint = state.endpoints.endpoint(id)?;

    if let Some(users) = request.authorized_users {
        endpoint.authorized_users = users;
    }
    if let Some(teams) = request.authorized_teams {
        endpoint.authorized_teams = teams;
    }

    state.endpoints.update_endpoint(id, &endpoint)?;
    info!(
        endpoint_id = %id,
        users = endpoint.authorized_users.len(),
        teams = endpoint.authorized_teams.len(),
        "Endpoint access updated"
    );
    Ok(Json(endpoint))
}

/// `DELETE /api/endpoints/{id}`
pub async fn delete_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    ensure_management_enabled(&state)?;

    let id: EndpointId = parse_id(&id)?;
    let endpoint = state.endpoints.endpoint(id)?;

    // Record first, so a proxy built concurrently from it is torn down too
    state.endpoints.delete_endpoint(id)?;
    state.proxies.delete_proxy(id);

    if endpoint.tls_config.tls {
        state.files.delete_tls_files(&id.to_string()).await?;
    }

    info!(endpoint_id = %id, "Endpoint deleted");
    Ok(())
}
