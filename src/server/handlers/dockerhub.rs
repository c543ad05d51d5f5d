//! DockerHub credentials used when deploying stacks

use crate::error::{ApiError, ApiResult};
use crate::server::handlers::JsonBody;
use crate::server::state::AppState;
use crate::store::DockerHub;
use crate::util::SecretString;
use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Credentials as rendered to clients, without the password
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DockerHubView {
    pub authentication: bool,
    pub username: String,
}

impl From<DockerHub> for DockerHubView {
    fn from(dockerhub: DockerHub) -> Self {
        Self {
            authentication: dockerhub.authentication,
            username: dockerhub.username,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateDockerHubRequest {
    pub authentication: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// `GET /api/dockerhub`
pub async fn get_dockerhub(State(state): State<AppState>) -> ApiResult<Json<DockerHubView>> {
    Ok(Json(state.dockerhub.dockerhub()?.into()))
}

/// `PUT /api/dockerhub`, disabling authentication clears the stored credentials
pub async fn update_dockerhub(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<UpdateDockerHubRequest>,
) -> ApiResult<Json<DockerHubView>> {
    if request.authentication && (request.username.is_empty() || request.password.is_empty()) {
        return Err(ApiError::BadRequest(
            "Invalid credentials: username and password are required".into(),
        ));
    }

    let dockerhub = if request.authentication {
        DockerHub {
            authentication: true,
            username: request.username,
            password: SecretString::new(request.password),
        }
    } else {
        DockerHub::default()
    };
    state.dockerhub.store_dockerhub(&dockerhub)?;

    info!(authentication = dockerhub.authentication, "DockerHub credentials updated");
    Ok(Json(dockerhub.into()))
}
