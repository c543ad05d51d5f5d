//! `POST /api/auth`

use crate::error::{ApiError, ApiResult, AuthError};
use crate::security::{TokenData, verify_password};
use crate::server::handlers::JsonBody;
use crate::server::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub jwt: String,
}

/// Exchange credentials for a token
pub async fn authenticate(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<AuthRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if !state.flags.authentication {
        return Err(ApiError::Unavailable("Authentication is disabled".into()));
    }

    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest("Invalid credentials format".into()));
    }

    let user = match state.users.user_by_username(&request.username) {
        Ok(user) => user,
        Err(e) if e.is_not_found() => {
            debug!(username = %request.username, "Authentication for unknown user");
            return Err(ApiError::BadRequest(AuthError::InvalidCredentials.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    if !verify_password(&request.password, user.password.expose_secret())? {
        debug!(user_id = %user.id, "Authentication with a wrong password");
        return Err(AuthError::InvalidCredentials.into());
    }

    let jwt = state.jwt.generate_token(&TokenData {
        id: user.id,
        username: user.username,
        role: user.role,
    })?;

    info!(user_id = %user.id, "User authenticated");
    Ok(Json(AuthResponse { jwt }))
}
