//! User management
//!
//! Administrators manage every account. Team leaders may create standard
//! users, and every user may change their own password.

use crate::error::{ApiError, ApiResult};
use crate::security::{
    RestrictedContext, TeamMembership, TokenData, User, UserId, UserRole, hash_password,
    verify_password,
};
use crate::server::handlers::directory::UserView;
use crate::server::handlers::{JsonBody, parse_id};
use crate::server::state::AppState;
use crate::store::UserStore;
use crate::util::SecretString;
use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Identifier of the account created by the first administrator setup
const INITIAL_ADMIN_ID: UserId = UserId(1);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitAdminRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedUser {
    #[serde(rename = "Id")]
    pub id: UserId,
}

#[derive(Debug, Serialize)]
pub struct PasswordCheck {
    pub valid: bool,
}

fn admin_exists(users: &dyn UserStore) -> ApiResult<bool> {
    Ok(users.users()?.iter().any(|u| u.role.is_admin()))
}

fn password_hash(password: &str) -> ApiResult<SecretString> {
    if password.is_empty() {
        return Ok(SecretString::default());
    }
    Ok(hash_password(password)?)
}

/// `POST /api/users`
pub async fn create_user(
    State(state): State<AppState>,
    context: RestrictedContext,
    JsonBody(request): JsonBody<CreateUserRequest>,
) -> ApiResult<Json<CreatedUser>> {
    if !context.is_admin && !context.is_team_leader {
        return Err(ApiError::access_denied());
    }
    if !context.is_admin && request.role.is_admin() {
        return Err(ApiError::AccessDenied(
            "Team leaders cannot create administrators".into(),
        ));
    }
    if request.username.is_empty() || request.username.chars().any(char::is_whitespace) {
        return Err(ApiError::BadRequest(
            "Invalid username. Must not contain any whitespace".into(),
        ));
    }

    let mut user = User {
        id: UserId(0),
        username: request.username,
        password: password_hash(&request.password)?,
        role: request.role,
    };
    state.users.create_user(&mut user)?;

    info!(user_id = %user.id, created_by = %context.user_id, "User created");
    Ok(Json(CreatedUser { id: user.id }))
}

/// `PUT /api/users/{id}`, a role change is reserved to administrators
pub async fn update_user(
    State(state): State<AppState>,
    token: TokenData,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateUserRequest>,
) -> ApiResult<Json<UserView>> {
    let id = UserId(parse_id(&id)?);
    if !token.is_admin() && token.id != id {
        return Err(ApiError::access_denied());
    }
    if request.password.is_empty() && request.role.is_none() {
        return Err(ApiError::BadRequest(
            "Invalid user data: a password or a role is required".into(),
        ));
    }
    if !token.is_admin() && request.role.is_some() {
        return Err(ApiError::AccessDenied(
            "Only administrators can change a role".into(),
        ));
    }

    let mut user = state.users.user(id)?;
    if !request.password.is_empty() {
        user.password = password_hash(&request.password)?;
    }
    if let Some(role) = request.role {
        user.role = role;
    }
    state.users.update_user(id, &user)?;

    info!(user_id = %id, updated_by = %token.id, "User updated");
    Ok(Json(user.into()))
}

/// `DELETE /api/users/{id}`, memberships go with the account
pub async fn delete_user(
    State(state): State<AppState>,
    token: TokenData,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = UserId(parse_id(&id)?);
    if id == INITIAL_ADMIN_ID {
        return Err(ApiError::AccessDenied(
            "Cannot remove the initial administrator".into(),
        ));
    }
    if token.id == id {
        return Err(ApiError::AccessDenied(
            "Cannot remove your own user account. Contact another administrator".into(),
        ));
    }

    state.users.user(id)?;
    state.memberships.delete_memberships_by_user_id(id)?;
    state.users.delete_user(id)?;

    info!(user_id = %id, deleted_by = %token.id, "User deleted");
    Ok(())
}

/// `GET /api/users/{id}/memberships`
pub async fn get_memberships(
    State(state): State<AppState>,
    token: TokenData,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<TeamMembership>>> {
    let id = UserId(parse_id(&id)?);
    if !token.is_admin() && token.id != id {
        return Err(ApiError::access_denied());
    }
    Ok(Json(state.memberships.memberships_by_user_id(id)?))
}

/// `POST /api/users/{id}/passwd`, checks a password without issuing a token
pub async fn check_password(
    State(state): State<AppState>,
    token: TokenData,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<PasswordRequest>,
) -> ApiResult<Json<PasswordCheck>> {
    let id = UserId(parse_id(&id)?);
    if !token.is_admin() && token.id != id {
        return Err(ApiError::access_denied());
    }

    let user = state.users.user(id)?;
    if user.password.is_empty() {
        return Ok(Json(PasswordCheck { valid: false }));
    }
    let valid = verify_password(&request.password, user.password.expose_secret())?;
    Ok(Json(PasswordCheck { valid }))
}

/// `GET /api/users/admin/check`, 404 until an administrator exists
pub async fn check_admin(State(state): State<AppState>) -> ApiResult<()> {
    if !admin_exists(state.users.as_ref())? {
        return Err(ApiError::NotFound("User not found".into()));
    }
    Ok(())
}

/// `POST /api/users/admin/init`, only while no administrator exists
pub async fn init_admin(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<InitAdminRequest>,
) -> ApiResult<Json<UserView>> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Invalid request payload: username and password are required".into(),
        ));
    }
    if admin_exists(state.users.as_ref())? {
        return Err(ApiError::Conflict("Admin user already initialized".into()));
    }

    let mut admin = User {
        id: UserId(0),
        username: request.username,
        password: hash_password(&request.password)?,
        role: UserRole::Administrator,
    };
    state.users.create_user(&mut admin)?;

    info!(user_id = %admin.id, "Administrator initialized");
    Ok(Json(admin.into()))
}
