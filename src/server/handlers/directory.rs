//! Read-only listings of users, teams and registries
//!
//! Records are rendered through views so password hashes and registry
//! credentials never leave the store.

use crate::error::{ApiError, ApiResult};
use crate::security::{
    RestrictedContext, Team, TeamId, TokenData, User, UserId, UserRole, filter_registries,
    filter_user_teams, filter_users,
};
use crate::server::handlers::parse_id;
use crate::server::state::AppState;
use crate::store::{Registry, RegistryId};
use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct UserView {
    #[serde(rename = "Id")]
    pub id: UserId,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Role")]
    pub role: UserRole,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistryView {
    #[serde(rename = "Id")]
    pub id: RegistryId,
    pub name: String,
    #[serde(rename = "URL")]
    pub url: String,
    pub authentication: bool,
    pub username: String,
    pub authorized_users: Vec<UserId>,
    pub authorized_teams: Vec<TeamId>,
}

impl From<Registry> for RegistryView {
    fn from(registry: Registry) -> Self {
        Self {
            id: registry.id,
            name: registry.name,
            url: registry.url,
            authentication: registry.authentication,
            username: registry.username,
            authorized_users: registry.authorized_users,
            authorized_teams: registry.authorized_teams,
        }
    }
}

/// `GET /api/users`
pub async fn list_users(
    State(state): State<AppState>,
    context: RestrictedContext,
) -> ApiResult<Json<Vec<UserView>>> {
    let users = filter_users(state.users.users()?, &context);
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

/// `GET /api/users/{id}`, restricted to the caller's own record unless administrator
pub async fn get_user(
    State(state): State<AppState>,
    token: TokenData,
    Path(id): Path<String>,
) -> ApiResult<Json<UserView>> {
    let id = UserId(parse_id(&id)?);
    if !token.is_admin() && token.id != id {
        return Err(ApiError::access_denied());
    }
    Ok(Json(state.users.user(id)?.into()))
}

/// `GET /api/teams`
pub async fn list_teams(
    State(state): State<AppState>,
    context: RestrictedContext,
) -> ApiResult<Json<Vec<Team>>> {
    Ok(Json(filter_user_teams(state.teams.teams()?, &context)))
}

/// `GET /api/registries`
pub async fn list_registries(
    State(state): State<AppState>,
    context: RestrictedContext,
) -> ApiResult<Json<Vec<RegistryView>>> {
    let registries = filter_registries(state.registries.registries()?, &context);
    Ok(Json(registries.into_iter().map(RegistryView::from).collect()))
}
