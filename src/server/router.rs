//! API router
//!
//! Every route carries one bouncer policy as a route layer:
//!
//! | Policy | Routes |
//! |---|---|
//! | public | auth, status, public settings, administrator setup |
//! | authenticated | single user, memberships, password check, DockerHub read |
//! | administrator | settings, endpoint management, TLS upload, user removal, DockerHub update |
//! | restricted | endpoint list, user creation, directory listings, resource controls, stacks, engine proxy |

use crate::security::{
    administrator_access, authenticated_access, public_access, restricted_access,
};
use crate::server::handlers::{
    auth, directory, docker, dockerhub, endpoints, resource_controls, settings, stacks, status,
    upload, users,
};
use crate::server::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{any, delete, get, post, put};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let bouncer = state.bouncer.clone();
    let admin = || middleware::from_fn_with_state(bouncer.clone(), administrator_access);
    let authenticated = || middleware::from_fn_with_state(bouncer.clone(), authenticated_access);
    let restricted = || middleware::from_fn_with_state(bouncer.clone(), restricted_access);
    let public = || middleware::from_fn(public_access);

    Router::new()
        .route("/api/auth", post(auth::authenticate).route_layer(public()))
        .route("/api/status", get(status::get_status).route_layer(public()))
        .route(
            "/api/settings/public",
            get(settings::get_public_settings).route_layer(public()),
        )
        .route(
            "/api/settings",
            get(settings::get_settings)
                .put(settings::update_settings)
                .route_layer(admin()),
        )
        .route(
            "/api/endpoints",
            get(endpoints::list_endpoints)
                .route_layer(restricted())
                .merge(post(endpoints::create_endpoint).route_layer(admin())),
        )
        .route(
            "/api/endpoints/{id}",
            get(endpoints::get_endpoint)
                .put(endpoints::update_endpoint)
                .delete(endpoints::delete_endpoint)
                .route_layer(admin()),
        )
        .route(
            "/api/endpoints/{id}/access",
            put(endpoints::update_endpoint_access).route_layer(admin()),
        )
        .route(
            "/api/upload/tls/{kind}",
            post(upload::upload_tls).route_layer(admin()),
        )
        .route(
            "/api/users",
            get(directory::list_users)
                .post(users::create_user)
                .route_layer(restricted()),
        )
        .route(
            "/api/users/admin/check",
            get(users::check_admin).route_layer(public()),
        )
        .route(
            "/api/users/admin/init",
            post(users::init_admin).route_layer(public()),
        )
        .route(
            "/api/users/{id}",
            get(directory::get_user)
                .put(users::update_user)
                .route_layer(authenticated())
                .merge(delete(users::delete_user).route_layer(admin())),
        )
        .route(
            "/api/users/{id}/memberships",
            get(users::get_memberships).route_layer(authenticated()),
        )
        .route(
            "/api/users/{id}/passwd",
            post(users::check_password).route_layer(authenticated()),
        )
        .route(
            "/api/dockerhub",
            get(dockerhub::get_dockerhub)
                .route_layer(authenticated())
                .merge(put(dockerhub::update_dockerhub).route_layer(admin())),
        )
        .route(
            "/api/teams",
            get(directory::list_teams).route_layer(restricted()),
        )
        .route(
            "/api/registries",
            get(directory::list_registries).route_layer(restricted()),
        )
        .route(
            "/api/resource_controls",
            post(resource_controls::create_resource_control).route_layer(restricted()),
        )
        .route(
            "/api/resource_controls/{id}",
            put(resource_controls::update_resource_control)
                .delete(resource_controls::delete_resource_control)
                .route_layer(restricted()),
        )
        .route(
            "/api/{endpoint_id}/stacks",
            get(stacks::list_stacks)
                .post(stacks::create_stack)
                .route_layer(restricted()),
        )
        .route(
            "/api/{endpoint_id}/stacks/{id}",
            get(stacks::get_stack)
                .put(stacks::update_stack)
                .delete(stacks::delete_stack)
                .route_layer(restricted()),
        )
        .route(
            "/api/{endpoint_id}/stacks/{id}/stackfile",
            get(stacks::get_stack_file).route_layer(restricted()),
        )
        // `any` registers a fallback rather than method routes, which
        // `route_layer` does not wrap
        .route(
            "/api/{endpoint_id}/docker/{*path}",
            any(docker::proxy_request).layer(restricted()),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
