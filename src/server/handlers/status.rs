//! `GET /api/status`

use crate::server::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Status {
    pub authentication: bool,
    pub endpoint_management: bool,
    pub version: &'static str,
}

pub async fn get_status(State(state): State<AppState>) -> Json<Status> {
    Json(Status {
        authentication: state.flags.authentication,
        endpoint_management: state.flags.endpoint_management,
        version: env!("CARGO_PKG_VERSION"),
    })
}
