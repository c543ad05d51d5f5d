//! `POST /api/upload/tls/{ca|cert|key}?folder=<id>`
//!
//! The request body is the raw PEM content.

use crate::error::{ApiError, ApiResult};
use crate::file::TlsFileKind;
use crate::server::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default)]
    pub folder: Option<String>,
}

pub async fn upload_tls(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<()> {
    let kind = TlsFileKind::try_parse(&kind)?;
    let folder = query
        .folder
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Invalid query format".into()))?;

    if body.is_empty() {
        return Err(ApiError::invalid_request());
    }

    let path = state.files.store_tls_file(&folder, kind, &body).await?;
    info!(folder, kind = %kind, path = %path.display(), "TLS file uploaded");
    Ok(())
}
