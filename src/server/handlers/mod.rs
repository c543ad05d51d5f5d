//! HTTP handlers
//!
//! One module per API area. Handlers take their identity from the extractors
//! installed by the bouncer middleware and return [`ApiResult`].

pub mod auth;
pub mod directory;
pub mod docker;
pub mod dockerhub;
pub mod endpoints;
pub mod resource_controls;
pub mod settings;
pub mod stacks;
pub mod status;
pub mod upload;
pub mod users;

use crate::error::{ApiError, ApiResult};
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use std::str::FromStr;

/// JSON request body rejected with the API's own error shape
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| ApiError::invalid_request())?;
        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|_| ApiError::invalid_json())
    }
}

/// Parse a numeric path identifier, 400 on failure
pub(crate) fn parse_id<T: FromStr>(raw: &str) -> ApiResult<T> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid identifier: {raw}")))
}
