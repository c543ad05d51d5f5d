//! `/api/{endpointId}/docker/*`
//!
//! Hands engine API requests to the endpoint's proxy transport, building the
//! transport on first use.

use crate::error::{ApiError, ApiResult};
use crate::security::{RestrictedContext, is_endpoint_access_authorized};
use crate::server::handlers::parse_id;
use crate::server::state::AppState;
use crate::store::EndpointId;
use axum::extract::{Path, Request, State};
use axum::http::Uri;
use axum::response::Response;
use tracing::debug;

pub async fn proxy_request(
    State(state): State<AppState>,
    context: RestrictedContext,
    Path((endpoint_id, _)): Path<(String, String)>,
    request: Request,
) -> ApiResult<Response> {
    let id: EndpointId = parse_id(&endpoint_id)?;
    let endpoint = state.endpoints.endpoint(id)?;

    if !context.is_admin
        && !is_endpoint_access_authorized(&endpoint, context.user_id, &context.user_memberships)
    {
        return Err(ApiError::AccessDenied("Access denied to endpoint".into()));
    }

    let proxy = match state.proxies.get_proxy(id) {
        Some(proxy) => proxy,
        None => {
            debug!(endpoint_id = %id, "Building proxy on first use");
            let proxy = state.proxies.get_or_create_proxy(&endpoint).await?;
            // The endpoint may have been deleted while the proxy was built
            if let Err(e) = state.endpoints.endpoint(id) {
                state.proxies.delete_proxy(id);
                return Err(e.into());
            }
            proxy
        }
    };

    let (mut parts, body) = request.into_parts();
    parts.uri = engine_uri(&parts.uri)?;

    let response = proxy
        .proxy(Request::from_parts(parts, body), &context)
        .await?;
    Ok(response)
}

/// Strip `/api/{endpointId}/docker`, keeping the rest of the path encoded as received
fn engine_uri(uri: &Uri) -> ApiResult<Uri> {
    let rest = uri
        .path()
        .splitn(5, '/')
        .nth(4)
        .unwrap_or_default();

    let target = match uri.query() {
        Some(query) => format!("/{rest}?{query}"),
        None => format!("/{rest}"),
    };
    target.parse().map_err(|_| ApiError::invalid_request())
}
