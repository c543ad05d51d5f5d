//! Proxy transport
//!
//! Wraps an [`Upstream`] and applies resource controls to every round trip:
//! requests are classified, forwarded, and resource-bearing responses are
//! filtered or checked before they reach the caller.
//!
//! Decoding failures on list responses degrade to pass-through. Decoding
//! failures on anything that decides access for a non-administrator deny.

use crate::access_control::{
    ResourceControlIndex, ResourceKind, Shape, check_object, filter_blacklisted_containers,
    filter_collection,
};
use crate::error::ProxyError;
use crate::proxy::classify::{Operation, Route, classify};
use crate::proxy::upstream::{Upstream, UpstreamKind};
use crate::security::RestrictedContext;
use crate::store::{ResourceControlStore, SettingsStore};
use axum::body::{Body, Bytes, to_bytes};
use axum::http::response::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, header};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Headers that only make sense for a single connection
const HOP_BY_HOP_HEADERS: &[header::HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Largest bodies the transport buffers in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimits {
    /// Container create payloads inspected before forwarding
    pub request: usize,
    /// Engine responses that are filtered or checked
    pub response: usize,
}

/// Access-controlled round trips to one endpoint
pub struct ProxyTransport {
    upstream: Arc<dyn Upstream>,
    resource_controls: Arc<dyn ResourceControlStore>,
    settings: Arc<dyn SettingsStore>,
    limits: BodyLimits,
}

/// Result of inspecting a resource before a restricted operation
enum Inspection {
    Found(Value),
    /// The engine answered with an error; it will answer the real request too
    Missing,
    Undecodable,
}

impl ProxyTransport {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        resource_controls: Arc<dyn ResourceControlStore>,
        settings: Arc<dyn SettingsStore>,
        limits: BodyLimits,
    ) -> Self {
        Self {
            upstream,
            resource_controls,
            settings,
            limits,
        }
    }

    pub fn upstream_kind(&self) -> UpstreamKind {
        self.upstream.kind()
    }

    /// Proxy one request on behalf of `context`
    ///
    /// `request` must carry an origin-form URI relative to the engine API root.
    #[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
    pub async fn proxy(
        &self,
        request: Request<Body>,
        context: &RestrictedContext,
    ) -> Result<Response<Body>, ProxyError> {
        let Route {
            version_prefix,
            operation,
        } = classify(request.method(), request.uri().path());
        debug!(?operation, "Classified engine request");

        let request = sanitize_request(request);

        match operation {
            Operation::PassThrough => self.forward(request).await,
            Operation::AdministratorOnly => {
                if !context.is_admin {
                    return Err(ProxyError::AdministratorOnly);
                }
                self.forward(request).await
            }
            Operation::List(kind) => {
                let response = self.forward(request).await?;
                self.filter_list_response(response, kind, context).await
            }
            Operation::Inspect(kind) => {
                let response = self.forward(request).await?;
                self.check_inspect_response(response, kind, context).await
            }
            Operation::Restricted { kind, id } => {
                self.restricted_operation(request, kind, &id, &version_prefix, context)
                    .await
            }
            Operation::CreateContainer => self.create_container(request, context).await,
            Operation::SwarmInspect => {
                let response = self.forward(request).await?;
                self.hide_join_tokens(response, context).await
            }
        }
    }

    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let mut response = self.upstream.round_trip(request).await?;
        strip_hop_by_hop(response.headers_mut());
        Ok(response)
    }

    async fn filter_list_response(
        &self,
        response: Response<Body>,
        kind: ResourceKind,
        context: &RestrictedContext,
    ) -> Result<Response<Body>, ProxyError> {
        if !response.status().is_success() {
            return Ok(response);
        }

        let (parts, bytes) = self.buffer_response(response).await?;

        let mut payload: Value = match serde_json::from_slice(&bytes) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Engine list response is not JSON, passing through unfiltered");
                return Ok(raw_response(parts, bytes));
            }
        };

        let Some(slot) = collection_slot(&mut payload, kind) else {
            warn!(kind = %kind, "Unexpected engine list shape, passing through unfiltered");
            return Ok(raw_response(parts, bytes));
        };

        let controls = self.resource_controls.resource_controls()?;
        let index = ResourceControlIndex::new(&controls);

        let mut items = std::mem::take(slot);
        if kind == ResourceKind::Container {
            let settings = self.settings.settings()?;
            items = filter_blacklisted_containers(items, &settings.black_listed_labels);
        }
        *slot = filter_collection(items, kind, &index, context);

        json_response(parts, &payload)
    }

    async fn check_inspect_response(
        &self,
        response: Response<Body>,
        kind: ResourceKind,
        context: &RestrictedContext,
    ) -> Result<Response<Body>, ProxyError> {
        if !response.status().is_success() {
            return Ok(response);
        }

        let (parts, bytes) = self.buffer_response(response).await?;

        let object: Value = match serde_json::from_slice(&bytes) {
            Ok(object) => object,
            Err(e) if context.is_admin => {
                warn!(kind = %kind, error = %e, "Engine inspect response is not JSON, passing through");
                return Ok(raw_response(parts, bytes));
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "Engine inspect response is not JSON, denying access");
                return Err(ProxyError::AccessDenied);
            }
        };

        let controls = self.resource_controls.resource_controls()?;
        let index = ResourceControlIndex::new(&controls);

        match check_object(object, kind, &index, context) {
            Some(object) => json_response(parts, &object),
            None => Err(ProxyError::AccessDenied),
        }
    }

    async fn restricted_operation(
        &self,
        request: Request<Body>,
        kind: ResourceKind,
        id: &str,
        version_prefix: &str,
        context: &RestrictedContext,
    ) -> Result<Response<Body>, ProxyError> {
        let is_delete = request.method() == Method::DELETE;
        let mut resource_id = id.to_string();

        if !context.is_admin || is_delete {
            match self.inspect(kind, id, version_prefix).await? {
                Inspection::Found(object) => {
                    if let Some(canonical) = object
                        .pointer(kind.identifier_field())
                        .and_then(Value::as_str)
                    {
                        resource_id = canonical.to_string();
                    }

                    if !context.is_admin {
                        let controls = self.resource_controls.resource_controls()?;
                        let index = ResourceControlIndex::new(&controls);
                        if check_object(object, kind, &index, context).is_none() {
                            return Err(ProxyError::AccessDenied);
                        }
                    }
                }
                Inspection::Undecodable if !context.is_admin => {
                    warn!(kind = %kind, id, "Unable to evaluate resource ownership, denying access");
                    return Err(ProxyError::AccessDenied);
                }
                Inspection::Undecodable | Inspection::Missing => {}
            }
        }

        let response = self.forward(request).await?;

        if is_delete && response.status().is_success() {
            self.remove_resource_control(&resource_id);
        }

        Ok(response)
    }

    async fn inspect(
        &self,
        kind: ResourceKind,
        id: &str,
        version_prefix: &str,
    ) -> Result<Inspection, ProxyError> {
        let suffix = if kind == ResourceKind::Container {
            "/json"
        } else {
            ""
        };
        let uri = format!(
            "{}/{}/{}{}",
            version_prefix,
            kind.as_str(),
            urlencoding::encode(id),
            suffix
        );

        let request = Request::builder()
            .method(Method::GET)
            .uri(&uri)
            .body(Body::empty())
            .map_err(|e| ProxyError::Response(e.to_string()))?;

        let response = self.forward(request).await?;
        if !response.status().is_success() {
            debug!(uri, status = %response.status(), "Resource inspection failed");
            return Ok(Inspection::Missing);
        }

        let (_, bytes) = self.buffer_response(response).await?;
        Ok(serde_json::from_slice(&bytes)
            .map(Inspection::Found)
            .unwrap_or(Inspection::Undecodable))
    }

    /// Drop the control owned by a resource the engine just deleted
    fn remove_resource_control(&self, resource_id: &str) {
        match self
            .resource_controls
            .resource_control_by_resource_id(resource_id)
        {
            Ok(control) if control.resource_id == resource_id => {
                match self.resource_controls.delete_resource_control(control.id) {
                    Ok(()) => info!(resource_id, "Removed resource control of deleted resource"),
                    Err(e) => {
                        warn!(resource_id, error = %e, "Failed to remove resource control of deleted resource")
                    }
                }
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(resource_id, error = %e, "Failed to look up resource control"),
        }
    }

    async fn create_container(
        &self,
        request: Request<Body>,
        context: &RestrictedContext,
    ) -> Result<Response<Body>, ProxyError> {
        if context.is_admin {
            return self.forward(request).await;
        }

        let settings = self.settings.settings()?;
        if settings.allow_bind_mounts_for_regular_users
            && settings.allow_privileged_mode_for_regular_users
        {
            return self.forward(request).await;
        }

        let (parts, body) = request.into_parts();
        let bytes = to_bytes(body, self.limits.request)
            .await
            .map_err(|e| ProxyError::InvalidPayload(e.to_string()))?;
        let payload: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ProxyError::InvalidPayload(e.to_string()))?;

        if !settings.allow_privileged_mode_for_regular_users && requests_privileged(&payload) {
            debug!("Privileged container creation refused");
            return Err(ProxyError::AccessDenied);
        }
        if !settings.allow_bind_mounts_for_regular_users && requests_bind_mounts(&payload) {
            debug!("Bind mount refused");
            return Err(ProxyError::AccessDenied);
        }

        self.forward(Request::from_parts(parts, Body::from(bytes)))
            .await
    }

    /// Read an engine response body, bounded by the response limit
    async fn buffer_response(
        &self,
        response: Response<Body>,
    ) -> Result<(Parts, Bytes), ProxyError> {
        let limit = self.limits.response;
        let declared = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(ProxyError::ResponseTooLarge { limit });
        }

        let (parts, body) = response.into_parts();
        let bytes = to_bytes(body, limit)
            .await
            .map_err(|e| ProxyError::Upstream(format!("failed to read engine response: {e}")))?;
        Ok((parts, bytes))
    }

    async fn hide_join_tokens(
        &self,
        response: Response<Body>,
        context: &RestrictedContext,
    ) -> Result<Response<Body>, ProxyError> {
        if context.is_admin || !response.status().is_success() {
            return Ok(response);
        }

        let (parts, bytes) = self.buffer_response(response).await?;
        let mut swarm: Value = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(error = %e, "Swarm inspect response is not JSON, denying access");
            ProxyError::AccessDenied
        })?;

        if let Some(object) = swarm.as_object_mut() {
            object.remove("JoinTokens");
        }
        json_response(parts, &swarm)
    }
}

/// Mutable reference to the array of items in a list payload
fn collection_slot(payload: &mut Value, kind: ResourceKind) -> Option<&mut Vec<Value>> {
    let list = match kind.collection_field() {
        Some(field) => payload.get_mut(field)?,
        None => payload,
    };
    list.as_array_mut()
}

fn requests_privileged(payload: &Value) -> bool {
    payload
        .pointer("/HostConfig/Privileged")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn requests_bind_mounts(payload: &Value) -> bool {
    let binds = payload
        .pointer("/HostConfig/Binds")
        .and_then(Value::as_array)
        .is_some_and(|binds| !binds.is_empty());

    let bind_mounts = payload
        .pointer("/HostConfig/Mounts")
        .and_then(Value::as_array)
        .is_some_and(|mounts| {
            mounts
                .iter()
                .any(|m| m.get("Type").and_then(Value::as_str) == Some("bind"))
        });

    binds || bind_mounts
}

/// Remove headers the engine must not see
fn sanitize_request(mut request: Request<Body>) -> Request<Body> {
    let headers = request.headers_mut();
    strip_hop_by_hop(headers);
    headers.remove(header::AUTHORIZATION);
    headers.remove(header::HOST);
    request
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

fn raw_response(mut parts: Parts, bytes: Bytes) -> Response<Body> {
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
    Response::from_parts(parts, Body::from(bytes))
}

fn json_response(parts: Parts, payload: &Value) -> Result<Response<Body>, ProxyError> {
    let bytes = serde_json::to_vec(payload).map_err(|e| ProxyError::Response(e.to_string()))?;
    Ok(raw_response(parts, Bytes::from(bytes)))
}
