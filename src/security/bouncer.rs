//! Request bouncer
//!
//! Route-level access policies applied as axum middleware. On success the
//! resolved identity is stored in the request extensions; handlers take it
//! back out with the [`TokenData`] and [`RestrictedContext`] extractors.

use crate::error::{ApiError, ApiResult, AuthError};
use crate::security::jwt::JwtService;
use crate::security::types::{RestrictedContext, TokenData};
use crate::store::{TeamMembershipStore, UserStore};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tracing::debug;

/// Resolves identities and enforces route policies
#[derive(Clone)]
pub struct RequestBouncer {
    jwt: Arc<JwtService>,
    users: Arc<dyn UserStore>,
    memberships: Arc<dyn TeamMembershipStore>,
    auth_disabled: bool,
}

impl RequestBouncer {
    pub fn new(
        jwt: Arc<JwtService>,
        users: Arc<dyn UserStore>,
        memberships: Arc<dyn TeamMembershipStore>,
        auth_disabled: bool,
    ) -> Self {
        Self {
            jwt,
            users,
            memberships,
            auth_disabled,
        }
    }

    pub fn auth_disabled(&self) -> bool {
        self.auth_disabled
    }

    /// Resolve the caller from the `Authorization: Bearer` header
    ///
    /// With authentication disabled every caller is the fixed administrator
    /// identity and no header is required.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<TokenData, AuthError> {
        if self.auth_disabled {
            return Ok(TokenData::auth_disabled());
        }

        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        self.jwt.parse_and_verify_token(token)
    }

    /// Build the restricted context for `token` from the current memberships
    ///
    /// Fails with `Unauthenticated` when the token refers to a user that no
    /// longer exists.
    pub fn restricted_context(&self, token: &TokenData) -> ApiResult<RestrictedContext> {
        if self.auth_disabled {
            return Ok(RestrictedContext::new(token, Vec::new()));
        }

        match self.users.user(token.id) {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                debug!(user_id = %token.id, "Token refers to a deleted user");
                return Err(ApiError::Unauthenticated);
            }
            Err(e) => return Err(e.into()),
        }

        let memberships = self.memberships.memberships_by_user_id(token.id)?;
        Ok(RestrictedContext::new(token, memberships))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// No authentication required
pub async fn public_access(request: Request, next: Next) -> Response {
    next.run(request).await
}

/// Requires a valid token
pub async fn authenticated_access(
    State(bouncer): State<RequestBouncer>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bouncer.authenticate(request.headers())?;
    request.extensions_mut().insert(token);
    Ok(next.run(request).await)
}

/// Requires a valid token with the administrator role
pub async fn administrator_access(
    State(bouncer): State<RequestBouncer>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bouncer.authenticate(request.headers())?;
    if !token.is_admin() {
        return Err(ApiError::access_denied());
    }
    request.extensions_mut().insert(token);
    Ok(next.run(request).await)
}

/// Requires a valid token and attaches a fresh membership snapshot
pub async fn restricted_access(
    State(bouncer): State<RequestBouncer>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bouncer.authenticate(request.headers())?;
    let context = bouncer.restricted_context(&token)?;
    request.extensions_mut().insert(token);
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

impl<S: Send + Sync> FromRequestParts<S> for TokenData {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .remove::<TokenData>()
            .ok_or_else(|| ApiError::internal("token data missing from request context"))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RestrictedContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .remove::<RestrictedContext>()
            .ok_or_else(|| ApiError::internal("restricted context missing from request context"))
    }
}
