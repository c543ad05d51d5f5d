//! Error types for cloudware
//!
//! Each concern owns a `thiserror` enum. Start-up failures aggregate into
//! [`AppError`]; request-scoped failures are converted into [`ApiError`] at the
//! HTTP boundary, which renders the `{"err": "..."}` body the UI expects.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("Stack error: {0}")]
    Stack(#[from] StackError),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("HTTP server error: {0}")]
    Http(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Token and credential errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing authorization token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Cryptographic failure: {0}")]
    Crypto(String),
}

/// Persistence errors raised by store implementations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} not found")]
    NotFound { kind: &'static str },

    #[error("{kind} already exists")]
    AlreadyExists { kind: &'static str },

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn not_found(kind: &'static str) -> Self {
        StoreError::NotFound { kind }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Errors raised while building or running an engine proxy
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid TLS configuration: {0}")]
    Tls(String),

    #[error("Unable to reach the engine: {0}")]
    Upstream(String),

    #[error("Access denied to resource")]
    AccessDenied,

    #[error("Operation reserved to administrators")]
    AdministratorOnly,

    #[error("Invalid request payload: {0}")]
    InvalidPayload(String),

    #[error("Failed to build proxied response: {0}")]
    Response(String),

    #[error("Engine response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stack deployment errors
#[derive(Error, Debug)]
pub enum StackError {
    #[error("{0}")]
    Command(String),

    #[error("Unable to run docker binary: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    File(#[from] FileError),
}

/// File storage errors
#[derive(Error, Debug)]
pub enum FileError {
    #[error("File IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TLS file kind: {0}")]
    InvalidTlsFileKind(String),

    #[error("Invalid file or folder name: {0}")]
    InvalidName(String),
}

/// Error returned by HTTP handlers and middleware
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Unavailable(String),

    /// Failure of an external command whose output is meant for operators
    #[error("{0}")]
    Command(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn access_denied() -> Self {
        ApiError::AccessDenied("Access denied to resource".into())
    }

    pub fn invalid_json() -> Self {
        ApiError::BadRequest("Invalid JSON".into())
    }

    pub fn invalid_request() -> Self {
        ApiError::BadRequest("Invalid request data format".into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError::Internal(detail.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Command(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!(error = %detail, "Request failed with an internal error");
        }
        let status = self.status();
        (status, Json(json!({ "err": self.to_string() }))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Crypto(detail) => ApiError::Internal(detail),
            AuthError::InvalidCredentials => ApiError::Unprocessable(e.to_string()),
            _ => ApiError::Unauthenticated,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoreError::AlreadyExists { .. } => ApiError::Conflict(e.to_string()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ProxyError> for ApiError {
    fn from(e: ProxyError) -> Self {
        match e {
            ProxyError::AccessDenied | ProxyError::AdministratorOnly => {
                ApiError::AccessDenied(e.to_string())
            }
            ProxyError::InvalidUrl { .. }
            | ProxyError::UnsupportedScheme(_)
            | ProxyError::Tls(_)
            | ProxyError::InvalidPayload(_) => ApiError::BadRequest(e.to_string()),
            ProxyError::Store(inner) => inner.into(),
            ProxyError::Upstream(_)
            | ProxyError::Response(_)
            | ProxyError::ResponseTooLarge { .. } => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<StackError> for ApiError {
    fn from(e: StackError) -> Self {
        match e {
            StackError::Command(stderr) => ApiError::Command(stderr),
            StackError::Spawn(_) => ApiError::Internal(e.to_string()),
            StackError::File(inner) => inner.into(),
        }
    }
}

impl From<FileError> for ApiError {
    fn from(e: FileError) -> Self {
        match e {
            FileError::InvalidTlsFileKind(_) | FileError::InvalidName(_) => {
                ApiError::BadRequest(e.to_string())
            }
            FileError::Io(_) => ApiError::Internal(e.to_string()),
        }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for HTTP handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
