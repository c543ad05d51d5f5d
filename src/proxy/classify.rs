//! Request classification
//!
//! Maps an engine API request (method + path, with the endpoint prefix
//! already stripped) to the operation the transport has to perform.

use crate::access_control::ResourceKind;
use axum::http::Method;

/// What the transport does with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Collection read; the response is filtered and decorated
    List(ResourceKind),
    /// Single-object read; the response is checked and decorated
    Inspect(ResourceKind),
    /// Any other request on an identified resource; access is checked before forwarding
    Restricted { kind: ResourceKind, id: String },
    /// Container creation; the payload is checked against the settings
    CreateContainer,
    /// Reserved to administrators
    AdministratorOnly,
    /// Swarm inspection; join tokens are hidden from non-administrators
    SwarmInspect,
    /// Forwarded untouched
    PassThrough,
}

/// Classified request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// API version prefix such as `/v1.41`, or empty
    pub version_prefix: String,
    pub operation: Operation,
}

/// Classify a request by method and path
pub fn classify(method: &Method, path: &str) -> Route {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let version_prefix = match segments.first() {
        Some(first) if is_version_segment(first) => format!("/{}", segments.remove(0)),
        _ => String::new(),
    };

    let operation = match segments.split_first() {
        Some((&"swarm", rest)) => classify_swarm(method, rest),
        Some((&"nodes", _)) if method != Method::GET => Operation::AdministratorOnly,
        Some((&first, rest)) => match ResourceKind::try_parse(first) {
            Some(kind) => classify_resource(method, kind, rest),
            None if rest.last() == Some(&"prune") => Operation::AdministratorOnly,
            None => Operation::PassThrough,
        },
        None => Operation::PassThrough,
    };

    Route {
        version_prefix,
        operation,
    }
}

fn classify_swarm(method: &Method, rest: &[&str]) -> Operation {
    match rest {
        [] if method == Method::GET => Operation::SwarmInspect,
        _ => Operation::AdministratorOnly,
    }
}

fn classify_resource(method: &Method, kind: ResourceKind, rest: &[&str]) -> Operation {
    let is_container = kind == ResourceKind::Container;

    match rest {
        ["json"] if is_container && method == Method::GET => Operation::List(kind),
        [] if !is_container && method == Method::GET => Operation::List(kind),
        ["prune"] => Operation::AdministratorOnly,
        ["create"] if method == Method::POST => {
            if is_container {
                Operation::CreateContainer
            } else {
                Operation::PassThrough
            }
        }
        [_, "json"] if is_container && method == Method::GET => Operation::Inspect(kind),
        [_] if !is_container && method == Method::GET => Operation::Inspect(kind),
        [id, ..] => Operation::Restricted {
            kind,
            id: decode_segment(id),
        },
        [] => Operation::PassThrough,
    }
}

/// `v1.41`, `v1.24`, ...
fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit() || c == '.'))
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
