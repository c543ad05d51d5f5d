//! Engine reverse proxy
//!
//! Requests under `/api/{endpointId}/docker/` are classified, forwarded to the
//! endpoint's engine over HTTP, HTTPS or a Unix socket, and the responses are
//! filtered or checked against resource controls.

pub mod classify;
mod manager;
mod transport;
pub mod upstream;

pub use classify::{Operation, Route, classify};
pub use manager::{DEFAULT_ENGINE_PORT, ProxyManager};
pub use transport::{BodyLimits, ProxyTransport};
pub use upstream::{HttpUpstream, SocketUpstream, Upstream, UpstreamKind};
