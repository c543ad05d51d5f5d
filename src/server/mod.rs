//! HTTP API
//!
//! The axum router, its shared state and the listener loop.

pub mod handlers;
mod http;
mod router;
mod state;

pub use http::run_http;
pub use router::build_router;
pub use state::{AppState, ServerFlags, Store};
