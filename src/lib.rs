//! Cloudware
//!
//! A multi-tenant control plane for Docker engines. Users and teams share
//! engine endpoints through an authenticating reverse proxy that filters and
//! guards engine resources according to resource controls.
//!
//! ## Request flow
//!
//! ```text
//! client → bouncer (JWT) → handler ─┬→ store (users, endpoints, controls, stacks)
//!                                   └→ proxy transport → engine API
//! ```
//!
//! ## Example Configuration
//!
//! ```toml
//! [server]
//! port = 9000
//!
//! [auth]
//! token_lifetime_secs = 28800
//! # jwt_secret from CLOUDWARE__AUTH__JWT_SECRET
//!
//! [endpoints]
//! initial_url = "unix:///var/run/docker.sock"
//! ```

pub mod access_control;
pub mod config;
pub mod error;
pub mod file;
pub mod proxy;
pub mod security;
pub mod server;
pub mod stack;
pub mod store;
pub mod util;

// Re-export main types
pub use config::{AppConfig, load_config};
pub use error::{AppError, Result};
pub use server::{AppState, build_router, run_http};
