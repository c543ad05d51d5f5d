//! Configuration types for cloudware
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use crate::util::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Authentication settings
    pub auth: AuthConfig,

    /// Data directory settings
    pub data: DataConfig,

    /// Engine proxy settings
    pub proxy: ProxyConfig,

    /// Stack deployment settings
    pub stacks: StackConfig,

    /// Endpoint management settings
    pub endpoints: EndpointsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// When false every route behaves as if called by an administrator
    pub enabled: bool,

    /// HMAC secret used to sign tokens; generated at start-up when absent
    pub jwt_secret: Option<SecretString>,

    /// Token lifetime in seconds
    pub token_lifetime_secs: u64,

    /// Argon2 PHC hash for the bootstrap administrator (user id 1)
    pub admin_password_hash: Option<SecretString>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jwt_secret: None,
            token_lifetime_secs: 8 * 60 * 60,
            admin_password_hash: None,
        }
    }
}

/// Data directory configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root directory for the store snapshot, TLS material and compose files
    pub path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/data"),
        }
    }
}

/// Engine proxy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// TCP connect timeout towards engine endpoints
    pub connect_timeout_secs: u64,

    /// Largest request body buffered for payload inspection
    pub max_request_body_bytes: usize,

    /// Largest engine response buffered for filtering
    pub max_response_body_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            max_request_body_bytes: 10 * 1024 * 1024,
            max_response_body_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Stack deployment configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Directory holding the `docker` binary
    pub docker_binary_path: PathBuf,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            docker_binary_path: PathBuf::from("/usr/local/bin"),
        }
    }
}

/// Endpoint management configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Allow endpoints to be created, updated and deleted through the API
    pub management_enabled: bool,

    /// Endpoint registered at start-up when none exist (`unix://` or `tcp://`)
    pub initial_url: Option<String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            management_enabled: true,
            initial_url: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}
