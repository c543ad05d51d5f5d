//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (CLOUDWARE__*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "cloudware.toml",
    ".cloudware.toml",
    "~/.config/cloudware/config.toml",
    "/etc/cloudware/config.toml",
];

/// Shortest accepted HMAC secret, in bytes
const MIN_JWT_SECRET_LEN: usize = 32;

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // e.g. CLOUDWARE__SERVER__PORT, CLOUDWARE__AUTH__ENABLED
    builder = builder.add_source(
        Environment::with_prefix("CLOUDWARE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::Invalid {
            message: "server.port must be greater than 0".to_string(),
        });
    }

    if config.auth.token_lifetime_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "auth.token_lifetime_secs must be greater than 0".to_string(),
        });
    }

    if let Some(secret) = &config.auth.jwt_secret
        && secret.expose_secret().len() < MIN_JWT_SECRET_LEN
    {
        return Err(ConfigError::Invalid {
            message: format!(
                "auth.jwt_secret must be at least {} bytes long",
                MIN_JWT_SECRET_LEN
            ),
        });
    }

    if config.proxy.connect_timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "proxy.connect_timeout_secs must be greater than 0".to_string(),
        });
    }

    if config.proxy.max_request_body_bytes == 0 || config.proxy.max_response_body_bytes == 0 {
        return Err(ConfigError::Invalid {
            message: "proxy body limits must be greater than 0".to_string(),
        });
    }

    if config.data.path.as_os_str().is_empty() {
        return Err(ConfigError::Missing {
            field: "data.path".to_string(),
        });
    }

    if let Some(url) = &config.endpoints.initial_url {
        validate_endpoint_url(url)?;
    }

    Ok(())
}

/// Only `unix://` and `tcp://` endpoints may be registered from configuration
fn validate_endpoint_url(url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("unix://") && !url.starts_with("tcp://") {
        return Err(ConfigError::Invalid {
            message: format!(
                "endpoints.initial_url must start with unix:// or tcp://, got: {}",
                url
            ),
        });
    }
    Ok(())
}
