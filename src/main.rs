//! Cloudware
//!
//! Multi-tenant control plane for Docker engines.

use anyhow::Context;
use clap::Parser;
use cloudware::{
    config::{AppConfig, LogFormat, load_config, validate_config},
    file::FileService,
    proxy::{BodyLimits, ProxyManager},
    security::{JwtService, User, UserId, UserRole},
    server::{AppState, ServerFlags, build_router, run_http},
    stack::{DockerCliStackManager, StackDeployer},
    store::{Endpoint, EndpointId, EndpointStore, MemoryStore, UserStore},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Cloudware - shared Docker endpoints with per-resource access control
#[derive(Parser, Debug)]
#[command(name = "cloudware")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "CLOUDWARE_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CLOUDWARE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Address to listen on, overrides server.host and server.port
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Disable authentication
    #[arg(long)]
    no_auth: bool,

    /// Data directory
    #[arg(long)]
    data: Option<PathBuf>,

    /// Engine endpoint registered at first start (unix:// or tcp://)
    #[arg(short = 'H', long)]
    host: Option<String>,
}

impl Args {
    /// Fold command-line overrides into the loaded configuration
    fn apply(&self, config: &mut AppConfig) {
        if let Some(bind) = self.bind {
            config.server.host = bind.ip().to_string();
            config.server.port = bind.port();
        }
        if self.no_auth {
            config.auth.enabled = false;
        }
        if let Some(data) = &self.data {
            config.data.path = data.clone();
        }
        if let Some(host) = &self.host {
            config.endpoints.initial_url = Some(host.clone());
        }
    }
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (pretty, json) = match format {
        LogFormat::Pretty => (Some(fmt::layer().with_writer(std::io::stderr)), None),
        LogFormat::Json => (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        ),
    };

    tracing_subscriber::registry()
        .with(pretty)
        .with(json)
        .with(filter)
        .init();
}

/// Create the administrator (id 1) on an empty user table
fn bootstrap_admin(store: &MemoryStore, config: &AppConfig) -> anyhow::Result<()> {
    if !store.users()?.is_empty() {
        return Ok(());
    }

    let Some(hash) = &config.auth.admin_password_hash else {
        if config.auth.enabled {
            warn!(
                "No users exist and auth.admin_password_hash is not set; \
                 create the administrator through /api/users/admin/init"
            );
        }
        return Ok(());
    };

    let mut admin = User {
        id: UserId(0),
        username: "admin".to_string(),
        password: hash.clone(),
        role: UserRole::Administrator,
    };
    store.create_user(&mut admin)?;
    info!(user_id = %admin.id, "Bootstrapped administrator account");
    Ok(())
}

/// Register the configured engine on an empty endpoint table
fn bootstrap_endpoint(store: &MemoryStore, config: &AppConfig) -> anyhow::Result<()> {
    let Some(url) = &config.endpoints.initial_url else {
        return Ok(());
    };
    if !store.endpoints()?.is_empty() {
        return Ok(());
    }

    let mut endpoint = Endpoint {
        id: EndpointId(0),
        name: "primary".to_string(),
        url: url.clone(),
        public_url: String::new(),
        tls_config: Default::default(),
        authorized_users: Vec::new(),
        authorized_teams: Vec::new(),
    };
    store.create_endpoint(&mut endpoint)?;
    info!(endpoint_id = %endpoint.id, url = %endpoint.url, "Registered initial endpoint");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration, then apply overrides
    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    validate_config(&config).context("Invalid configuration")?;

    // Initialize logging
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_logging(level, config.logging.format);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting cloudware");
    if !config.auth.enabled {
        warn!("Authentication is disabled; every request runs as administrator");
    }

    // Open persistence
    let store = Arc::new(
        MemoryStore::open(&config.data.path)
            .inspect_err(|e| error!(error = %e, "Failed to open store"))?,
    );
    let files = FileService::new(&config.data.path)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to prepare data directory"))?;

    bootstrap_admin(&store, &config)?;
    bootstrap_endpoint(&store, &config)?;

    // Services
    let jwt = Arc::new(JwtService::new(
        config.auth.jwt_secret.as_ref(),
        config.auth.token_lifetime_secs,
    ));
    let proxies = Arc::new(ProxyManager::new(
        store.clone(),
        store.clone(),
        Duration::from_secs(config.proxy.connect_timeout_secs),
        BodyLimits {
            request: config.proxy.max_request_body_bytes,
            response: config.proxy.max_response_body_bytes,
        },
    ));
    let stack_manager = DockerCliStackManager::new(&config.stacks.docker_binary_path, files.clone());
    let deployer = Arc::new(StackDeployer::new(Arc::new(stack_manager)));

    let flags = ServerFlags {
        authentication: config.auth.enabled,
        endpoint_management: config.endpoints.management_enabled,
    };
    let state = AppState::new(store, flags, jwt, files, proxies, deployer);

    let bind: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    run_http(build_router(state), bind, CancellationToken::new())
        .await
        .inspect_err(|e| error!(error = %e, "HTTP server error"))?;

    Ok(())
}
