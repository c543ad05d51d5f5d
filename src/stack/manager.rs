//! Docker CLI stack manager
//!
//! Shells out to `docker` for registry sessions and `docker stack` commands.
//! Every endpoint gets its own `--config` directory so registry credentials
//! never leak from one endpoint's session into another's.

use crate::error::StackError;
use crate::file::FileService;
use crate::store::{DockerHub, Endpoint, Registry, Stack};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Operations needed to deploy and remove stacks on an endpoint
#[async_trait]
pub trait StackManager: Send + Sync {
    /// Log in to every authenticated registry, then DockerHub
    async fn login(
        &self,
        dockerhub: &DockerHub,
        registries: &[Registry],
        endpoint: &Endpoint,
    ) -> Result<(), StackError>;

    async fn logout(&self, endpoint: &Endpoint) -> Result<(), StackError>;

    async fn deploy(&self, stack: &Stack, endpoint: &Endpoint) -> Result<(), StackError>;

    async fn remove(&self, stack: &Stack, endpoint: &Endpoint) -> Result<(), StackError>;
}

/// [`StackManager`] backed by the docker binary
#[derive(Debug, Clone)]
pub struct DockerCliStackManager {
    binary: PathBuf,
    files: FileService,
}

impl DockerCliStackManager {
    /// `binary_dir` is the directory holding the `docker` executable
    pub fn new(binary_dir: impl AsRef<Path>, files: FileService) -> Self {
        let name = if cfg!(windows) { "docker.exe" } else { "docker" };
        Self {
            binary: binary_dir.as_ref().join(name),
            files,
        }
    }

    async fn command(&self, endpoint: &Endpoint) -> Result<Command, StackError> {
        let config_dir = self.files.docker_config_path(endpoint.id).await?;

        let mut command = Command::new(&self.binary);
        command
            .arg("--config")
            .arg(config_dir)
            .args(connection_args(endpoint))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(command)
    }
}

#[async_trait]
impl StackManager for DockerCliStackManager {
    #[instrument(skip_all, fields(endpoint_id = %endpoint.id))]
    async fn login(
        &self,
        dockerhub: &DockerHub,
        registries: &[Registry],
        endpoint: &Endpoint,
    ) -> Result<(), StackError> {
        for registry in registries.iter().filter(|r| r.authentication) {
            debug!(registry = %registry.url, "Logging in to registry");
            let mut command = self.command(endpoint).await?;
            command
                .args(["login", "--username", registry.username.as_str(), "--password-stdin"])
                .arg(&registry.url);
            run(command, Some(registry.password.expose_secret())).await?;
        }

        if dockerhub.authentication {
            debug!("Logging in to DockerHub");
            let mut command = self.command(endpoint).await?;
            command.args(["login", "--username", dockerhub.username.as_str(), "--password-stdin"]);
            run(command, Some(dockerhub.password.expose_secret())).await?;
        }

        Ok(())
    }

    #[instrument(skip_all, fields(endpoint_id = %endpoint.id))]
    async fn logout(&self, endpoint: &Endpoint) -> Result<(), StackError> {
        let mut command = self.command(endpoint).await?;
        command.arg("logout");
        run(command, None).await
    }

    #[instrument(skip_all, fields(endpoint_id = %endpoint.id, stack = %stack.name))]
    async fn deploy(&self, stack: &Stack, endpoint: &Endpoint) -> Result<(), StackError> {
        let mut command = self.command(endpoint).await?;
        command
            .args(["stack", "deploy", "--with-registry-auth", "--compose-file"])
            .arg(stack.compose_file_path())
            .arg(&stack.name)
            .envs(stack.env.iter().map(|e| (&e.name, &e.value)));
        run(command, None).await
    }

    #[instrument(skip_all, fields(endpoint_id = %endpoint.id, stack = %stack.name))]
    async fn remove(&self, stack: &Stack, endpoint: &Endpoint) -> Result<(), StackError> {
        let mut command = self.command(endpoint).await?;
        command.args(["stack", "rm"]).arg(&stack.name);
        run(command, None).await
    }
}

/// `-H` and TLS flags for an endpoint
fn connection_args(endpoint: &Endpoint) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-H".into(), endpoint.url.clone().into()];

    let tls = &endpoint.tls_config;
    if tls.tls {
        args.push("--tls".into());

        if !tls.tls_skip_verify {
            args.push("--tlsverify".into());
            if let Some(ca) = &tls.tls_ca_cert_path {
                args.push("--tlscacert".into());
                args.push(ca.clone().into_os_string());
            }
        }

        if let (Some(cert), Some(key)) = (&tls.tls_cert_path, &tls.tls_key_path) {
            args.push("--tlscert".into());
            args.push(cert.clone().into_os_string());
            args.push("--tlskey".into());
            args.push(key.clone().into_os_string());
        }
    }

    args
}

/// Run to completion; a failed command's stderr becomes the error message
async fn run(mut command: Command, stdin: Option<&str>) -> Result<(), StackError> {
    if stdin.is_some() {
        command.stdin(Stdio::piped());
    }

    let mut child = command.spawn()?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes()).await?;
        // Closing stdin ends the password read
        drop(pipe);
    }

    let output = child.wait_with_output().await?;
    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(status = %output.status, stderr, "Docker command failed");
        Err(StackError::Command(stderr))
    }
}
