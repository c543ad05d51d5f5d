//! File storage
//!
//! TLS material, compose files and per-endpoint docker CLI configuration,
//! all kept under the data directory:
//!
//! ```text
//! <data>/tls/<folder>/{ca,cert,key}.pem
//! <data>/compose/<stack id>/<entry point>
//! <data>/docker_config/<endpoint id>/
//! ```

use crate::error::FileError;
use crate::store::EndpointId;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const TLS_DIRECTORY: &str = "tls";
const COMPOSE_DIRECTORY: &str = "compose";
const DOCKER_CONFIG_DIRECTORY: &str = "docker_config";

/// Default compose file name inside a stack project directory
pub const COMPOSE_FILE_NAME: &str = "docker-compose.yml";

/// Kind of TLS file stored for an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsFileKind {
    Ca,
    Cert,
    Key,
}

impl TlsFileKind {
    pub fn try_parse(s: &str) -> Result<Self, FileError> {
        match s {
            "ca" => Ok(TlsFileKind::Ca),
            "cert" => Ok(TlsFileKind::Cert),
            "key" => Ok(TlsFileKind::Key),
            other => Err(FileError::InvalidTlsFileKind(other.to_string())),
        }
    }

    pub const fn file_name(&self) -> &'static str {
        match self {
            TlsFileKind::Ca => "ca.pem",
            TlsFileKind::Cert => "cert.pem",
            TlsFileKind::Key => "key.pem",
        }
    }

    pub fn all() -> &'static [TlsFileKind] {
        &[TlsFileKind::Ca, TlsFileKind::Cert, TlsFileKind::Key]
    }
}

impl fmt::Display for TlsFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// File storage rooted at the data directory
#[derive(Debug, Clone)]
pub struct FileService {
    root: PathBuf,
}

impl FileService {
    /// Create the service, making sure its directories exist
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, FileError> {
        let root = root.into();
        for dir in [TLS_DIRECTORY, COMPOSE_DIRECTORY, DOCKER_CONFIG_DIRECTORY] {
            fs::create_dir_all(root.join(dir)).await?;
        }
        Ok(Self { root })
    }

    /// Where a TLS file for `folder` lives, whether or not it exists yet
    pub fn path_for_tls_file(&self, folder: &str, kind: TlsFileKind) -> Result<PathBuf, FileError> {
        validate_name(folder)?;
        Ok(self
            .root
            .join(TLS_DIRECTORY)
            .join(folder)
            .join(kind.file_name()))
    }

    pub async fn store_tls_file(
        &self,
        folder: &str,
        kind: TlsFileKind,
        data: &[u8],
    ) -> Result<PathBuf, FileError> {
        let path = self.path_for_tls_file(folder, kind)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        debug!(path = %path.display(), "Stored TLS file");
        Ok(path)
    }

    /// Remove one TLS file; a missing file is not an error
    pub async fn delete_tls_file(&self, folder: &str, kind: TlsFileKind) -> Result<(), FileError> {
        let path = self.path_for_tls_file(folder, kind)?;
        ignore_missing(fs::remove_file(&path).await)
    }

    /// Remove the whole TLS folder; a missing folder is not an error
    pub async fn delete_tls_files(&self, folder: &str) -> Result<(), FileError> {
        validate_name(folder)?;
        let path = self.root.join(TLS_DIRECTORY).join(folder);
        ignore_missing(fs::remove_dir_all(&path).await)
    }

    /// Project directory of a stack
    pub fn stack_project_path(&self, stack_id: &str) -> Result<PathBuf, FileError> {
        validate_name(stack_id)?;
        Ok(self.root.join(COMPOSE_DIRECTORY).join(stack_id))
    }

    /// Write the compose file of a stack, returning the project directory
    pub async fn store_stack_file(
        &self,
        stack_id: &str,
        entry_point: &str,
        content: &str,
    ) -> Result<PathBuf, FileError> {
        validate_name(entry_point)?;
        let project = self.stack_project_path(stack_id)?;
        fs::create_dir_all(&project).await?;
        fs::write(project.join(entry_point), content).await?;
        Ok(project)
    }

    pub async fn read_stack_file(&self, path: &Path) -> Result<String, FileError> {
        Ok(fs::read_to_string(path).await?)
    }

    /// Remove a stack project directory; a missing directory is not an error
    pub async fn remove_stack_project(&self, stack_id: &str) -> Result<(), FileError> {
        let project = self.stack_project_path(stack_id)?;
        ignore_missing(fs::remove_dir_all(&project).await)
    }

    /// Docker CLI configuration directory dedicated to an endpoint
    pub async fn docker_config_path(&self, endpoint_id: EndpointId) -> Result<PathBuf, FileError> {
        let path = self
            .root
            .join(DOCKER_CONFIG_DIRECTORY)
            .join(endpoint_id.to_string());
        fs::create_dir_all(&path).await?;
        Ok(path)
    }
}

fn ignore_missing(result: std::io::Result<()>) -> Result<(), FileError> {
    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => Ok(other?),
    }
}

/// Names become single path components; reject anything that could escape
fn validate_name(name: &str) -> Result<(), FileError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(FileError::InvalidName(name.to_string()))
    }
}
