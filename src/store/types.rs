//! Persisted record types
//!
//! Endpoints, registries, settings and stacks as they are kept in the store
//! snapshot and rendered by the API.

use crate::security::{TeamId, UserId};
use crate::util::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Endpoint identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(pub u32);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EndpointId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(EndpointId)
    }
}

/// Registry identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryId(pub u32);

/// TLS settings of an endpoint
///
/// Certificate paths are only meaningful when `tls` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfiguration {
    #[serde(rename = "TLS", default)]
    pub tls: bool,
    #[serde(rename = "TLSSkipVerify", default)]
    pub tls_skip_verify: bool,
    #[serde(rename = "TLSCACert", default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert_path: Option<PathBuf>,
    #[serde(rename = "TLSCert", default, skip_serializing_if = "Option::is_none")]
    pub tls_cert_path: Option<PathBuf>,
    #[serde(rename = "TLSKey", default, skip_serializing_if = "Option::is_none")]
    pub tls_key_path: Option<PathBuf>,
}

/// A registered engine API instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "Id")]
    pub id: EndpointId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "PublicURL", default)]
    pub public_url: String,
    #[serde(rename = "TLSConfig", default)]
    pub tls_config: TlsConfiguration,
    #[serde(rename = "AuthorizedUsers", default)]
    pub authorized_users: Vec<UserId>,
    #[serde(rename = "AuthorizedTeams", default)]
    pub authorized_teams: Vec<TeamId>,
}

/// A private registry that stack deployments may log in to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Registry {
    #[serde(rename = "Id")]
    pub id: RegistryId,
    pub name: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(default)]
    pub authentication: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: SecretString,
    #[serde(default)]
    pub authorized_users: Vec<UserId>,
    #[serde(default)]
    pub authorized_teams: Vec<TeamId>,
}

/// DockerHub credentials used for every deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DockerHub {
    #[serde(default)]
    pub authentication: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: SecretString,
}

/// A `name=value` label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPair {
    pub name: String,
    pub value: String,
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    #[serde(rename = "LogoURL", default)]
    pub logo_url: String,
    #[serde(default)]
    pub black_listed_labels: Vec<LabelPair>,
    #[serde(default = "default_true")]
    pub allow_bind_mounts_for_regular_users: bool,
    #[serde(default = "default_true")]
    pub allow_privileged_mode_for_regular_users: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logo_url: String::new(),
            black_listed_labels: Vec::new(),
            allow_bind_mounts_for_regular_users: true,
            allow_privileged_mode_for_regular_users: true,
        }
    }
}

/// Subset of settings readable without authentication
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicSettings {
    #[serde(rename = "LogoURL")]
    pub logo_url: String,
    pub allow_bind_mounts_for_regular_users: bool,
    pub allow_privileged_mode_for_regular_users: bool,
}

impl From<&Settings> for PublicSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            logo_url: settings.logo_url.clone(),
            allow_bind_mounts_for_regular_users: settings.allow_bind_mounts_for_regular_users,
            allow_privileged_mode_for_regular_users: settings
                .allow_privileged_mode_for_regular_users,
        }
    }
}

/// Environment variable passed to `docker stack deploy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvPair {
    pub name: String,
    pub value: String,
}

/// A compose stack deployed to a swarm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    /// `<name>_<swarmId>`
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "EndpointId")]
    pub endpoint_id: EndpointId,
    #[serde(rename = "SwarmId")]
    pub swarm_id: String,
    #[serde(rename = "EntryPoint")]
    pub entry_point: String,
    #[serde(rename = "Env", default)]
    pub env: Vec<EnvPair>,
    #[serde(rename = "ProjectPath")]
    pub project_path: PathBuf,
}

impl Stack {
    pub fn make_id(name: &str, swarm_id: &str) -> String {
        format!("{}_{}", name, swarm_id)
    }

    /// Path of the compose file inside the project directory
    pub fn compose_file_path(&self) -> PathBuf {
        self.project_path.join(&self.entry_point)
    }
}
