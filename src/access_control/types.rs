//! Access control types
//!
//! Resource controls are the persisted ownership records consulted by the
//! engine when filtering or checking proxied resources.

use crate::security::{TeamId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource control identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceControlId(pub u32);

impl fmt::Display for ResourceControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of resource a control guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceControlType {
    Container,
    Service,
    Volume,
    Network,
    Secret,
    Stack,
    Config,
}

impl ResourceControlType {
    /// Get the type name as a string
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceControlType::Container => "container",
            ResourceControlType::Service => "service",
            ResourceControlType::Volume => "volume",
            ResourceControlType::Network => "network",
            ResourceControlType::Secret => "secret",
            ResourceControlType::Stack => "stack",
            ResourceControlType::Config => "config",
        }
    }

    /// Try to parse a type from a string
    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "container" => Some(ResourceControlType::Container),
            "service" => Some(ResourceControlType::Service),
            "volume" => Some(ResourceControlType::Volume),
            "network" => Some(ResourceControlType::Network),
            "secret" => Some(ResourceControlType::Secret),
            "stack" => Some(ResourceControlType::Stack),
            "config" => Some(ResourceControlType::Config),
            _ => None,
        }
    }

    /// Get all types
    pub fn all() -> &'static [ResourceControlType] {
        &[
            ResourceControlType::Container,
            ResourceControlType::Service,
            ResourceControlType::Volume,
            ResourceControlType::Network,
            ResourceControlType::Secret,
            ResourceControlType::Stack,
            ResourceControlType::Config,
        ]
    }
}

impl fmt::Display for ResourceControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Access level carried by a grant
///
/// Only one level exists today; a grant either exists or it does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    ReadWrite,
}

/// Grant for a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserResourceAccess {
    #[serde(rename = "UserId")]
    pub user_id: UserId,
    pub access_level: AccessLevel,
}

/// Grant for every member of a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TeamResourceAccess {
    #[serde(rename = "TeamId")]
    pub team_id: TeamId,
    pub access_level: AccessLevel,
}

/// Ownership record bound to one resource and its sub-resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceControl {
    #[serde(rename = "Id")]
    pub id: ResourceControlId,
    #[serde(rename = "ResourceId")]
    pub resource_id: String,
    #[serde(rename = "SubResourceIds", default)]
    pub sub_resource_ids: Vec<String>,
    #[serde(rename = "Type")]
    pub control_type: ResourceControlType,
    #[serde(default)]
    pub administrators_only: bool,
    #[serde(default)]
    pub user_accesses: Vec<UserResourceAccess>,
    #[serde(default)]
    pub team_accesses: Vec<TeamResourceAccess>,
}

impl ResourceControl {
    /// Build a control granting read-write access to `users` and `teams`
    pub fn new(
        resource_id: impl Into<String>,
        control_type: ResourceControlType,
        users: &[UserId],
        teams: &[TeamId],
    ) -> Self {
        Self {
            id: ResourceControlId(0),
            resource_id: resource_id.into(),
            sub_resource_ids: Vec::new(),
            control_type,
            administrators_only: false,
            user_accesses: users
                .iter()
                .map(|&user_id| UserResourceAccess {
                    user_id,
                    access_level: AccessLevel::ReadWrite,
                })
                .collect(),
            team_accesses: teams
                .iter()
                .map(|&team_id| TeamResourceAccess {
                    team_id,
                    access_level: AccessLevel::ReadWrite,
                })
                .collect(),
        }
    }

    /// Replace both grant sets
    pub fn set_grants(&mut self, users: &[UserId], teams: &[TeamId]) {
        let replacement = ResourceControl::new("", self.control_type, users, teams);
        self.user_accesses = replacement.user_accesses;
        self.team_accesses = replacement.team_accesses;
    }

    /// Whether `id` is the primary identifier or one of the sub-resource identifiers
    pub fn matches(&self, id: &str) -> bool {
        self.resource_id == id || self.sub_resource_ids.iter().any(|s| s == id)
    }

    /// Primary identifier followed by the sub-resource identifiers
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.resource_id.as_str())
            .chain(self.sub_resource_ids.iter().map(String::as_str))
    }

    /// Whether both controls claim at least one common identifier
    pub fn overlaps(&self, other: &ResourceControl) -> bool {
        other.identifiers().any(|id| self.matches(id))
    }

    pub fn grants_user(&self, user: UserId) -> bool {
        self.user_accesses.iter().any(|a| a.user_id == user)
    }

    pub fn grants_team(&self, team: TeamId) -> bool {
        self.team_accesses.iter().any(|a| a.team_id == team)
    }
}
