//! Identity types
//!
//! Users, teams and the per-request security contexts derived from them.

use crate::util::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// User identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

/// Team identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub u32);

/// Team membership identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Global role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Bypasses every ownership check
    Administrator,
    /// Subject to endpoint grants and resource controls
    Standard,
}

impl UserRole {
    pub const fn is_admin(&self) -> bool {
        matches!(self, UserRole::Administrator)
    }
}

/// Role of a user inside one team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Leader,
    Member,
}

/// Persisted user record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    #[serde(rename = "Id")]
    pub id: UserId,
    pub username: String,
    /// Argon2 PHC string; never rendered by the API
    #[serde(default, skip_serializing_if = "SecretString::is_empty")]
    pub password: SecretString,
    pub role: UserRole,
}

/// Persisted team record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Team {
    #[serde(rename = "Id")]
    pub id: TeamId,
    pub name: String,
}

/// Persisted link between a user and a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TeamMembership {
    #[serde(rename = "Id")]
    pub id: MembershipId,
    #[serde(rename = "UserId")]
    pub user_id: UserId,
    #[serde(rename = "TeamId")]
    pub team_id: TeamId,
    pub role: MembershipRole,
}

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub id: UserId,
    pub username: String,
    pub role: UserRole,
}

impl TokenData {
    /// Identity attached to requests when authentication is disabled
    pub fn auth_disabled() -> Self {
        Self {
            id: UserId(0),
            username: String::new(),
            role: UserRole::Administrator,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Identity enriched with a team-membership snapshot for one request
#[derive(Debug, Clone)]
pub struct RestrictedContext {
    pub is_admin: bool,
    pub is_team_leader: bool,
    pub user_id: UserId,
    pub user_memberships: Vec<TeamMembership>,
}

impl RestrictedContext {
    pub fn new(token: &TokenData, user_memberships: Vec<TeamMembership>) -> Self {
        let is_team_leader = user_memberships
            .iter()
            .any(|m| m.role == MembershipRole::Leader);

        Self {
            is_admin: token.is_admin(),
            is_team_leader,
            user_id: token.id,
            user_memberships,
        }
    }

    /// Team identifiers of every membership, in snapshot order
    pub fn team_ids(&self) -> Vec<TeamId> {
        self.user_memberships.iter().map(|m| m.team_id).collect()
    }

    /// Whether the user belongs to `team`
    pub fn is_member_of(&self, team: TeamId) -> bool {
        self.user_memberships.iter().any(|m| m.team_id == team)
    }

    /// Whether the user leads `team`
    pub fn is_leader_of(&self, team: TeamId) -> bool {
        self.user_memberships
            .iter()
            .any(|m| m.team_id == team && m.role == MembershipRole::Leader)
    }
}
