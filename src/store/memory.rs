//! In-memory store with JSON snapshots
//!
//! All collections live behind one lock. When opened on a data directory,
//! every write is followed by a snapshot to `cloudware.json`, written to a
//! temporary file first and renamed into place.

use crate::access_control::{ResourceControl, ResourceControlId};
use crate::error::{StoreError, StoreResult};
use crate::security::{MembershipId, Team, TeamMembership, User, UserId};
use crate::store::{
    DockerHub, DockerHubStore, Endpoint, EndpointId, EndpointStore, Registry, RegistryId,
    RegistryStore, ResourceControlStore, Settings, SettingsStore, Stack, StackStore,
    TeamMembershipStore, TeamStore, UserStore,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

/// Snapshot file name inside the data directory
pub const SNAPSHOT_FILE: &str = "cloudware.json";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Snapshot {
    users: Vec<User>,
    teams: Vec<Team>,
    team_memberships: Vec<TeamMembership>,
    endpoints: Vec<Endpoint>,
    resource_controls: Vec<ResourceControl>,
    registries: Vec<Registry>,
    dockerhub: DockerHub,
    settings: Settings,
    stacks: Vec<Stack>,
}

/// Store keeping every collection in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Snapshot>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create a store that is never written to disk
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the snapshot in `data_dir`, creating the directory if needed
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(SNAPSHOT_FILE);

        let snapshot = if path.exists() {
            let raw = fs::read(&path)?;
            let snapshot: Snapshot = serde_json::from_slice(&raw)?;
            info!(
                path = %path.display(),
                endpoints = snapshot.endpoints.len(),
                resource_controls = snapshot.resource_controls.len(),
                "Loaded store snapshot"
            );
            snapshot
        } else {
            debug!(path = %path.display(), "No store snapshot, starting empty");
            Snapshot::default()
        };

        Ok(Self {
            data: RwLock::new(snapshot),
            path: Some(path),
        })
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Snapshot>> {
        self.data.read().map_err(|_| StoreError::Poisoned)
    }

    /// Apply `f` under the write lock, then snapshot if it succeeded
    fn write<T>(&self, f: impl FnOnce(&mut Snapshot) -> StoreResult<T>) -> StoreResult<T> {
        let mut data = self.data.write().map_err(|_| StoreError::Poisoned)?;
        let value = f(&mut data)?;
        self.persist(&data)?;
        Ok(value)
    }

    fn persist(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Add a team; used for seeding
    pub fn add_team(&self, team: Team) -> StoreResult<()> {
        self.write(|data| {
            data.teams.push(team);
            Ok(())
        })
    }

    /// Add a team membership, assigning its identifier; used for seeding
    pub fn add_team_membership(&self, mut membership: TeamMembership) -> StoreResult<()> {
        self.write(|data| {
            membership.id = MembershipId(next_id(data.team_memberships.iter().map(|m| m.id.0)));
            data.team_memberships.push(membership);
            Ok(())
        })
    }

    /// Add a registry, assigning its identifier; used for seeding
    pub fn add_registry(&self, mut registry: Registry) -> StoreResult<()> {
        self.write(|data| {
            registry.id = RegistryId(next_id(data.registries.iter().map(|r| r.id.0)));
            data.registries.push(registry);
            Ok(())
        })
    }
}

fn next_id(ids: impl Iterator<Item = u32>) -> u32 {
    ids.max().unwrap_or(0) + 1
}

impl ResourceControlStore for MemoryStore {
    fn resource_control(&self, id: ResourceControlId) -> StoreResult<ResourceControl> {
        self.read()?
            .resource_controls
            .iter()
            .find(|rc| rc.id == id)
            .cloned()
            .ok_or(StoreError::not_found("Resource control"))
    }

    fn resource_control_by_resource_id(&self, resource_id: &str) -> StoreResult<ResourceControl> {
        let data = self.read()?;
        data.resource_controls
            .iter()
            .find(|rc| rc.resource_id == resource_id)
            .or_else(|| data.resource_controls.iter().find(|rc| rc.matches(resource_id)))
            .cloned()
            .ok_or(StoreError::not_found("Resource control"))
    }

    fn resource_controls(&self) -> StoreResult<Vec<ResourceControl>> {
        Ok(self.read()?.resource_controls.clone())
    }

    fn create_resource_control(&self, control: &mut ResourceControl) -> StoreResult<()> {
        self.write(|data| {
            // An identifier, primary or sub-resource, belongs to one control at most
            if data.resource_controls.iter().any(|rc| rc.overlaps(control)) {
                return Err(StoreError::AlreadyExists {
                    kind: "Resource control",
                });
            }
            control.id = ResourceControlId(next_id(data.resource_controls.iter().map(|rc| rc.id.0)));
            data.resource_controls.push(control.clone());
            Ok(())
        })
    }

    fn update_resource_control(
        &self,
        id: ResourceControlId,
        control: &ResourceControl,
    ) -> StoreResult<()> {
        self.write(|data| {
            let existing = data
                .resource_controls
                .iter_mut()
                .find(|rc| rc.id == id)
                .ok_or(StoreError::not_found("Resource control"))?;
            *existing = ResourceControl {
                id,
                ..control.clone()
            };
            Ok(())
        })
    }

    fn delete_resource_control(&self, id: ResourceControlId) -> StoreResult<()> {
        self.write(|data| {
            let before = data.resource_controls.len();
            data.resource_controls.retain(|rc| rc.id != id);
            if data.resource_controls.len() == before {
                return Err(StoreError::not_found("Resource control"));
            }
            Ok(())
        })
    }
}

impl EndpointStore for MemoryStore {
    fn endpoint(&self, id: EndpointId) -> StoreResult<Endpoint> {
        self.read()?
            .endpoints
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(StoreError::not_found("Endpoint"))
    }

    fn endpoints(&self) -> StoreResult<Vec<Endpoint>> {
        Ok(self.read()?.endpoints.clone())
    }

    fn create_endpoint(&self, endpoint: &mut Endpoint) -> StoreResult<()> {
        self.write(|data| {
            endpoint.id = EndpointId(next_id(data.endpoints.iter().map(|e| e.id.0)));
            data.endpoints.push(endpoint.clone());
            Ok(())
        })
    }

    fn update_endpoint(&self, id: EndpointId, endpoint: &Endpoint) -> StoreResult<()> {
        self.write(|data| {
            let existing = data
                .endpoints
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or(StoreError::not_found("Endpoint"))?;
            *existing = Endpoint {
                id,
                ..endpoint.clone()
            };
            Ok(())
        })
    }

    fn delete_endpoint(&self, id: EndpointId) -> StoreResult<()> {
        self.write(|data| {
            let before = data.endpoints.len();
            data.endpoints.retain(|e| e.id != id);
            if data.endpoints.len() == before {
                return Err(StoreError::not_found("Endpoint"));
            }
            Ok(())
        })
    }
}

impl TeamMembershipStore for MemoryStore {
    fn memberships_by_user_id(&self, user_id: UserId) -> StoreResult<Vec<TeamMembership>> {
        Ok(self
            .read()?
            .team_memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    fn delete_memberships_by_user_id(&self, user_id: UserId) -> StoreResult<()> {
        self.write(|data| {
            data.team_memberships.retain(|m| m.user_id != user_id);
            Ok(())
        })
    }
}

impl UserStore for MemoryStore {
    fn user(&self, id: UserId) -> StoreResult<User> {
        self.read()?
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(StoreError::not_found("User"))
    }

    fn user_by_username(&self, username: &str) -> StoreResult<User> {
        self.read()?
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::not_found("User"))
    }

    fn users(&self) -> StoreResult<Vec<User>> {
        Ok(self.read()?.users.clone())
    }

    fn create_user(&self, user: &mut User) -> StoreResult<()> {
        self.write(|data| {
            if data.users.iter().any(|u| u.username == user.username) {
                return Err(StoreError::AlreadyExists { kind: "User" });
            }
            user.id = UserId(next_id(data.users.iter().map(|u| u.id.0)));
            data.users.push(user.clone());
            Ok(())
        })
    }

    fn update_user(&self, id: UserId, user: &User) -> StoreResult<()> {
        self.write(|data| {
            let existing = data
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or(StoreError::not_found("User"))?;
            *existing = User {
                id,
                ..user.clone()
            };
            Ok(())
        })
    }

    fn delete_user(&self, id: UserId) -> StoreResult<()> {
        self.write(|data| {
            let before = data.users.len();
            data.users.retain(|u| u.id != id);
            if data.users.len() == before {
                return Err(StoreError::not_found("User"));
            }
            Ok(())
        })
    }
}

impl TeamStore for MemoryStore {
    fn teams(&self) -> StoreResult<Vec<Team>> {
        Ok(self.read()?.teams.clone())
    }
}

impl SettingsStore for MemoryStore {
    fn settings(&self) -> StoreResult<Settings> {
        Ok(self.read()?.settings.clone())
    }

    fn store_settings(&self, settings: &Settings) -> StoreResult<()> {
        self.write(|data| {
            data.settings = settings.clone();
            Ok(())
        })
    }
}

impl RegistryStore for MemoryStore {
    fn registries(&self) -> StoreResult<Vec<Registry>> {
        Ok(self.read()?.registries.clone())
    }
}

impl DockerHubStore for MemoryStore {
    fn dockerhub(&self) -> StoreResult<DockerHub> {
        Ok(self.read()?.dockerhub.clone())
    }

    fn store_dockerhub(&self, dockerhub: &DockerHub) -> StoreResult<()> {
        self.write(|data| {
            data.dockerhub = dockerhub.clone();
            Ok(())
        })
    }
}

impl StackStore for MemoryStore {
    fn stack(&self, id: &str) -> StoreResult<Stack> {
        self.read()?
            .stacks
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(StoreError::not_found("Stack"))
    }

    fn stacks(&self) -> StoreResult<Vec<Stack>> {
        Ok(self.read()?.stacks.clone())
    }

    fn stacks_by_swarm_id(&self, swarm_id: &str) -> StoreResult<Vec<Stack>> {
        Ok(self
            .read()?
            .stacks
            .iter()
            .filter(|s| s.swarm_id == swarm_id)
            .cloned()
            .collect())
    }

    fn create_stack(&self, stack: &Stack) -> StoreResult<()> {
        self.write(|data| {
            if data.stacks.iter().any(|s| s.id == stack.id) {
                return Err(StoreError::AlreadyExists { kind: "Stack" });
            }
            data.stacks.push(stack.clone());
            Ok(())
        })
    }

    fn update_stack(&self, id: &str, stack: &Stack) -> StoreResult<()> {
        self.write(|data| {
            let existing = data
                .stacks
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(StoreError::not_found("Stack"))?;
            *existing = stack.clone();
            Ok(())
        })
    }

    fn delete_stack(&self, id: &str) -> StoreResult<()> {
        self.write(|data| {
            let before = data.stacks.len();
            data.stacks.retain(|s| s.id != id);
            if data.stacks.len() == before {
                return Err(StoreError::not_found("Stack"));
            }
            Ok(())
        })
    }
}
