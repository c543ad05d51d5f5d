//! Persistence
//!
//! Each collection is exposed through its own trait so components only
//! depend on the capabilities they use, and tests can substitute fakes.
//! [`MemoryStore`] implements every trait.

mod memory;
mod types;

pub use memory::MemoryStore;
pub use types::{
    DockerHub, Endpoint, EndpointId, EnvPair, LabelPair, PublicSettings, Registry, RegistryId,
    Settings, Stack, TlsConfiguration,
};

use crate::access_control::{ResourceControl, ResourceControlId};
use crate::error::StoreResult;
use crate::security::{Team, TeamMembership, User, UserId};

/// Resource control persistence
pub trait ResourceControlStore: Send + Sync {
    fn resource_control(&self, id: ResourceControlId) -> StoreResult<ResourceControl>;

    /// Find the control whose primary or sub-resource identifiers include `resource_id`
    fn resource_control_by_resource_id(&self, resource_id: &str) -> StoreResult<ResourceControl>;

    fn resource_controls(&self) -> StoreResult<Vec<ResourceControl>>;

    /// Persist a new control; its identifier is assigned by the store
    fn create_resource_control(&self, control: &mut ResourceControl) -> StoreResult<()>;

    fn update_resource_control(
        &self,
        id: ResourceControlId,
        control: &ResourceControl,
    ) -> StoreResult<()>;

    fn delete_resource_control(&self, id: ResourceControlId) -> StoreResult<()>;
}

/// Endpoint persistence
pub trait EndpointStore: Send + Sync {
    fn endpoint(&self, id: EndpointId) -> StoreResult<Endpoint>;

    fn endpoints(&self) -> StoreResult<Vec<Endpoint>>;

    /// Persist a new endpoint; its identifier is assigned by the store
    fn create_endpoint(&self, endpoint: &mut Endpoint) -> StoreResult<()>;

    fn update_endpoint(&self, id: EndpointId, endpoint: &Endpoint) -> StoreResult<()>;

    fn delete_endpoint(&self, id: EndpointId) -> StoreResult<()>;
}

/// Team membership lookups
pub trait TeamMembershipStore: Send + Sync {
    fn memberships_by_user_id(&self, user_id: UserId) -> StoreResult<Vec<TeamMembership>>;

    fn delete_memberships_by_user_id(&self, user_id: UserId) -> StoreResult<()>;
}

/// User persistence
pub trait UserStore: Send + Sync {
    fn user(&self, id: UserId) -> StoreResult<User>;

    fn user_by_username(&self, username: &str) -> StoreResult<User>;

    fn users(&self) -> StoreResult<Vec<User>>;

    /// Persist a new user; its identifier is assigned by the store
    fn create_user(&self, user: &mut User) -> StoreResult<()>;

    fn update_user(&self, id: UserId, user: &User) -> StoreResult<()>;

    fn delete_user(&self, id: UserId) -> StoreResult<()>;
}

/// Team lookups
pub trait TeamStore: Send + Sync {
    fn teams(&self) -> StoreResult<Vec<Team>>;
}

/// Settings persistence
pub trait SettingsStore: Send + Sync {
    fn settings(&self) -> StoreResult<Settings>;

    fn store_settings(&self, settings: &Settings) -> StoreResult<()>;
}

/// Registry lookups
pub trait RegistryStore: Send + Sync {
    fn registries(&self) -> StoreResult<Vec<Registry>>;
}

/// DockerHub credentials
pub trait DockerHubStore: Send + Sync {
    fn dockerhub(&self) -> StoreResult<DockerHub>;

    fn store_dockerhub(&self, dockerhub: &DockerHub) -> StoreResult<()>;
}

/// Stack persistence
pub trait StackStore: Send + Sync {
    fn stack(&self, id: &str) -> StoreResult<Stack>;

    fn stacks(&self) -> StoreResult<Vec<Stack>>;

    fn stacks_by_swarm_id(&self, swarm_id: &str) -> StoreResult<Vec<Stack>>;

    fn create_stack(&self, stack: &Stack) -> StoreResult<()>;

    fn update_stack(&self, id: &str, stack: &Stack) -> StoreResult<()>;

    fn delete_stack(&self, id: &str) -> StoreResult<()>;
}
