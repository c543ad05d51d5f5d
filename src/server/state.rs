//! Shared handler state

use crate::file::FileService;
use crate::proxy::ProxyManager;
use crate::security::{JwtService, RequestBouncer};
use crate::stack::StackDeployer;
use crate::store::{
    DockerHubStore, EndpointStore, RegistryStore, ResourceControlStore, SettingsStore, StackStore,
    TeamMembershipStore, TeamStore, UserStore,
};
use std::sync::Arc;

/// Server-wide switches reported by `/api/status`
#[derive(Debug, Clone, Copy)]
pub struct ServerFlags {
    pub authentication: bool,
    pub endpoint_management: bool,
}

/// Everything a handler may need, cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub flags: ServerFlags,
    pub bouncer: RequestBouncer,
    pub jwt: Arc<JwtService>,
    pub users: Arc<dyn UserStore>,
    pub teams: Arc<dyn TeamStore>,
    pub memberships: Arc<dyn TeamMembershipStore>,
    pub endpoints: Arc<dyn EndpointStore>,
    pub resource_controls: Arc<dyn ResourceControlStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub registries: Arc<dyn RegistryStore>,
    pub dockerhub: Arc<dyn DockerHubStore>,
    pub stacks: Arc<dyn StackStore>,
    pub files: FileService,
    pub proxies: Arc<ProxyManager>,
    pub deployer: Arc<StackDeployer>,
}

/// Every store trait, implemented by one backing store
pub trait Store:
    UserStore
    + TeamStore
    + TeamMembershipStore
    + EndpointStore
    + ResourceControlStore
    + SettingsStore
    + RegistryStore
    + DockerHubStore
    + StackStore
{
}

impl<T> Store for T where
    T: UserStore
        + TeamStore
        + TeamMembershipStore
        + EndpointStore
        + ResourceControlStore
        + SettingsStore
        + RegistryStore
        + DockerHubStore
        + StackStore
{
}

impl AppState {
    /// Wire every store capability to `store`
    pub fn new<S: Store + 'static>(
        store: Arc<S>,
        flags: ServerFlags,
        jwt: Arc<JwtService>,
        files: FileService,
        proxies: Arc<ProxyManager>,
        deployer: Arc<StackDeployer>,
    ) -> Self {
        let bouncer = RequestBouncer::new(
            Arc::clone(&jwt),
            store.clone(),
            store.clone(),
            !flags.authentication,
        );

        Self {
            flags,
            bouncer,
            jwt,
            users: store.clone(),
            teams: store.clone(),
            memberships: store.clone(),
            endpoints: store.clone(),
            resource_controls: store.clone(),
            settings: store.clone(),
            registries: store.clone(),
            dockerhub: store.clone(),
            stacks: store,
            files,
            proxies,
            deployer,
        }
    }
}
