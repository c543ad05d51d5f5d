//! Serialized stack deployment
//!
//! A deployment is login, deploy, logout. Two deployments on the same
//! endpoint must never interleave their registry sessions, so each endpoint
//! has a deployment lock; removals take a separate per-endpoint lock.

use crate::error::StackError;
use crate::stack::manager::StackManager;
use crate::store::{DockerHub, Endpoint, EndpointId, Registry, Stack};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

type EndpointLocks = DashMap<EndpointId, Arc<Mutex<()>>>;

pub struct StackDeployer {
    manager: Arc<dyn StackManager>,
    deploy_locks: EndpointLocks,
    removal_locks: EndpointLocks,
}

impl StackDeployer {
    pub fn new(manager: Arc<dyn StackManager>) -> Self {
        Self {
            manager,
            deploy_locks: DashMap::new(),
            removal_locks: DashMap::new(),
        }
    }

    /// Log in to `registries` and DockerHub, deploy `stack`, log out
    ///
    /// Logout runs even when the deployment fails; the deployment error wins.
    pub async fn deploy(
        &self,
        stack: &Stack,
        endpoint: &Endpoint,
        dockerhub: &DockerHub,
        registries: &[Registry],
    ) -> Result<(), StackError> {
        let lock = lock_for(&self.deploy_locks, endpoint.id);
        let _guard = lock.lock().await;

        self.manager.login(dockerhub, registries, endpoint).await?;

        let deployed = self.manager.deploy(stack, endpoint).await;
        let logged_out = self.manager.logout(endpoint).await;

        deployed?;
        if let Err(e) = &logged_out {
            warn!(endpoint_id = %endpoint.id, error = %e, "Registry logout failed after deployment");
        }
        logged_out?;

        info!(endpoint_id = %endpoint.id, stack = %stack.name, "Stack deployed");
        Ok(())
    }

    pub async fn remove(&self, stack: &Stack, endpoint: &Endpoint) -> Result<(), StackError> {
        let lock = lock_for(&self.removal_locks, endpoint.id);
        let _guard = lock.lock().await;

        self.manager.remove(stack, endpoint).await?;
        info!(endpoint_id = %endpoint.id, stack = %stack.name, "Stack removed");
        Ok(())
    }
}

fn lock_for(locks: &EndpointLocks, id: EndpointId) -> Arc<Mutex<()>> {
    Arc::clone(locks.entry(id).or_default().value())
}
