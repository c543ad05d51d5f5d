//! Stack deployment serialization tests

use async_trait::async_trait;
use cloudware::error::StackError;
use cloudware::stack::{StackDeployer, StackManager};
use cloudware::store::{DockerHub, Endpoint, EndpointId, Registry, Stack, TlsConfiguration};
use futures::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tracks registry sessions per endpoint; overlapping sessions are a failure
#[derive(Default)]
struct SessionTracker {
    active: Mutex<HashMap<EndpointId, usize>>,
    max_overlap: AtomicUsize,
    events: Mutex<Vec<String>>,
    fail_deploy: bool,
}

impl SessionTracker {
    fn failing() -> Self {
        Self {
            fail_deploy: true,
            ..Self::default()
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl StackManager for SessionTracker {
    async fn login(
        &self,
        _dockerhub: &DockerHub,
        _registries: &[Registry],
        endpoint: &Endpoint,
    ) -> Result<(), StackError> {
        let overlap = {
            let mut active = self.active.lock().unwrap();
            let count = active.entry(endpoint.id).or_default();
            *count += 1;
            *count
        };
        self.max_overlap.fetch_max(overlap, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(format!("login {}", endpoint.id));
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(())
    }

    async fn logout(&self, endpoint: &Endpoint) -> Result<(), StackError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        *self
            .active
            .lock()
            .unwrap()
            .entry(endpoint.id)
            .or_default() -= 1;
        self.events
            .lock()
            .unwrap()
            .push(format!("logout {}", endpoint.id));
        Ok(())
    }

    async fn deploy(&self, stack: &Stack, _endpoint: &Endpoint) -> Result<(), StackError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.events
            .lock()
            .unwrap()
            .push(format!("deploy {}", stack.name));
        if self.fail_deploy {
            return Err(StackError::Command("yaml: line 3: mapping values are not allowed".into()));
        }
        Ok(())
    }

    async fn remove(&self, stack: &Stack, _endpoint: &Endpoint) -> Result<(), StackError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("remove {}", stack.name));
        Ok(())
    }
}

fn endpoint(id: u32) -> Endpoint {
    Endpoint {
        id: EndpointId(id),
        name: format!("endpoint-{id}"),
        url: "tcp://10.0.0.1:2375".to_string(),
        public_url: String::new(),
        tls_config: TlsConfiguration::default(),
        authorized_users: Vec::new(),
        authorized_teams: Vec::new(),
    }
}

fn stack(name: &str, endpoint_id: u32) -> Stack {
    Stack {
        id: Stack::make_id(name, "swarm1"),
        name: name.to_string(),
        endpoint_id: EndpointId(endpoint_id),
        swarm_id: "swarm1".to_string(),
        entry_point: "docker-compose.yml".to_string(),
        env: Vec::new(),
        project_path: PathBuf::from("/data/compose").join(name),
    }
}

#[tokio::test]
async fn test_deployments_on_one_endpoint_are_serialized() {
    let tracker = Arc::new(SessionTracker::default());
    let deployer = Arc::new(StackDeployer::new(tracker.clone()));
    let target = endpoint(1);
    let dockerhub = DockerHub::default();

    let deployments = (0..5).map(|i| {
        let deployer = Arc::clone(&deployer);
        let target = target.clone();
        let dockerhub = dockerhub.clone();
        tokio::spawn(async move {
            deployer
                .deploy(&stack(&format!("app{i}"), 1), &target, &dockerhub, &[])
                .await
        })
    });

    for result in join_all(deployments).await {
        result.unwrap().unwrap();
    }

    assert_eq!(tracker.max_overlap.load(Ordering::SeqCst), 1);

    // every session is login, deploy, logout with nothing in between
    let events = tracker.events();
    assert_eq!(events.len(), 15);
    for session in events.chunks(3) {
        assert_eq!(session[0], "login 1");
        assert!(session[1].starts_with("deploy app"));
        assert_eq!(session[2], "logout 1");
    }
}

#[tokio::test]
async fn test_different_endpoints_deploy_concurrently() {
    let tracker = Arc::new(SessionTracker::default());
    let deployer = StackDeployer::new(tracker.clone());
    let dockerhub = DockerHub::default();

    let first = endpoint(1);
    let second = endpoint(2);
    let web = stack("web", 1);
    let api = stack("api", 2);

    let (a, b) = tokio::join!(
        deployer.deploy(&web, &first, &dockerhub, &[]),
        deployer.deploy(&api, &second, &dockerhub, &[]),
    );
    a.unwrap();
    b.unwrap();

    // both sessions were open before either logged out
    let events = tracker.events();
    let logins = events
        .iter()
        .take_while(|e| e.starts_with("login"))
        .count();
    assert_eq!(logins, 2);
    assert_eq!(tracker.max_overlap.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_logout_runs_after_failed_deploy() {
    let tracker = Arc::new(SessionTracker::failing());
    let deployer = StackDeployer::new(tracker.clone());

    let err = deployer
        .deploy(&stack("web", 1), &endpoint(1), &DockerHub::default(), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, StackError::Command(msg) if msg.contains("mapping values")));
    assert_eq!(tracker.events(), vec!["login 1", "deploy web", "logout 1"]);
}

#[tokio::test]
async fn test_remove_delegates_to_manager() {
    let tracker = Arc::new(SessionTracker::default());
    let deployer = StackDeployer::new(tracker.clone());

    deployer.remove(&stack("web", 1), &endpoint(1)).await.unwrap();
    assert_eq!(tracker.events(), vec!["remove web"]);
}
