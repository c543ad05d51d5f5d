//! HTTP API tests
//!
//! Drives the full router with `oneshot`, backed by an in-memory store, a
//! temporary data directory and a recording stack manager.

use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use cloudware::error::StackError;
use cloudware::file::FileService;
use cloudware::proxy::{BodyLimits, ProxyManager};
use cloudware::security::{
    JwtService, MembershipId, MembershipRole, Team, TeamId, TeamMembership, TokenData, User,
    UserId, UserRole,
};
use cloudware::server::{AppState, ServerFlags, build_router};
use cloudware::stack::{StackDeployer, StackManager};
use cloudware::store::{
    DockerHub, DockerHubStore, Endpoint, EndpointId, EndpointStore, MemoryStore, Registry,
    RegistryId, ResourceControlStore, Stack, StackStore, TeamMembershipStore, UserStore,
};
use cloudware::util::SecretString;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SIGNING_SECRET: &str = "an-integration-test-signing-secret!!";
const ADMIN_PASSWORD: &str = "correct horse battery staple";

/// Stack manager that records calls instead of running docker
#[derive(Default)]
struct RecordingStackManager {
    calls: Mutex<Vec<String>>,
}

impl RecordingStackManager {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl StackManager for RecordingStackManager {
    async fn login(
        &self,
        _dockerhub: &DockerHub,
        registries: &[Registry],
        endpoint: &Endpoint,
    ) -> Result<(), StackError> {
        self.record(format!("login {} {}", endpoint.id, registries.len()));
        Ok(())
    }

    async fn logout(&self, endpoint: &Endpoint) -> Result<(), StackError> {
        self.record(format!("logout {}", endpoint.id));
        Ok(())
    }

    async fn deploy(&self, stack: &Stack, endpoint: &Endpoint) -> Result<(), StackError> {
        self.record(format!("deploy {} {}", stack.name, endpoint.id));
        Ok(())
    }

    async fn remove(&self, stack: &Stack, endpoint: &Endpoint) -> Result<(), StackError> {
        self.record(format!("remove {} {}", stack.name, endpoint.id));
        Ok(())
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    jwt: Arc<JwtService>,
    stacks: Arc<RecordingStackManager>,
    data: TempDir,
}

impl TestApp {
    async fn new(flags: ServerFlags) -> Self {
        let data = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        seed(&store);

        let jwt = Arc::new(JwtService::new(Some(&SecretString::new(SIGNING_SECRET)), 3600));
        let files = FileService::new(data.path()).await.unwrap();
        let proxies = Arc::new(ProxyManager::new(
            store.clone(),
            store.clone(),
            Duration::from_secs(2),
            BodyLimits {
                request: 1024 * 1024,
                response: 1024 * 1024,
            },
        ));
        let stacks = Arc::new(RecordingStackManager::default());
        let deployer = Arc::new(StackDeployer::new(stacks.clone()));

        let state = AppState::new(store.clone(), flags, jwt.clone(), files, proxies, deployer);

        Self {
            router: build_router(state),
            store,
            jwt,
            stacks,
            data,
        }
    }

    async fn default() -> Self {
        Self::new(ServerFlags {
            authentication: true,
            endpoint_management: true,
        })
        .await
    }

    fn token(&self, id: u32) -> String {
        let user = self.store.user(UserId(id)).unwrap();
        self.jwt
            .generate_token(&TokenData {
                id: user.id,
                username: user.username,
                role: user.role,
            })
            .unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(body) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&body).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Register an endpoint through the API as the administrator
    async fn create_endpoint(&self, url: &str) -> u64 {
        let admin = self.token(1);
        let (status, body) = self
            .send(
                Method::POST,
                "/api/endpoints",
                Some(&admin),
                Some(json!({ "Name": "local", "URL": url })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["Id"].as_u64().unwrap()
    }

    async fn authorize_alice(&self, endpoint: u64) {
        let admin = self.token(1);
        let (status, _) = self
            .send(
                Method::PUT,
                &format!("/api/endpoints/{endpoint}/access"),
                Some(&admin),
                Some(json!({ "AuthorizedUsers": [2] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
}

fn password_hash(password: &str) -> SecretString {
    let salt = SaltString::from_b64("c29tZXNhbHQ").unwrap();
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .unwrap();
    SecretString::new(hash.to_string())
}

/// admin (1), alice (2) in team 10, bob (3), a registry shared with team 10
fn seed(store: &MemoryStore) {
    let users = [
        ("admin", UserRole::Administrator),
        ("alice", UserRole::Standard),
        ("bob", UserRole::Standard),
    ];
    for (username, role) in users {
        let mut user = User {
            id: UserId(0),
            username: username.to_string(),
            password: password_hash(ADMIN_PASSWORD),
            role,
        };
        store.create_user(&mut user).unwrap();
    }

    store
        .add_team(Team {
            id: TeamId(10),
            name: "devs".to_string(),
        })
        .unwrap();
    store
        .add_team_membership(TeamMembership {
            id: MembershipId(0),
            user_id: UserId(2),
            team_id: TeamId(10),
            role: MembershipRole::Member,
        })
        .unwrap();
    store
        .add_registry(Registry {
            id: RegistryId(0),
            name: "internal".to_string(),
            url: "registry.internal:5000".to_string(),
            authentication: true,
            username: "deploy".to_string(),
            password: SecretString::new("registry-password"),
            authorized_users: vec![],
            authorized_teams: vec![TeamId(10)],
        })
        .unwrap();
}

#[tokio::test]
async fn test_status_is_public() {
    let app = TestApp::default().await;

    let (status, body) = app.send(Method::GET, "/api/status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Authentication"], true);
    assert_eq!(body["EndpointManagement"], true);
    assert_eq!(body["Version"], env!("CARGO_PKG_VERSION"));

    let (status, body) = app.send(Method::GET, "/api/settings/public", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_object());
}

#[tokio::test]
async fn test_missing_or_invalid_token_is_unauthenticated() {
    let app = TestApp::default().await;

    let (status, body) = app.send(Method::GET, "/api/endpoints", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["err"].is_string());

    let (status, _) = app
        .send(Method::GET, "/api/endpoints", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::GET, "/api/1/docker/containers/json", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_administrator_routes_reject_standard_users() {
    let app = TestApp::default().await;
    let alice = app.token(2);

    let (status, body) = app
        .send(Method::GET, "/api/settings", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["err"].is_string());

    let (status, _) = app
        .send(
            Method::POST,
            "/api/endpoints",
            Some(&alice),
            Some(json!({ "Name": "x", "URL": "tcp://10.0.0.1:2375" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.token(1);
    let (status, _) = app
        .send(Method::GET, "/api/settings", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_authentication_flow() {
    let app = TestApp::default().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth",
            None,
            Some(json!({ "Username": "admin", "Password": ADMIN_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let jwt = body["jwt"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(Method::GET, "/api/settings", Some(&jwt), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth",
            None,
            Some(json!({ "Username": "admin", "Password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth",
            None,
            Some(json!({ "Username": "nobody", "Password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::POST, "/api/auth", None, Some(json!({ "Username": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_disabled_authentication() {
    let app = TestApp::new(ServerFlags {
        authentication: false,
        endpoint_management: true,
    })
    .await;

    let (status, _) = app.send(Method::GET, "/api/settings", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth",
            None,
            Some(json!({ "Username": "admin", "Password": ADMIN_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["err"], "Authentication is disabled");
}

#[tokio::test]
async fn test_endpoint_management_disabled() {
    let app = TestApp::new(ServerFlags {
        authentication: true,
        endpoint_management: false,
    })
    .await;
    let admin = app.token(1);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/endpoints",
            Some(&admin),
            Some(json!({ "Name": "x", "URL": "tcp://10.0.0.1:2375" })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (_, body) = app.send(Method::GET, "/api/status", None, None).await;
    assert_eq!(body["EndpointManagement"], false);
}

#[tokio::test]
async fn test_endpoint_visibility_follows_authorization() {
    let app = TestApp::default().await;
    let alice = app.token(2);
    let endpoint = app.create_endpoint("tcp://10.0.0.1:2375").await;

    let (status, body) = app
        .send(Method::GET, "/api/endpoints", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    app.authorize_alice(endpoint).await;

    let (_, body) = app
        .send(Method::GET, "/api/endpoints", Some(&alice), None)
        .await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["Id"], endpoint);
}

#[tokio::test]
async fn test_endpoint_crud() {
    let app = TestApp::default().await;
    let admin = app.token(1);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/endpoints",
            Some(&admin),
            Some(json!({ "Name": "", "URL": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = app.create_endpoint("tcp://10.0.0.1:2375").await;

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/endpoints/{id}"),
            Some(&admin),
            Some(json!({ "Name": "renamed", "URL": "unix:///var/run/docker.sock" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Name"], "renamed");
    assert_eq!(body["URL"], "unix:///var/run/docker.sock");

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/endpoints/{id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::GET, &format!("/api/endpoints/{id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.store.endpoints().unwrap().is_empty());
}

#[tokio::test]
async fn test_docker_proxy_guards() {
    let app = TestApp::default().await;
    let alice = app.token(2);

    let (status, _) = app
        .send(Method::GET, "/api/abc/docker/containers/json", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::GET, "/api/42/docker/containers/json", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let endpoint = app.create_endpoint("tcp://10.0.0.1:2375").await;
    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/{endpoint}/docker/containers/json"),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["err"], "Access denied to endpoint");
}

#[tokio::test]
async fn test_docker_proxy_filters_engine_responses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.41/containers/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "Id": "c-alice", "Labels": {} },
            { "Id": "c-bob", "Labels": {} },
            { "Id": "c-shared", "Labels": {} },
        ])))
        .mount(&mock_server)
        .await;

    let app = TestApp::default().await;
    let alice = app.token(2);
    let bob = app.token(3);

    let endpoint = app
        .create_endpoint(&format!("tcp://{}", mock_server.address()))
        .await;
    app.authorize_alice(endpoint).await;

    // alice claims one container and shares another with her team
    for (resource, users, teams) in [("c-alice", json!([2]), json!([])), ("c-shared", json!([]), json!([10]))] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/resource_controls",
                Some(&alice),
                Some(json!({
                    "ResourceID": resource,
                    "Type": "container",
                    "Users": users,
                    "Teams": teams,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/{endpoint}/docker/v1.41/containers/json"),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["Id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["c-alice", "c-bob", "c-shared"]);

    // bob is not authorized on the endpoint at all
    let (status, _) = app
        .send(
            Method::GET,
            &format!("/api/{endpoint}/docker/v1.41/containers/json"),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.token(1);
    let (_, body) = app
        .send(
            Method::GET,
            &format!("/api/{endpoint}/docker/v1.41/containers/json"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(body[0]["Portainer"]["ResourceControl"]["ResourceId"], "c-alice");
}

#[tokio::test]
async fn test_resource_control_lifecycle() {
    let app = TestApp::default().await;
    let alice = app.token(2);
    let bob = app.token(3);

    let create = |resource: &str, kind: &str| {
        json!({ "ResourceID": resource, "Type": kind, "Users": [2] })
    };

    let (status, body) = app
        .send(
            Method::POST,
            "/api/resource_controls",
            Some(&alice),
            Some(create("vol-1", "volume")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["Id"].as_u64().unwrap();

    let (status, _) = app
        .send(
            Method::POST,
            "/api/resource_controls",
            Some(&alice),
            Some(create("vol-1", "volume")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/resource_controls",
            Some(&alice),
            Some(create("vol-2", "spaceship")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["err"], "Unsupported resource control type");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/resource_controls",
            Some(&alice),
            Some(json!({ "ResourceID": "vol-3", "Type": "volume" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // bob can neither take over nor delete alice's control
    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/resource_controls/{id}"),
            Some(&bob),
            Some(json!({ "Users": [3] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/resource_controls/{id}"),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/resource_controls/{id}"),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.store.resource_controls().unwrap().is_empty());
}

#[tokio::test]
async fn test_stack_lifecycle() {
    let app = TestApp::default().await;
    let admin = app.token(1);
    let alice = app.token(2);
    let endpoint = app.create_endpoint("tcp://10.0.0.1:2375").await;
    let stacks_uri = format!("/api/{endpoint}/stacks");

    let compose = "version: '3'\nservices:\n  web:\n    image: nginx\n";
    let (status, body) = app
        .send(
            Method::POST,
            &stacks_uri,
            Some(&admin),
            Some(json!({
                "Name": "web",
                "SwarmID": "swarm1",
                "StackFileContent": compose,
                "Env": [{ "name": "MODE", "value": "prod" }],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Id"], "web_swarm1");
    assert_eq!(
        app.stacks.calls(),
        vec![
            format!("login {endpoint} 1"),
            format!("deploy web {endpoint}"),
            format!("logout {endpoint}"),
        ]
    );

    let (status, _) = app
        .send(
            Method::POST,
            &stacks_uri,
            Some(&admin),
            Some(json!({ "Name": "WEB", "SwarmID": "swarm1", "StackFileContent": compose })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("{stacks_uri}/web_swarm1/stackfile"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["StackFileContent"], compose);

    // an administrators-only control hides the stack from alice
    let (status, _) = app
        .send(
            Method::POST,
            "/api/resource_controls",
            Some(&admin),
            Some(json!({ "ResourceID": "web", "Type": "stack", "AdministratorsOnly": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    app.authorize_alice(endpoint).await;

    let (_, body) = app
        .send(Method::GET, &stacks_uri, Some(&alice), None)
        .await;
    assert_eq!(body, json!([]));

    let (status, _) = app
        .send(
            Method::GET,
            &format!("{stacks_uri}/web_swarm1"),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app
        .send(Method::GET, &format!("{stacks_uri}?swarmId=swarm1"), Some(&admin), None)
        .await;
    assert_eq!(body[0]["Name"], "web");
    assert_eq!(body[0]["ResourceControl"]["AdministratorsOnly"], true);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("{stacks_uri}/web_swarm1"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.stacks.calls().contains(&format!("remove web {endpoint}")));
    assert!(app.store.stacks().unwrap().is_empty());
    assert!(app.store.resource_controls().unwrap().is_empty());
}

#[tokio::test]
async fn test_directory_listings_hide_secrets() {
    let app = TestApp::default().await;
    let alice = app.token(2);

    let (status, body) = app
        .send(Method::GET, "/api/users", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().unwrap();
    assert!(users.iter().all(|u| u.get("Password").is_none()));
    assert!(users.iter().all(|u| u["Username"] != "admin"));

    let (_, body) = app
        .send(Method::GET, "/api/teams", Some(&alice), None)
        .await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["Name"], "devs");

    let (status, body) = app
        .send(Method::GET, "/api/registries", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["URL"], "registry.internal:5000");
    assert!(body[0].get("Password").is_none());

    // bob is not in team 10
    let bob = app.token(3);
    let (_, body) = app
        .send(Method::GET, "/api/registries", Some(&bob), None)
        .await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_single_user_lookup() {
    let app = TestApp::default().await;
    let alice = app.token(2);
    let admin = app.token(1);

    let (status, body) = app
        .send(Method::GET, "/api/users/2", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Username"], "alice");

    let (status, _) = app
        .send(Method::GET, "/api/users/1", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::GET, "/api/users/3", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::GET, "/api/users/99", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_json_body() {
    let app = TestApp::default().await;
    let admin = app.token(1);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/endpoints")
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tls_upload() {
    let app = TestApp::default().await;
    let admin = app.token(1);

    let upload = |uri: &str, body: &'static str| {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {admin}"))
            .body(Body::from(body))
            .unwrap()
    };
    let pem = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

    let response = app
        .router
        .clone()
        .oneshot(upload("/api/upload/tls/ca?folder=1", pem))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stored = app.data.path().join("tls").join("1").join("ca.pem");
    assert_eq!(std::fs::read_to_string(stored).unwrap(), pem);

    let response = app
        .router
        .clone()
        .oneshot(upload("/api/upload/tls/bundle?folder=1", pem))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(upload("/api/upload/tls/ca", pem))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(upload("/api/upload/tls/ca?folder=..", pem))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sub_resources_cannot_be_claimed_twice() {
    let app = TestApp::default().await;
    let alice = app.token(2);
    let bob = app.token(3);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/resource_controls",
            Some(&alice),
            Some(json!({ "ResourceID": "c1", "Type": "container", "Users": [2] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    for stack in ["web", "web2"] {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/resource_controls",
                Some(&bob),
                Some(json!({
                    "ResourceID": stack,
                    "Type": "stack",
                    "Users": [3],
                    "SubResourceIDs": ["c1"],
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["err"], "A resource control is already applied on this resource");
    }

    let controls = app.store.resource_controls().unwrap();
    assert_eq!(controls.len(), 1);
    let owner = app.store.resource_control_by_resource_id("c1").unwrap();
    assert_eq!(owner.user_accesses[0].user_id, UserId(2));
}

#[tokio::test]
async fn test_rejected_tls_update_keeps_files() {
    let app = TestApp::default().await;
    let admin = app.token(1);
    let endpoint = app.create_endpoint("tcp://10.0.0.1:2376").await;
    let folder = app.data.path().join("tls").join(endpoint.to_string());

    for kind in ["ca", "cert", "key"] {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/upload/tls/{kind}?folder={endpoint}"))
            .header(header::AUTHORIZATION, format!("Bearer {admin}"))
            .body(Body::from("-----BEGIN GARBAGE-----\nAAAA\n-----END GARBAGE-----\n"))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let uri = format!("/api/endpoints/{endpoint}");
    let (status, _) = app
        .send(
            Method::PUT,
            &uri,
            Some(&admin),
            Some(json!({ "TLS": true, "TLSSkipVerify": true, "TLSSkipClientVerify": false })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(folder.join("ca.pem").exists());
    assert!(folder.join("cert.pem").exists());
    assert!(!app.store.endpoint(EndpointId(endpoint as u32)).unwrap().tls_config.tls);

    let (status, _) = app
        .send(
            Method::PUT,
            &uri,
            Some(&admin),
            Some(json!({ "TLS": true, "TLSSkipVerify": true, "TLSSkipClientVerify": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!folder.join("ca.pem").exists());
    assert!(!folder.join("key.pem").exists());

    let (status, _) = app
        .send(Method::PUT, &uri, Some(&admin), Some(json!({ "TLS": false })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!folder.exists());
}

#[tokio::test]
async fn test_user_creation_rules() {
    let app = TestApp::default().await;
    let admin = app.token(1);
    let alice = app.token(2);

    let user = |name: &str, role: &str| json!({ "Username": name, "Password": "pw", "Role": role });

    let (status, _) = app
        .send(Method::POST, "/api/users", Some(&alice), Some(user("carol", "standard")))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::POST, "/api/users", Some(&admin), Some(user("carol", "standard")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Id"], 4);

    let (status, _) = app
        .send(Method::POST, "/api/users", Some(&admin), Some(user("carol", "standard")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(Method::POST, "/api/users", Some(&admin), Some(user("ca rol", "standard")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth",
            None,
            Some(json!({ "Username": "carol", "Password": "pw" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["jwt"].is_string());

    // team leaders may create standard users only
    app.store
        .add_team_membership(TeamMembership {
            id: MembershipId(0),
            user_id: UserId(3),
            team_id: TeamId(10),
            role: MembershipRole::Leader,
        })
        .unwrap();
    let bob = app.token(3);

    let (status, _) = app
        .send(Method::POST, "/api/users", Some(&bob), Some(user("dave", "administrator")))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::POST, "/api/users", Some(&bob), Some(user("dave", "standard")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.user_by_username("dave").unwrap().role, UserRole::Standard);
}

#[tokio::test]
async fn test_user_update_and_password_check() {
    let app = TestApp::default().await;
    let alice = app.token(2);

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/users/2",
            Some(&alice),
            Some(json!({ "Password": "new secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("Password").is_none());

    let check = |password: &str| json!({ "Password": password });
    let (status, body) = app
        .send(Method::POST, "/api/users/2/passwd", Some(&alice), Some(check("new secret")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (_, body) = app
        .send(Method::POST, "/api/users/2/passwd", Some(&alice), Some(check(ADMIN_PASSWORD)))
        .await;
    assert_eq!(body["valid"], false);

    let (status, _) = app
        .send(Method::POST, "/api/users/3/passwd", Some(&alice), Some(check(ADMIN_PASSWORD)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/users/2",
            Some(&alice),
            Some(json!({ "Role": "administrator" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::PUT, "/api/users/3", Some(&alice), Some(json!({ "Password": "x" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::PUT, "/api/users/2", Some(&alice), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let admin = app.token(1);
    let (status, body) = app
        .send(
            Method::PUT,
            "/api/users/3",
            Some(&admin),
            Some(json!({ "Role": "administrator" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Role"], "administrator");

    let (status, _) = app
        .send(Method::PUT, "/api/users/99", Some(&admin), Some(json!({ "Password": "x" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_memberships_and_user_removal() {
    let app = TestApp::default().await;
    let admin = app.token(1);
    let alice = app.token(2);

    let (status, body) = app
        .send(Method::GET, "/api/users/2/memberships", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["TeamId"], 10);

    let (status, _) = app
        .send(Method::GET, "/api/users/3/memberships", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::DELETE, "/api/users/3", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::DELETE, "/api/users/1", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["err"], "Cannot remove the initial administrator");

    let (status, _) = app
        .send(Method::DELETE, "/api/users/2", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.store.user(UserId(2)).unwrap_err().is_not_found());
    assert!(app.store.memberships_by_user_id(UserId(2)).unwrap().is_empty());

    let (status, _) = app
        .send(Method::DELETE, "/api/users/99", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // a second administrator cannot remove their own account
    let (_, body) = app
        .send(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({ "Username": "root", "Password": "pw", "Role": "administrator" })),
        )
        .await;
    let root_id = body["Id"].as_u64().unwrap();
    let root = app.token(root_id as u32);
    let (status, _) = app
        .send(Method::DELETE, &format!("/api/users/{root_id}"), Some(&root), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_administrator_initialization() {
    let app = TestApp::default().await;

    let (status, _) = app
        .send(Method::GET, "/api/users/admin/check", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    app.store.delete_user(UserId(1)).unwrap();
    let (status, _) = app
        .send(Method::GET, "/api/users/admin/check", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/users/admin/init",
            None,
            Some(json!({ "Username": "root" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let init = json!({ "Username": "root", "Password": "s3cr3t" });
    let (status, body) = app
        .send(Method::POST, "/api/users/admin/init", None, Some(init.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Role"], "administrator");

    let (status, body) = app
        .send(Method::POST, "/api/users/admin/init", None, Some(init.clone()))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["err"], "Admin user already initialized");

    let (status, _) = app.send(Method::POST, "/api/auth", None, Some(init)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_dockerhub_credentials() {
    let app = TestApp::default().await;
    let admin = app.token(1);
    let alice = app.token(2);

    let (status, _) = app.send(Method::GET, "/api/dockerhub", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(Method::GET, "/api/dockerhub", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Authentication"], false);

    let credentials = json!({ "Authentication": true, "Username": "hub", "Password": "hub-pw" });
    let (status, _) = app
        .send(Method::PUT, "/api/dockerhub", Some(&alice), Some(credentials.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/dockerhub",
            Some(&admin),
            Some(json!({ "Authentication": true, "Username": "hub" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(Method::PUT, "/api/dockerhub", Some(&admin), Some(credentials))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("Password").is_none());
    let stored = app.store.dockerhub().unwrap();
    assert_eq!(stored.username, "hub");
    assert_eq!(stored.password.expose_secret(), "hub-pw");

    let (_, body) = app
        .send(Method::GET, "/api/dockerhub", Some(&alice), None)
        .await;
    assert_eq!(body["Username"], "hub");
    assert!(body.get("Password").is_none());

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/dockerhub",
            Some(&admin),
            Some(json!({ "Authentication": false, "Username": "ignored" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let stored = app.store.dockerhub().unwrap();
    assert!(!stored.authentication);
    assert!(stored.username.is_empty());
    assert!(stored.password.is_empty());
}
