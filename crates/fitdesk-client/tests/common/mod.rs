//! Shared fixtures for the gateway integration tests

#![allow(dead_code, clippy::unwrap_used)]

use fitdesk_client::{ApiClient, RecordingNavigator};
use fitdesk_core::{ApiConfig, UnauthorizedPolicy};
use fitdesk_storage::CredentialStore;
use serde_json::{Value, json};
use std::sync::{Arc, Once};
use wiremock::MockServer;

static INIT_LOGGER: Once = Once::new();

/// Initialize test logging (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

/// Mock server plus a client wired to it
pub struct Harness {
    pub server: MockServer,
    pub store: CredentialStore,
    pub navigator: Arc<RecordingNavigator>,
    pub client: ApiClient,
}

/// Start a mock server and build a client against `<server>/api`
pub async fn harness(policy: UnauthorizedPolicy) -> Harness {
    init_test_logging();
    let server = MockServer::start().await;
    let mut config = ApiConfig::with_base_url(format!("{}/api", server.uri()));
    config.unauthorized_policy = policy;
    harness_with(server, config)
}

/// Build a client for `server` with an explicit configuration
pub fn harness_with(server: MockServer, config: ApiConfig) -> Harness {
    let store = CredentialStore::in_memory();
    let navigator = Arc::new(RecordingNavigator::new());
    let client = ApiClient::new(&config, store.clone(), navigator.clone()).unwrap();
    Harness {
        server,
        store,
        navigator,
        client,
    }
}

/// Wire representation of a user
pub fn user_json(id: &str) -> Value {
    json!({
        "id": id,
        "email": format!("user{id}@fitdesk.test"),
        "firstName": "Ada",
        "lastName": "Lovelace",
        "role": "trainer",
        "createdAt": "2024-01-15T10:30:00Z"
    })
}

/// Authorization header of every request the server has seen, in order
pub async fn authorization_headers(server: &MockServer) -> Vec<Option<String>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| {
            request
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        })
        .collect()
}
