//! End-to-end command tests against a mock API and a file-backed session

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

use clap::Parser;
use fitdesk_cli::{AppContext, Cli, Output, execute};
use fitdesk_client::RecordingNavigator;
use fitdesk_core::{ApiConfig, Config, StorageBackendKind, StorageConfig};
use fitdesk_storage::CredentialStore;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, dir: &Path) -> Config {
    Config {
        api: ApiConfig::with_base_url(format!("{}/api", server.uri())),
        storage: StorageConfig {
            backend: StorageBackendKind::File,
            path: Some(dir.join("session.json")),
        },
        ..Config::default()
    }
}

/// A fresh context over the same session file, like a new invocation
fn invocation(server: &MockServer, dir: &Path) -> (AppContext, Arc<RecordingNavigator>) {
    let config = config_for(server, dir);
    let store = CredentialStore::open(&config.storage);
    let navigator = Arc::new(RecordingNavigator::new());
    let ctx = AppContext::with_parts(config, store, navigator.clone()).unwrap();
    (ctx, navigator)
}

async fn run(ctx: &AppContext, args: &[&str]) -> anyhow::Result<Output> {
    let cli = Cli::try_parse_from(std::iter::once("fitdesk").chain(args.iter().copied()))?;
    execute(ctx, cli.command).await
}

fn json_of(output: Output) -> Value {
    match output {
        Output::Json(value) => value,
        Output::Text(text) => panic!("expected JSON output, got {text}"),
    }
}

fn user_json(id: &str) -> Value {
    json!({
        "id": id,
        "email": format!("user{id}@fitdesk.test"),
        "firstName": "Grace",
        "lastName": "Hopper",
        "role": "trainer"
    })
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({
            "email": "grace@fitdesk.test",
            "password": "hunter22",
            "rememberMe": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "access-1",
            "refreshToken": "refresh-1",
            "user": user_json("7")
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_session_survives_into_next_invocation() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("7")))
        .expect(1)
        .mount(&server)
        .await;

    let (first, _) = invocation(&server, dir.path());
    let login = json_of(
        run(
            &first,
            &[
                "login",
                "--email",
                "grace@fitdesk.test",
                "--password",
                "hunter22",
                "--remember",
            ],
        )
        .await
        .unwrap(),
    );
    assert_eq!(login["authenticated"], json!(true));
    assert_eq!(login["user"]["id"], json!("7"));
    drop(first);

    let (second, navigator) = invocation(&server, dir.path());
    assert_eq!(second.store.access_token().as_deref(), Some("access-1"));
    let me = json_of(run(&second, &["whoami"]).await.unwrap());
    assert_eq!(me["email"], json!("user7@fitdesk.test"));
    assert_eq!(navigator.count(), 0);
}

#[tokio::test]
async fn test_invalid_login_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (ctx, _) = invocation(&server, dir.path());

    let err = run(
        &ctx,
        &["login", "--email", "not-an-email", "--password", "hunter22"],
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("email"), "unexpected error: {err}");
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(ctx.store.access_token().is_none());
}

#[tokio::test]
async fn test_whoami_without_session_makes_no_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (ctx, _) = invocation(&server, dir.path());

    let err = run(&ctx, &["whoami"]).await.unwrap_err();

    assert!(err.to_string().contains("Not signed in"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_logout_clears_session_file_even_when_server_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (ctx, _) = invocation(&server, dir.path());
    ctx.store.set_access_token("access-1").unwrap();
    ctx.store.set_refresh_token("refresh-1").unwrap();
    ctx.store.set_theme("dark").unwrap();

    let output = json_of(run(&ctx, &["logout"]).await.unwrap());
    assert_eq!(output, json!({ "authenticated": false }));

    let (next, _) = invocation(&server, dir.path());
    assert!(next.store.access_token().is_none());
    assert!(next.store.refresh_token().is_none());
}

#[tokio::test]
async fn test_expired_session_is_cleared_on_401() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Token expired" })),
        )
        .mount(&server)
        .await;

    let (ctx, navigator) = invocation(&server, dir.path());
    ctx.store.set_access_token("stale").unwrap();
    ctx.store.set_theme("dark").unwrap();

    let err = run(&ctx, &["users", "list"]).await.unwrap_err();

    assert_eq!(err.to_string(), "Token expired");
    assert_eq!(navigator.visits(), vec!["/login".to_string()]);
    let (next, _) = invocation(&server, dir.path());
    assert!(next.store.access_token().is_none());
    assert_eq!(next.store.theme(), "dark");
}

#[tokio::test]
async fn test_users_list_forwards_paging_and_filters() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(query_param("page", "2"))
        .and(query_param("search", "grace"))
        .and(query_param("role", "trainer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [user_json("1")],
            "pagination": { "page": 2, "limit": 10, "total": 11, "totalPages": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, _) = invocation(&server, dir.path());
    ctx.store.set_access_token("access-1").unwrap();

    let page = json_of(
        run(
            &ctx,
            &[
                "users", "list", "--page", "2", "--search", "grace", "-f", "role=trainer",
            ],
        )
        .await
        .unwrap(),
    );

    assert_eq!(page["pagination"]["totalPages"], json!(2));
    assert_eq!(page["data"][0]["id"], json!("1"));
}

#[tokio::test]
async fn test_users_update_requires_a_field() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (ctx, _) = invocation(&server, dir.path());

    let err = run(&ctx, &["users", "update", "7"]).await.unwrap_err();

    assert!(err.to_string().contains("Nothing to update"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_blank_user_id_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (ctx, _) = invocation(&server, dir.path());
    ctx.store.set_access_token("access-1").unwrap();

    for args in [
        &["users", "update", " ", "--role", "admin"][..],
        &["users", "delete", ""][..],
        &["users", "get", "  "][..],
    ] {
        let err = run(&ctx, args).await.unwrap_err();
        assert!(err.to_string().contains("must not be empty"), "{args:?}: {err}");
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_users_delete_reports_id() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("DELETE"))
        .and(path("/api/users/7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, _) = invocation(&server, dir.path());
    ctx.store.set_access_token("access-1").unwrap();

    let output = json_of(run(&ctx, &["users", "delete", "7"]).await.unwrap());
    assert_eq!(output, json!({ "deleted": "7" }));
}

#[tokio::test]
async fn test_theme_is_stored_without_network() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (ctx, _) = invocation(&server, dir.path());

    assert_eq!(
        json_of(run(&ctx, &["theme", "get"]).await.unwrap()),
        json!({ "theme": "light" })
    );
    assert_eq!(
        json_of(run(&ctx, &["theme", "set", "dark"]).await.unwrap()),
        json!({ "theme": "dark" })
    );

    let (next, _) = invocation(&server, dir.path());
    assert_eq!(next.store.theme(), "dark");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_config_show_renders_toml() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (ctx, _) = invocation(&server, dir.path());

    let Output::Text(rendered) = run(&ctx, &["config", "show"]).await.unwrap() else {
        panic!("expected text output");
    };

    let parsed: toml::Value = toml::from_str(&rendered).unwrap();
    assert_eq!(
        parsed["api"]["base_url"].as_str(),
        Some(format!("{}/api", server.uri()).as_str())
    );
}
