//! Auth and user services against a mock API server

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use common::{harness, user_json};
use fitdesk_client::{AuthService, UserService};
use fitdesk_core::{
    CreateUserData, LoginCredentials, QueryParams, RegisterData, SortOrder, UnauthorizedPolicy,
    UpdateUserData,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{any, body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_login_persists_session() {
    let h = harness(UnauthorizedPolicy::Redirect).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "email": "ada@fitdesk.test", "password": "s3cret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "access-1",
            "refreshToken": "refresh-1",
            "user": user_json("1")
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let auth = AuthService::new(h.client.clone());
    let response = auth
        .login(&LoginCredentials::new("ada@fitdesk.test", "s3cret"))
        .await
        .unwrap();

    assert_eq!(response.user.id, "1");
    assert_eq!(h.store.access_token().as_deref(), Some("access-1"));
    assert_eq!(h.store.refresh_token().as_deref(), Some("refresh-1"));
    assert_eq!(h.store.cached_user(), Some(response.user));
    assert!(auth.has_token());
}

#[tokio::test]
async fn test_failed_login_stores_nothing() {
    let h = harness(UnauthorizedPolicy::Redirect).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "Invalid email or password",
            "code": "INVALID_CREDENTIALS"
        })))
        .mount(&h.server)
        .await;

    let auth = AuthService::new(h.client.clone());
    let error = auth
        .login(&LoginCredentials::new("ada@fitdesk.test", "wrong"))
        .await
        .unwrap_err();

    assert_eq!(error.message, "Invalid email or password");
    assert!(h.store.access_token().is_none());
    assert!(h.store.cached_user().is_none());
}

#[tokio::test]
async fn test_logout_clears_local_state_even_when_server_fails() {
    let h = harness(UnauthorizedPolicy::Redirect).await;
    h.store.set_access_token("access").unwrap();
    h.store.set_refresh_token("refresh").unwrap();
    h.store
        .set_cached_user(&serde_json::from_value(user_json("1")).unwrap())
        .unwrap();
    h.store.set_theme("dark").unwrap();

    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;

    AuthService::new(h.client.clone()).logout().await;

    assert!(h.store.access_token().is_none());
    assert!(h.store.refresh_token().is_none());
    assert!(h.store.cached_user().is_none());
    assert_eq!(h.store.theme(), "light");
    assert_eq!(h.navigator.count(), 0);
}

#[tokio::test]
async fn test_logout_accepts_json_acknowledgement() {
    let h = harness(UnauthorizedPolicy::Redirect).await;
    h.store.set_access_token("access").unwrap();
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&h.server)
        .await;

    AuthService::new(h.client.clone()).logout().await;
    assert!(h.store.access_token().is_none());
}

#[tokio::test]
async fn test_refresh_without_token_makes_no_request() {
    let h = harness(UnauthorizedPolicy::Redirect).await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let error = AuthService::new(h.client.clone())
        .refresh_access_token()
        .await
        .unwrap_err();

    assert_eq!(error.code.as_deref(), Some("NO_REFRESH_TOKEN"));
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token_when_not_rotated() {
    let h = harness(UnauthorizedPolicy::Redirect).await;
    h.store.set_refresh_token("long-lived").unwrap();
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "access-2" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let response = AuthService::new(h.client.clone())
        .refresh_access_token()
        .await
        .unwrap();

    assert_eq!(response.token, "access-2");
    assert_eq!(h.store.access_token().as_deref(), Some("access-2"));
    assert_eq!(h.store.refresh_token().as_deref(), Some("long-lived"));
}

#[tokio::test]
async fn test_register_and_current_user() {
    let h = harness(UnauthorizedPolicy::Redirect).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(user_json("9")))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("9")))
        .expect(1)
        .mount(&h.server)
        .await;

    let auth = AuthService::new(h.client.clone());
    let registered = auth
        .register(&RegisterData {
            email: "user9@fitdesk.test".to_string(),
            password: "long-enough".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            role: None,
        })
        .await
        .unwrap();
    assert!(h.store.access_token().is_none());

    let me = auth.current_user().await.unwrap();
    assert_eq!(me, registered);
    assert_eq!(auth.cached_user(), Some(me));
}

#[tokio::test]
async fn test_user_crud_round() {
    let h = harness(UnauthorizedPolicy::Redirect).await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "10"))
        .and(query_param("sortBy", "lastName"))
        .and(query_param("sortOrder", "desc"))
        .and(query_param("role", "trainer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [user_json("1"), user_json("2")],
            "pagination": { "page": 1, "limit": 10, "total": 2, "totalPages": 1 }
        })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(user_json("3")))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/users/3"))
        .and(body_json(json!({ "firstName": "Grace" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("3")))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/users/3"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    let users = UserService::new(h.client.clone());

    let params = QueryParams::new()
        .page(1)
        .limit(10)
        .sort("lastName", SortOrder::Desc)
        .filter("role", "trainer");
    let page = users.list(&params).await.unwrap();
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.pagination.total_pages, 1);

    let created = users
        .create(&CreateUserData {
            email: "user3@fitdesk.test".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            role: Some("trainer".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(created.id, "3");

    let update = UpdateUserData {
        first_name: Some("Grace".to_string()),
        ..UpdateUserData::default()
    };
    users.update(&created.id, &update).await.unwrap();
    users.delete(&created.id).await.unwrap();
}

#[tokio::test]
async fn test_unknown_user_yields_server_message() {
    let h = harness(UnauthorizedPolicy::Redirect).await;
    Mock::given(method("GET"))
        .and(path("/api/users/404"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "message": "User not found", "code": "NOT_FOUND" })),
        )
        .mount(&h.server)
        .await;

    let error = UserService::new(h.client.clone())
        .get("404")
        .await
        .unwrap_err();
    assert_eq!(error.status(), Some(404));
    assert_eq!(error.message, "User not found");
    assert_eq!(error.code.as_deref(), Some("NOT_FOUND"));
}
