use httpmock::Method::{DELETE, GET, PATCH, POST};
use httpmock::MockServer;
use serde_json::{json, Value};

use naya_relay::config::BackendConfig;
use naya_relay::error::NayaError;
use naya_relay::interfaces::auth::AuthProvider;
use naya_relay::interfaces::store::{Collection, ContentStore, ListQuery, Record};
use naya_relay::providers::{HostedAuthProvider, RestContentStore};

const SERVICE_KEY: &str = "service-role-key";

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn list_sends_filters_ordering_and_service_headers() {
    let server = MockServer::start_async().await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/announcements")
                .query_param("select", "*")
                .query_param("is_active", "eq.true")
                .query_param("order", "display_order.asc")
                .header("apikey", SERVICE_KEY)
                .header("authorization", "Bearer service-role-key");
            then.status(200).json_body(json!([
                {"id": "a1", "title": "Arrivage conteneur", "display_order": 1, "is_active": true},
                {"id": "a2", "title": "Nouvelle formation", "display_order": 2, "is_active": true}
            ]));
        })
        .await;

    let store = RestContentStore::new(format!("{}/", server.base_url()), SERVICE_KEY);
    let query = ListQuery::new().active_only().order_by("display_order", true);
    let rows = store.list(Collection::Announcements, &query).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["title"], "Arrivage conteneur");
    list.assert_calls(1);
}

#[tokio::test]
async fn create_update_delete_round_trip_through_rest_dialect() {
    let server = MockServer::start_async().await;
    let insert = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/user_roles")
                .header("prefer", "return=representation")
                .json_body(json!({"user_id": "u1", "role": "support"}));
            then.status(201)
                .json_body(json!([{"id": "r1", "user_id": "u1", "role": "support"}]));
        })
        .await;
    let patch = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/rest/v1/user_roles")
                .query_param("id", "eq.r1")
                .json_body(json!({"role": "admin"}));
            then.status(200)
                .json_body(json!([{"id": "r1", "user_id": "u1", "role": "admin"}]));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/rest/v1/user_roles")
                .query_param("id", "eq.r1");
            then.status(204);
        })
        .await;

    let store = RestContentStore::new(server.base_url(), SERVICE_KEY);
    let created = store
        .create(Collection::UserRoles, record(json!({"user_id": "u1", "role": "support"})))
        .await
        .unwrap();
    assert_eq!(created["id"], "r1");

    let updated = store
        .update(Collection::UserRoles, "r1", record(json!({"role": "admin"})))
        .await
        .unwrap();
    assert_eq!(updated["role"], "admin");

    store.delete(Collection::UserRoles, "r1").await.unwrap();
    insert.assert_calls(1);
    patch.assert_calls(1);
    delete.assert_calls(1);
}

#[tokio::test]
async fn get_returns_none_for_missing_row_and_errors_carry_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/promotions")
                .query_param("id", "eq.missing");
            then.status(200).json_body(json!([]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/rest/v1/media");
            then.status(401).json_body(json!({"message": "Invalid API key"}));
        })
        .await;

    let store = RestContentStore::new(server.base_url(), SERVICE_KEY);
    assert_eq!(store.get(Collection::Promotions, "missing").await.unwrap(), None);

    let err = store
        .list(Collection::Media, &ListQuery::new())
        .await
        .unwrap_err();
    match err {
        NayaError::Http(message) => {
            assert!(message.contains("401"));
            assert!(message.contains("Invalid API key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn hosted_auth_resolves_tokens() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/auth/v1/user")
                .header("apikey", SERVICE_KEY)
                .header("authorization", "Bearer user-jwt");
            then.status(200)
                .json_body(json!({"id": "u-42", "email": "staff@flashtrade.test", "role": "authenticated"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/auth/v1/user")
                .header("authorization", "Bearer expired-jwt");
            then.status(401).json_body(json!({"msg": "invalid JWT"}));
        })
        .await;

    let auth = HostedAuthProvider::new(server.base_url(), SERVICE_KEY);
    let principal = auth.user_for_token("user-jwt").await.unwrap().unwrap();
    assert_eq!(principal.id, "u-42");
    assert_eq!(principal.email.as_deref(), Some("staff@flashtrade.test"));
    assert_eq!(auth.user_for_token("expired-jwt").await.unwrap(), None);
}

#[tokio::test]
async fn hosted_auth_lists_and_creates_users() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/auth/v1/admin/users")
                .header("authorization", "Bearer service-role-key");
            then.status(200).json_body(json!({
                "users": [
                    {"id": "u-1", "email": "Admin@FlashTrade.test"},
                    {"id": "u-2", "email": null}
                ]
            }));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/admin/users")
                .json_body(json!({
                    "email": "new@flashtrade.test",
                    "password": "secret123",
                    "email_confirm": true
                }));
            then.status(200)
                .json_body(json!({"id": "u-3", "email": "new@flashtrade.test"}));
        })
        .await;
    let duplicate = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/admin/users")
                .body_includes("taken@flashtrade.test");
            then.status(422).json_body(json!({
                "code": 422,
                "msg": "A user with this email address has already been registered"
            }));
        })
        .await;

    let auth = HostedAuthProvider::new(server.base_url(), SERVICE_KEY);
    let found = auth
        .find_user_by_email("admin@flashtrade.test")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, "u-1");
    assert_eq!(auth.find_user_by_email("nobody@flashtrade.test").await.unwrap(), None);

    let created = auth.create_user("new@flashtrade.test", "secret123").await.unwrap();
    assert_eq!(created.id, "u-3");
    create.assert_calls(1);

    let err = auth
        .create_user("taken@flashtrade.test", "secret123")
        .await
        .unwrap_err();
    assert_eq!(
        err.detail(),
        "A user with this email address has already been registered"
    );
    duplicate.assert_calls(1);
}

#[test]
fn providers_need_the_service_key_variable() {
    let mut backend = BackendConfig::new("http://127.0.0.1:54321");
    backend.service_key_env = "NAYA_CONTENT_TEST_UNSET_SERVICE_KEY".to_string();
    std::env::remove_var("NAYA_CONTENT_TEST_UNSET_SERVICE_KEY");
    assert!(matches!(
        RestContentStore::from_backend(&backend),
        Err(NayaError::Config(_))
    ));
    assert!(matches!(
        HostedAuthProvider::from_backend(&backend),
        Err(NayaError::Config(_))
    ));
}
