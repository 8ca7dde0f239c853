use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use chorus_notification::config::AppConfig;
use chorus_notification::models::{NewNotification, NotificationRow};
use chorus_notification::routes;
use chorus_notification::services::{MemoryNotificationStore, NotificationStore};
use chorus_notification::AppState;
use chorus_shared::types::auth::{Claims, UserRole};

const SECRET: &str = "integration-test-secret";

struct TestApp {
    router: Router,
    store: Arc<MemoryNotificationStore>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_store(MemoryNotificationStore::default())
    }

    fn with_store(store: MemoryNotificationStore) -> Self {
        let store = Arc::new(store);
        let config = AppConfig {
            jwt_secret: SECRET.to_string(),
            events_enabled: false,
            ..AppConfig::default()
        };
        let state = AppState::new(config, store.clone());
        Self {
            router: routes::router(Arc::new(state)),
            store,
        }
    }

    async fn request(&self, method: Method, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token)).await
    }

    fn seed(&self, draft: NewNotification) -> Uuid {
        self.store.create(draft).unwrap().id
    }
}

fn token_for(user_id: Uuid, role: UserRole) -> String {
    let claims = Claims::new(user_id, role, 3600);
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn message(user_id: Uuid, conversation_id: &str) -> NewNotification {
    NewNotification::new(user_id, "message", "New message", "hi")
        .with_category("messages")
        .with_data(json!({ "conversation_id": conversation_id }))
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.request(Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "chorus-notification");
}

#[tokio::test]
async fn responses_are_gzipped_on_request() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/health")
        .header("Accept-Encoding", "gzip")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-encoding"], "gzip");
}

#[tokio::test]
async fn notifications_require_a_token() {
    let app = TestApp::new();

    let (status, body) = app.request(Method::GET, "/notifications", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "E0004");

    let (status, body) = app.get("/notifications", "garbage").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "E1005");
}

#[tokio::test]
async fn lists_only_the_callers_notifications() {
    let app = TestApp::new();
    let user = Uuid::now_v7();
    let other = Uuid::now_v7();
    app.seed(message(user, "c1"));
    app.seed(message(user, "c2"));
    app.seed(message(other, "c1"));

    let (status, body) = app.get("/notifications?per_page=1", &token_for(user, UserRole::User)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"]["items"][0]["type"], "message");
    assert_eq!(body["data"]["items"][0]["user_id"], user.to_string());
}

#[tokio::test]
async fn groups_the_fetched_page() {
    let app = TestApp::new();
    let user = Uuid::now_v7();
    app.seed(message(user, "c1"));
    app.seed(message(user, "c1"));
    app.seed(message(user, "c2"));
    app.seed(
        NewNotification::new(user, "like", "New like", "liked")
            .with_category("social")
            .with_data(json!({ "target_id": "p1" })),
    );
    app.seed(NewNotification::new(user, "custom_event", "Custom", "one"));
    app.seed(NewNotification::new(user, "custom_event", "Custom", "two"));

    let (status, body) = app.get("/notifications/grouped", &token_for(user, UserRole::User)).await;
    assert_eq!(status, StatusCode::OK);

    let groups = body["data"]["groups"].as_array().unwrap();
    let find = |key: &str| groups.iter().find(|g| g["id"] == key).unwrap();

    assert_eq!(groups.len(), 4);
    assert_eq!(find("message_c1")["notifications"].as_array().map(Vec::len), Some(2));
    assert_eq!(find("message_c1")["unread_count"], 2);
    assert_eq!(find("message_c2")["unread_count"], 1);
    assert_eq!(find("custom_event")["notifications"].as_array().map(Vec::len), Some(2));
    assert_eq!(find("like_p1")["type"], "like");
    assert_eq!(body["data"]["unread_count"], 6);
    assert_eq!(body["data"]["total"], 6);
    // Last seeded group comes first.
    assert_eq!(groups[0]["id"], "custom_event");
}

#[tokio::test]
async fn grouping_respects_filters() {
    let app = TestApp::new();
    let user = Uuid::now_v7();
    app.seed(message(user, "c1"));
    app.seed(
        NewNotification::new(user, "follow", "New follower", "followed")
            .with_category("social"),
    );

    let token = token_for(user, UserRole::User);
    let (_, body) = app.get("/notifications/grouped?category=social", &token).await;
    let groups = body["data"]["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["id"], "follow_unknown");

    let (_, body) = app.get("/notifications/grouped?type=message", &token).await;
    assert_eq!(body["data"]["groups"][0]["id"], "message_c1");
}

#[tokio::test]
async fn empty_feed_groups_to_nothing() {
    let app = TestApp::new();
    let (status, body) = app
        .get("/notifications/grouped", &token_for(Uuid::now_v7(), UserRole::User))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["groups"], json!([]));
    assert_eq!(body["data"]["unread_count"], 0);
}

#[tokio::test]
async fn malformed_stored_row_fails_the_request() {
    let user = Uuid::now_v7();
    let app = TestApp::with_store(MemoryNotificationStore::with_rows(vec![NotificationRow {
        id: Uuid::now_v7(),
        user_id: user,
        notification_type: "message".into(),
        category: "messages".into(),
        title: "t".into(),
        body: "b".into(),
        data: Some(json!(["not", "an", "object"])),
        is_read: false,
        created_at: Utc::now() - Duration::minutes(1),
    }]));

    let (status, body) = app.get("/notifications/grouped", &token_for(user, UserRole::User)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "E5002");
}

#[tokio::test]
async fn unreachable_pages_are_rejected() {
    let app = TestApp::new();
    let user = Uuid::now_v7();
    app.seed(message(user, "c1"));
    let token = token_for(user, UserRole::User);

    for page in ["500000000000000000", "18446744073709551615"] {
        let (status, body) = app.get(&format!("/notifications/grouped?page={page}"), &token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "page={page}");
        assert_eq!(body["error"]["code"], "E0002");

        let (status, _) = app.get(&format!("/notifications?page={page}"), &token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "page={page}");
    }

    let (status, body) = app.get("/notifications/grouped?page=2", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["groups"], json!([]));
}

#[tokio::test]
async fn only_admins_read_other_feeds() {
    let app = TestApp::new();
    let owner = Uuid::now_v7();
    app.seed(message(owner, "c1"));
    let uri = format!("/notifications/grouped?user_id={owner}");

    let (status, body) = app.get(&uri, &token_for(Uuid::now_v7(), UserRole::User)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "E0005");

    let (status, body) = app.get(&uri, &token_for(Uuid::now_v7(), UserRole::Admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["groups"][0]["user_id"], owner.to_string());
}

#[tokio::test]
async fn read_state_round_trip() {
    let app = TestApp::new();
    let user = Uuid::now_v7();
    let token = token_for(user, UserRole::User);
    let first = app.seed(message(user, "c1"));
    app.seed(message(user, "c1"));
    app.seed(
        NewNotification::new(user, "like", "New like", "liked")
            .with_category("social")
            .with_data(json!({ "target_id": "p1" })),
    );

    let (_, body) = app.get("/notifications/unread-count", &token).await;
    assert_eq!(body["data"]["count"], 3);

    let (status, body) = app
        .request(Method::POST, &format!("/notifications/{first}/read"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["read"], true);

    let (_, body) = app.get("/notifications/grouped", &token).await;
    let c1 = body["data"]["groups"]
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["id"] == "message_c1")
        .cloned()
        .unwrap();
    assert_eq!(c1["unread_count"], 1);

    let (_, body) = app
        .request(Method::POST, "/notifications/mark-all-read?category=social", Some(&token))
        .await;
    assert_eq!(body["data"]["updated"], 1);

    let (_, body) = app.get("/notifications/unread-count?category=messages", &token).await;
    assert_eq!(body["data"]["count"], 1);

    let (_, body) = app.request(Method::POST, "/notifications/mark-all-read", Some(&token)).await;
    assert_eq!(body["data"]["updated"], 1);
}

#[tokio::test]
async fn cannot_touch_someone_elses_notification() {
    let app = TestApp::new();
    let owner = Uuid::now_v7();
    let id = app.seed(message(owner, "c1"));
    let intruder = token_for(Uuid::now_v7(), UserRole::Admin);

    let (status, body) = app
        .request(Method::POST, &format!("/notifications/{id}/read"), Some(&intruder))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "E5001");

    let (status, _) = app
        .request(Method::DELETE, &format!("/notifications/{id}"), Some(&intruder))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_the_notification() {
    let app = TestApp::new();
    let user = Uuid::now_v7();
    let token = token_for(user, UserRole::User);
    let id = app.seed(message(user, "c1"));

    let (status, body) = app
        .request(Method::DELETE, &format!("/notifications/{id}"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id.to_string());

    let (_, body) = app.get("/notifications", &token).await;
    assert_eq!(body["data"]["total"], 0);
}
