use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use agora_backend::{
    build_router,
    config::AppConfig,
    realtime::EventBus,
    store::MemoryStore,
    verify::StaticVerifier,
    AppState,
};

/// Test helper wrapping a fully-built router over the in-memory store.
/// Each TestApp has its own store, so no data leaks between tests.
pub struct TestApp {
    state: AppState,
    pub verifier: Arc<StaticVerifier>,
}

impl TestApp {
    pub async fn new() -> Self {
        let config = AppConfig::test_default();
        let store = Arc::new(MemoryStore::new());
        let events = EventBus::new(None);
        let verifier = Arc::new(StaticVerifier::new());

        let state = AppState::new(config, store, events, verifier.clone());
        state
            .directory
            .seed()
            .await
            .expect("Failed to seed community directory");

        TestApp { state, verifier }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    // ── Request helpers ──────────────────────────────────

    /// Send a request through the router and return (status, body as Value).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body_bytes = body
            .map(|v| serde_json::to_vec(&v).unwrap())
            .unwrap_or_default();

        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }

        if !body_bytes.is_empty() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }

        let req = builder.body(Body::from(body_bytes)).unwrap();

        let response = self.router().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).to_string(),
            ))
        };

        (status, value)
    }

    // ── High-level helpers ───────────────────────────────

    /// Register a verified identity and create its profile. The token is
    /// the uid with a "token-" prefix. Returns the token.
    pub async fn register_user(&self, uid: &str, email: &str, city: &str) -> String {
        let token = format!("token-{uid}");
        self.verifier.register(&token, uid, email);

        let body = json!({
            "firstName": "Test",
            "lastName": uid,
            "city": city,
        });
        let (status, value) = self
            .request(Method::POST, "/api/users/register", Some(&token), Some(body))
            .await;
        assert_eq!(status, StatusCode::OK, "Registration failed: {}", value);
        token
    }

    /// Register the configured global admin identity.
    pub async fn register_admin(&self, uid: &str, city: &str) -> String {
        let admin_email = self.state.config.admin_email.clone();
        self.register_user(uid, &admin_email, city).await
    }

    /// Community id for a city (must already be seeded).
    pub async fn community_id(&self, token: &str, city: &str) -> String {
        let (status, value) = self
            .request(Method::GET, "/api/communities", Some(token), None)
            .await;
        assert_eq!(status, StatusCode::OK, "List communities failed: {}", value);
        value
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["city"] == city)
            .unwrap_or_else(|| panic!("No community for {city}"))["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Sub-groups of a community, ordered by level.
    pub async fn sub_groups(&self, token: &str, community_id: &str) -> Vec<Value> {
        let uri = format!("/api/communities/{community_id}");
        let (status, value) = self.request(Method::GET, &uri, Some(token), None).await;
        assert_eq!(status, StatusCode::OK, "Get community failed: {}", value);
        value["subGroups"].as_array().unwrap().clone()
    }

    /// Send a private text message. Returns the message id.
    pub async fn send_private(&self, token: &str, receiver_uid: &str, content: &str) -> String {
        let body = json!({
            "receiverId": receiver_uid,
            "content": content,
        });
        let (status, value) = self
            .request(Method::POST, "/api/messages/private", Some(token), Some(body))
            .await;
        assert_eq!(status, StatusCode::OK, "Send private failed: {}", value);
        value["id"].as_str().unwrap().to_string()
    }
}
