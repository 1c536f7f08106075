#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use storehub_api::{
    build_router,
    config::AppConfig,
    events::{self, EventSender},
    repositories::InMemoryCommerceRepository,
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const ACCESS_SECRET: &str =
    "integration-access-secret-0123456789-abcdefghijklmnopqrstuvwxyz-ABCDEF";
pub const REFRESH_SECRET: &str =
    "integration-refresh-secret-9876543210-zyxwvutsrqponmlkjihgfedcba-FEDCBA";

/// Credentials of a logged-in staff member.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub access_token: String,
    /// `refresh_token=<jwt>` as sent back in the `Cookie` header
    pub cookie: String,
}

/// Router over an in-memory repository, plus direct repository access for seeding.
pub struct TestApp {
    router: Router,
    pub repo: Arc<InMemoryCommerceRepository>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub fn new() -> Self {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            ACCESS_SECRET.to_string(),
            REFRESH_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        let repo = Arc::new(InMemoryCommerceRepository::new());
        let (event_sender, event_rx) = EventSender::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(cfg, repo.clone(), Arc::new(event_sender), None);
        Self {
            router: build_router(state),
            repo,
            _event_task: event_task,
        }
    }

    /// Sends a request, attaching bearer and cookie credentials when given.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        session: Option<&Session>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(session) = session {
            builder = builder
                .header(header::AUTHORIZATION, format!("Bearer {}", session.access_token))
                .header(header::COOKIE, session.cookie.clone());
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.send_raw(request).await
    }

    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, headers, body)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> (StatusCode, Value) {
        let (status, _, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/register",
                Some(json!({ "name": name, "email": email, "password": password })),
                None,
            )
            .await;
        (status, body)
    }

    pub async fn login(&self, email: &str, password: &str) -> Session {
        let (status, headers, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");

        let set_cookie = headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("login sets the session cookie");
        let cookie = set_cookie
            .split(';')
            .next()
            .expect("cookie pair")
            .trim()
            .to_string();

        Session {
            user_id: body["data"]["user"]["id"]
                .as_str()
                .and_then(|id| Uuid::parse_str(id).ok())
                .expect("user id in login response"),
            access_token: body["data"]["access_token"]
                .as_str()
                .expect("access token")
                .to_string(),
            cookie,
        }
    }

    /// Registers and logs in a staff member in one go.
    pub async fn staff(&self, email: &str) -> Session {
        let (status, body) = self.register("Staff", email, "correct horse battery").await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        self.login(email, "correct horse battery").await
    }

    pub async fn create_store(&self, owner: &Session, name: &str) -> Uuid {
        let (status, _, body) = self
            .send(
                Method::POST,
                "/api/v1/stores",
                Some(json!({ "name": name })),
                Some(owner),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "store creation failed: {body}");
        Uuid::parse_str(body["data"]["id"].as_str().expect("store id")).expect("uuid")
    }

    pub async fn create_coupon(&self, session: &Session, store_id: Uuid, coupon: Value) -> (StatusCode, Value) {
        let (status, _, body) = self
            .send(
                Method::POST,
                &format!("/api/v1/stores/{store_id}/coupons"),
                Some(coupon),
                Some(session),
            )
            .await;
        (status, body)
    }

    /// Adds a product to the store's catalog through the API.
    pub async fn seed_product(
        &self,
        session: &Session,
        store_id: Uuid,
        price: Decimal,
        stock: i32,
    ) -> Uuid {
        let (status, _, body) = self
            .send(
                Method::POST,
                &format!("/api/v1/stores/{store_id}/products"),
                Some(json!({ "name": "Laptop", "price": price.to_string(), "stock": stock })),
                Some(session),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "product creation failed: {body}");
        Uuid::parse_str(body["data"]["id"].as_str().expect("product id")).expect("uuid")
    }

    /// Registers a customer on the store through the API.
    pub async fn seed_customer(&self, session: &Session, store_id: Uuid) -> Uuid {
        let (status, _, body) = self
            .send(
                Method::POST,
                &format!("/api/v1/stores/{store_id}/customers"),
                Some(json!({ "name": "Alice", "email": "alice@example.com" })),
                Some(session),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "customer creation failed: {body}");
        Uuid::parse_str(body["data"]["id"].as_str().expect("customer id")).expect("uuid")
    }
}
