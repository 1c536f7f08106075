//! StoreHub commerce backend.
//!
//! Staff register and log in, open stores, add employees and coupons, and
//! record transactions against a store's catalog. Every mutating route is
//! guarded by the session/bearer identity check in [`auth`].

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::get,
    Extension, Router,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::ToSchema;

use crate::auth::{AuthConfig, SessionGuard, TokenService};
use crate::events::EventSender;
use crate::repositories::CommerceRepository;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    /// `None` when running on the in-memory repository.
    pub db: Option<Arc<DatabaseConnection>>,
    pub tokens: Arc<TokenService>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        config: config::AppConfig,
        repo: Arc<dyn CommerceRepository>,
        event_sender: Arc<EventSender>,
        db: Option<Arc<DatabaseConnection>>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(AuthConfig::from_app_config(&config)));
        let services = handlers::AppServices::new(repo, tokens.clone(), event_sender);
        Self {
            config: Arc::new(config),
            db,
            tokens,
            services,
        }
    }

    pub fn session_guard(&self) -> SessionGuard {
        SessionGuard::new(self.tokens.clone())
    }
}

/// Uniform response envelope: `{success, status, message, data}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub status: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            success: status.is_success(),
            status: status.as_u16(),
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }
}

/// Routes mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/auth", handlers::auth::auth_routes())
        .nest("/users", handlers::users::user_routes())
        .nest("/stores", handlers::stores::store_routes())
        .nest("/transactions", handlers::transactions::transaction_routes())
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        // Only reachable in development; other environments fail config validation.
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);
    }

    // Credentialed CORS so browsers send the session cookie.
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Full application router: v1 API, Swagger UI, tracing, CORS and request ids.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let tokens = state.tokens.clone();

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        // The auth middleware reads the token service from request extensions
        .layer(Extension(tokens))
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn failure_envelope_has_null_data() {
        let body = serde_json::to_value(ApiResponse::<()>::failure(
            StatusCode::NOT_FOUND,
            "coupon not available in the store",
        ))
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "status": 404,
                "message": "coupon not available in the store",
                "data": null,
            })
        );
    }

    #[test]
    fn success_flag_follows_status() {
        let ok = ApiResponse::new(StatusCode::CREATED, "created", 1);
        assert!(ok.success);
        assert_eq!(ok.status, 201);

        let unavailable = ApiResponse::new(StatusCode::SERVICE_UNAVAILABLE, "health", 1);
        assert!(!unavailable.success);
    }
}
