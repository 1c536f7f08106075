/*!
 * # Authentication and Authorization Module
 *
 * Staff sessions are carried by two tokens:
 *
 * - a short-lived access token sent as `Authorization: Bearer <token>`
 * - a long-lived refresh token stored in the `refresh_token` cookie
 *
 * Every protected route resolves both, and the two subjects (plus an
 * optional path parameter) must name the same user before the handler runs.
 * Store-level checks live in [`AuthorizationGate`].
 */

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;

mod gate;
pub mod password;
mod session;
mod tokens;

pub use gate::{AuthorizationGate, Subject};
pub use session::{refresh_cookie_value, SessionGuard, REFRESH_COOKIE};
pub use tokens::{Claims, IdentityClaim, TokenService, TokenUse};

/// Authenticated user placed in request extensions by [`session_auth_middleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub session_expires_at: DateTime<Utc>,
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub refresh_cookie_http_only: bool,
    pub refresh_cookie_secure: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("refresh_cookie_http_only", &self.refresh_cookie_http_only)
            .field("refresh_cookie_secure", &self.refresh_cookie_secure)
            .finish_non_exhaustive()
    }
}

impl AuthConfig {
    /// 60 second access tokens, 7 day refresh tokens.
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            issuer: "storehub-api".to_string(),
            access_token_ttl: Duration::from_secs(60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            refresh_cookie_http_only: false,
            refresh_cookie_secure: false,
        }
    }

    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            access_secret: cfg.jwt_secret.clone(),
            refresh_secret: cfg.refresh_token_secret.clone(),
            issuer: cfg.auth_issuer.clone(),
            access_token_ttl: Duration::from_secs(cfg.access_token_ttl_secs),
            refresh_token_ttl: Duration::from_secs(cfg.refresh_token_ttl_secs),
            refresh_cookie_http_only: cfg.refresh_cookie_http_only,
            refresh_cookie_secure: cfg.refresh_cookie_secure,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(
            "access-secret-for-unit-tests-0123456789-abcdefghijklmnopqrstuvwxyz",
            "refresh-secret-for-unit-tests-9876543210-zyxwvutsrqponmlkjihgfedcba",
        )
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("cookies not defined")]
    MissingSession,

    #[error("expired")]
    SessionExpired,

    #[error("access token not defined")]
    MissingToken,

    #[error("invalid token")]
    InvalidToken,

    #[error("access token expired")]
    TokenExpired,

    #[error("mismatch between auth_id and cookies_id")]
    IdentityMismatch,

    #[error("no access rights to this store")]
    NoStoreAccess,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    WeakPassword(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::MissingSession
            | AuthError::MissingToken
            | AuthError::IdentityMismatch
            | AuthError::InvalidCredentials => ServiceError::Unauthorized(message),
            AuthError::SessionExpired
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::NoStoreAccess => ServiceError::Forbidden(message),
            AuthError::WeakPassword(msg) => ServiceError::ValidationError(msg),
            AuthError::PasswordHash(msg) => ServiceError::HashError(msg),
            AuthError::TokenCreation(msg) => ServiceError::TokenCreation(msg),
            AuthError::InternalError(msg) => ServiceError::InternalError(msg),
        }
    }
}

/// Resolves the bearer access token.
pub fn bearer_identity(headers: &HeaderMap, tokens: &TokenService) -> Result<IdentityClaim, AuthError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let claim = tokens.verify(TokenUse::Access, token)?;
    if claim.is_expired_at(Utc::now()) {
        return Err(AuthError::TokenExpired);
    }
    Ok(claim)
}

/// Session cookie first, then bearer token, then the two must agree.
pub fn authenticate_request(
    headers: &HeaderMap,
    tokens: Arc<TokenService>,
) -> Result<AuthUser, AuthError> {
    let session = SessionGuard::new(tokens.clone()).authenticate_headers(headers)?;
    let bearer = bearer_identity(headers, &tokens)?;
    AuthorizationGate::require_identity_match(&bearer, &session)?;

    Ok(AuthUser {
        user_id: bearer.user_id,
        session_expires_at: session.expires_at,
    })
}

fn token_service(request: &Request) -> Result<Arc<TokenService>, ServiceError> {
    request
        .extensions()
        .get::<Arc<TokenService>>()
        .cloned()
        .ok_or_else(|| ServiceError::InternalError("Token service not available".to_string()))
}

fn reject(err: AuthError) -> ServiceError {
    counter!("storehub_auth_failures_total", 1);
    warn!(reason = %err, "authentication rejected");
    err.into()
}

/// Authentication middleware binding the bearer subject to the session subject
pub async fn session_auth_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let tokens = token_service(&request)?;
    let user = authenticate_request(request.headers(), tokens).map_err(reject)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Requires the path parameter named by the state to equal the authenticated user
pub async fn path_identity_middleware(
    State(param): State<String>,
    Path(params): Path<HashMap<String, String>>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| reject(AuthError::MissingToken))?;

    let path_id = params
        .get(&param)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| reject(AuthError::IdentityMismatch))?;

    AuthorizationGate::require_identity_match(&user, &path_id).map_err(reject)?;
    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_session_auth(self) -> Self;
    fn with_path_identity(self, param: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_session_auth(self) -> Self {
        self.route_layer(axum::middleware::from_fn(session_auth_middleware))
    }

    fn with_path_identity(self, param: &str) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            param.to_string(),
            path_identity_middleware,
        ))
        .with_session_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{HeaderValue, Request as HttpRequest, StatusCode},
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    fn tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new(AuthConfig::for_tests()))
    }

    fn headers_for(tokens: &TokenService, bearer: Uuid, session: Uuid) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let access = tokens.issue_access(bearer).unwrap();
        let refresh = tokens.issue_refresh(session).unwrap();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {access}")).unwrap(),
        );
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{REFRESH_COOKIE}={refresh}")).unwrap(),
        );
        headers
    }

    #[test]
    fn matching_subjects_authenticate() {
        let tokens = tokens();
        let user_id = Uuid::new_v4();
        let user = authenticate_request(&headers_for(&tokens, user_id, user_id), tokens).unwrap();
        assert_eq!(user.user_id, user_id);
    }

    #[test]
    fn mismatched_subjects_are_unauthorized() {
        let tokens = tokens();
        let headers = headers_for(&tokens, Uuid::new_v4(), Uuid::new_v4());
        let err: ServiceError = authenticate_request(&headers, tokens).unwrap_err().into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn bearer_errors_split_between_401_and_403() {
        let tokens = tokens();
        let mut headers = HeaderMap::new();
        let err: ServiceError = bearer_identity(&headers, &tokens).unwrap_err().into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer junk"));
        let err: ServiceError = bearer_identity(&headers, &tokens).unwrap_err().into();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn session_errors_map_to_expected_status() {
        let missing: ServiceError = AuthError::MissingSession.into();
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(missing.response_message(), "cookies not defined");

        let expired: ServiceError = AuthError::SessionExpired.into();
        assert_eq!(expired.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(expired.response_message(), "expired");
    }

    async fn whoami(Extension(user): Extension<AuthUser>) -> String {
        user.user_id.to_string()
    }

    fn app(tokens: Arc<TokenService>) -> Router {
        Router::new()
            .route("/users/:user_id", get(whoami))
            .with_path_identity("user_id")
            .layer(Extension(tokens))
    }

    fn request(path: String, headers: HeaderMap) -> HttpRequest<Body> {
        let mut request = HttpRequest::builder().uri(path).body(Body::empty()).unwrap();
        *request.headers_mut() = headers;
        request
    }

    #[tokio::test]
    async fn path_identity_must_match_session() {
        let tokens = tokens();
        let user_id = Uuid::new_v4();
        let headers = headers_for(&tokens, user_id, user_id);

        let ok = app(tokens.clone())
            .oneshot(request(format!("/users/{user_id}"), headers.clone()))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let other = app(tokens)
            .oneshot(request(format!("/users/{}", Uuid::new_v4()), headers))
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_cookie_short_circuits_before_handler() {
        let tokens = tokens();
        let user_id = Uuid::new_v4();
        let mut headers = headers_for(&tokens, user_id, user_id);
        headers.remove(header::COOKIE);

        let response = app(tokens)
            .oneshot(request(format!("/users/{user_id}"), headers))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
