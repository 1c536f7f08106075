use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use super::common::{created_response, json_body, success_response};
use crate::{
    errors::ServiceError,
    handlers::AppState,
    services::accounts::{LoginCredentials, RegisterUser, UserView},
    ApiResponse,
};

/// Access token handed to the client; the refresh token stays in the cookie.
#[derive(Debug, Serialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the access token expires
    pub expires_in: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: AccessTokenResponse,
    pub user: UserView,
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

fn access_token_response(state: &AppState, access_token: String) -> AccessTokenResponse {
    AccessTokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.config().access_token_ttl.as_secs(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    summary = "Register staff account",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "User registered", body = ApiResponse<UserView>),
        (status = 409, description = "Email already registered", body = ApiResponse<serde_json::Value>),
        (status = 422, description = "Validation error", body = ApiResponse<serde_json::Value>),
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUser>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let input = json_body(payload)?;
    let user = state.services.accounts.register(input).await?;
    Ok(created_response("user registered", UserView::from(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    summary = "Log in",
    description = "Sets the `refresh_token` session cookie and returns a short-lived access token",
    request_body = LoginCredentials,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<LoginResponse>,
            headers(("Set-Cookie" = String, description = "refresh_token session cookie"))
        ),
        (status = 401, description = "Invalid credentials", body = ApiResponse<serde_json::Value>),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginCredentials>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let credentials = json_body(payload)?;
    let session = state.services.accounts.login(credentials).await?;
    let cookie = state.session_guard().session_cookie(session.refresh_token);

    let body = LoginResponse {
        token: access_token_response(&state, session.access_token),
        user: UserView::from(session.user),
    };
    Ok((
        [(header::SET_COOKIE, cookie.to_string())],
        success_response("logged in", body),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    summary = "Renew access token",
    description = "Issues a new access token for the session in the `refresh_token` cookie",
    responses(
        (status = 200, description = "Access token issued", body = ApiResponse<AccessTokenResponse>),
        (status = 401, description = "Session cookie missing", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Session invalid or expired", body = ApiResponse<serde_json::Value>),
    ),
    security(("refresh_cookie" = [])),
    tag = "Auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let session = state.session_guard().authenticate_headers(&headers)?;
    let access_token = state.services.accounts.refresh(&session).await?;
    info!(user_id = %session.user_id, "access token refreshed");
    Ok(success_response(
        "access token refreshed",
        access_token_response(&state, access_token),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    summary = "Log out",
    responses((status = 200, description = "Session cookie cleared", body = ApiResponse<serde_json::Value>)),
    tag = "Auth"
)]
pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = state.session_guard().cleared_cookie();
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie.to_string())],
        success_response("logged out", Option::<()>::None),
    )
        .into_response()
}
