use axum::{
    extract::{rejection::PathRejection, Path, State},
    response::Response,
    routing::get,
    Router,
};
use uuid::Uuid;

use super::common::{path_param, success_response};
use crate::{
    auth::AuthRouterExt, errors::ServiceError, handlers::AppState,
    services::accounts::UserView, ApiResponse,
};

/// User routes; the path id must match both the bearer and session subjects.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/:user_id", get(get_user))
        .with_path_identity("user_id")
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    summary = "Get own profile",
    params(("user_id" = Uuid, Path, description = "Must be the authenticated user")),
    responses(
        (status = 200, description = "User profile", body = ApiResponse<UserView>),
        (status = 401, description = "Missing session or identity mismatch", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Invalid or expired token", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "User not found", body = ApiResponse<serde_json::Value>),
    ),
    security(("bearer_auth" = []), ("refresh_cookie" = [])),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    user_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Response, ServiceError> {
    let user_id = path_param(user_id)?;
    let user = state.services.accounts.get_user(user_id).await?;
    Ok(success_response("user found", UserView::from(user)))
}
