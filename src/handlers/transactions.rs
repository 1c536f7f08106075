use axum::{
    extract::{rejection::JsonRejection, Json, State},
    response::Response,
    routing::post,
    Extension, Router,
};
use validator::Validate;

use super::common::{json_body, success_response};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ServiceError,
    handlers::AppState,
    services::transactions::{CreateTransactionRequest, TransactionView},
    ApiResponse,
};

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_transaction))
        .with_session_auth()
}

#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    summary = "Create transaction",
    description = "Validates stock, stacks up to three coupons in request order and records a PENDING transaction",
    request_body = CreateTransactionRequest,
    responses(
        (status = 200, description = "Transaction created", body = ApiResponse<TransactionView>),
        (status = 400, description = "Insufficient stock or coupon rejected", body = ApiResponse<serde_json::Value>),
        (status = 401, description = "Missing or mismatched session", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Invalid token or no store access", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Referenced entity not found or not in the store", body = ApiResponse<serde_json::Value>),
        (status = 422, description = "Validation error", body = ApiResponse<serde_json::Value>),
    ),
    security(("bearer_auth" = []), ("refresh_cookie" = [])),
    tag = "Transactions"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let request = json_body(payload)?;
    request.validate()?;

    let transaction = state
        .services
        .transactions
        .create_transaction(user.user_id, request)
        .await?;
    Ok(success_response(
        "transaction created",
        TransactionView::from(transaction),
    ))
}
