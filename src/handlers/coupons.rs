use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Json, Path, State,
    },
    response::Response,
    Extension,
};
use uuid::Uuid;

use super::common::{created_response, json_body, path_param};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::AppState,
    services::coupons::{CouponView, NewCoupon},
    ApiResponse,
};

#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_id}/coupons",
    summary = "Create coupon",
    description = "Creates a PRICE or PERCENT coupon bound to the store. Requires store membership.",
    params(("store_id" = Uuid, Path, description = "Store ID")),
    request_body = NewCoupon,
    responses(
        (status = 201, description = "Coupon created", body = ApiResponse<CouponView>),
        (status = 400, description = "Discount or window rejected", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "No access rights to this store", body = ApiResponse<serde_json::Value>),
        (status = 409, description = "Code already used in this store", body = ApiResponse<serde_json::Value>),
    ),
    security(("bearer_auth" = []), ("refresh_cookie" = [])),
    tag = "Coupons"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    store_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NewCoupon>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let store_id = path_param(store_id)?;
    let input = json_body(payload)?;
    let coupon = state
        .services
        .coupons
        .create_coupon(user.user_id, store_id, input)
        .await?;
    Ok(created_response("coupon created", CouponView::from(coupon)))
}
