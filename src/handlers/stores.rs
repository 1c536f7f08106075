use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Json, Path, State,
    },
    response::Response,
    routing::post,
    Extension, Router,
};
use uuid::Uuid;

use super::common::{created_response, json_body, path_param, success_response};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ServiceError,
    handlers::AppState,
    services::stores::{
        AddEmployee, CustomerView, NewCustomer, NewProduct, NewStore, ProductView, StoreView,
    },
    ApiResponse,
};

/// Store administration; coupon routes are nested by the coupons module.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_store))
        .route("/:store_id/employees", post(add_employee))
        .route("/:store_id/products", post(add_product))
        .route("/:store_id/customers", post(add_customer))
        .route("/:store_id/coupons", post(super::coupons::create_coupon))
        .with_session_auth()
}

#[utoipa::path(
    post,
    path = "/api/v1/stores",
    summary = "Create store",
    description = "Creates a store owned by the authenticated user",
    request_body = NewStore,
    responses(
        (status = 201, description = "Store created", body = ApiResponse<StoreView>),
        (status = 401, description = "Unauthorized", body = ApiResponse<serde_json::Value>),
        (status = 422, description = "Validation error", body = ApiResponse<serde_json::Value>),
    ),
    security(("bearer_auth" = []), ("refresh_cookie" = [])),
    tag = "Stores"
)]
pub async fn create_store(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<NewStore>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let input = json_body(payload)?;
    let store = state.services.stores.create_store(user.user_id, input).await?;
    Ok(created_response("store created", StoreView::from(store)))
}

#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_id}/employees",
    summary = "Add employee",
    description = "Only the store owner may add employees",
    params(("store_id" = Uuid, Path, description = "Store ID")),
    request_body = AddEmployee,
    responses(
        (status = 200, description = "Employee added", body = ApiResponse<StoreView>),
        (status = 403, description = "Not the store owner", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Store or user not found", body = ApiResponse<serde_json::Value>),
    ),
    security(("bearer_auth" = []), ("refresh_cookie" = [])),
    tag = "Stores"
)]
pub async fn add_employee(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    store_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AddEmployee>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let store_id = path_param(store_id)?;
    let input = json_body(payload)?;
    let store = state
        .services
        .stores
        .add_employee(user.user_id, store_id, input.user_id)
        .await?;
    Ok(success_response("employee added", StoreView::from(store)))
}

#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_id}/products",
    summary = "Add product",
    description = "Lists a product in the store's catalog. Requires store membership.",
    params(("store_id" = Uuid, Path, description = "Store ID")),
    request_body = NewProduct,
    responses(
        (status = 201, description = "Product added", body = ApiResponse<ProductView>),
        (status = 400, description = "Negative price", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "No access rights to this store", body = ApiResponse<serde_json::Value>),
        (status = 422, description = "Validation error", body = ApiResponse<serde_json::Value>),
    ),
    security(("bearer_auth" = []), ("refresh_cookie" = [])),
    tag = "Stores"
)]
pub async fn add_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    store_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let store_id = path_param(store_id)?;
    let input = json_body(payload)?;
    let product = state
        .services
        .stores
        .add_product(user.user_id, store_id, input)
        .await?;
    Ok(created_response("product added", ProductView::from(product)))
}

#[utoipa::path(
    post,
    path = "/api/v1/stores/{store_id}/customers",
    summary = "Add customer",
    description = "Registers a customer on the store. Requires store membership.",
    params(("store_id" = Uuid, Path, description = "Store ID")),
    request_body = NewCustomer,
    responses(
        (status = 201, description = "Customer added", body = ApiResponse<CustomerView>),
        (status = 403, description = "No access rights to this store", body = ApiResponse<serde_json::Value>),
        (status = 422, description = "Validation error", body = ApiResponse<serde_json::Value>),
    ),
    security(("bearer_auth" = []), ("refresh_cookie" = [])),
    tag = "Stores"
)]
pub async fn add_customer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    store_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NewCustomer>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let store_id = path_param(store_id)?;
    let input = json_body(payload)?;
    let customer = state
        .services
        .stores
        .add_customer(user.user_id, store_id, input)
        .await?;
    Ok(created_response("customer added", CustomerView::from(customer)))
}
