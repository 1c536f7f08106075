use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "StoreHub API",
        version = "1.0.0",
        description = r#"
# StoreHub Commerce API

Multi-tenant store backend: staff accounts, stores, catalog, coupons and transactions.

## Authentication

Protected endpoints need both credentials issued by `POST /api/v1/auth/login`:

- `Authorization: Bearer <access_token>` (60 second lifetime, renew with `POST /api/v1/auth/refresh`)
- the `refresh_token` session cookie

Both must name the same user. A missing credential is a `401`; an invalid or
expired one is a `403`.

## Envelope

Every response, successful or not, is wrapped as:

```json
{ "success": true, "status": 200, "message": "transaction created", "data": { } }
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "Auth", description = "Registration, login and session renewal"),
        (name = "Users", description = "Staff profiles"),
        (name = "Stores", description = "Store administration"),
        (name = "Coupons", description = "Store coupons"),
        (name = "Transactions", description = "Order creation"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh,
        crate::handlers::auth::logout,
        crate::handlers::users::get_user,
        crate::handlers::stores::create_store,
        crate::handlers::stores::add_employee,
        crate::handlers::stores::add_product,
        crate::handlers::stores::add_customer,
        crate::handlers::coupons::create_coupon,
        crate::handlers::transactions::create_transaction,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::entities::LineItem,
            crate::entities::CouponType,
            crate::entities::TransactionStatus,
            crate::services::accounts::RegisterUser,
            crate::services::accounts::LoginCredentials,
            crate::services::accounts::UserView,
            crate::services::stores::NewStore,
            crate::services::stores::AddEmployee,
            crate::services::stores::StoreView,
            crate::services::stores::NewProduct,
            crate::services::stores::ProductView,
            crate::services::stores::NewCustomer,
            crate::services::stores::CustomerView,
            crate::services::coupons::NewCoupon,
            crate::services::coupons::CouponView,
            crate::services::transactions::CreateTransactionRequest,
            crate::services::transactions::TransactionView,
            crate::handlers::auth::AccessTokenResponse,
            crate::handlers::auth::LoginResponse,
            crate::handlers::health::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

/// Registers the bearer token and session cookie schemes used by `security(...)`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "refresh_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                    crate::auth::REFRESH_COOKIE,
                ))),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDocV1::openapi())
}
