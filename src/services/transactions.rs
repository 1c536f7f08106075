use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::AuthorizationGate;
use crate::entities::transaction::{self, LineItems};
use crate::entities::{IdList, LineItem, TransactionStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::repositories::CommerceRepository;
use crate::services::coupons::{CouponEngine, TOTAL_OUT_OF_RANGE};

/// Largest number of coupons a single transaction may stack.
pub const MAX_APPLIED_COUPONS: usize = 3;

/// Order submitted by staff for one of their stores.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTransactionRequest {
    pub store_id: Uuid,
    /// Customer id
    pub customer: Uuid,
    #[validate(custom = "validate_line_items")]
    pub products: Vec<LineItem>,
    #[serde(default)]
    #[validate(length(max = 3, message = "at most 3 coupons can be applied"))]
    pub applied_coupons: Vec<Uuid>,
}

fn validate_line_items(items: &[LineItem]) -> Result<(), ValidationError> {
    if items.is_empty() {
        let mut err = ValidationError::new("products");
        err.message = Some("at least one product is required".into());
        return Err(err);
    }
    if items.iter().any(|item| item.quantity == 0) {
        let mut err = ValidationError::new("products");
        err.message = Some("quantity must be at least 1".into());
        return Err(err);
    }
    Ok(())
}

/// Transaction as returned to clients. Audit fields stay internal.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TransactionView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub applied_coupons: Vec<Uuid>,
    pub customer: Uuid,
    pub products: Vec<LineItem>,
    pub status: TransactionStatus,
    pub total_amount: i64,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_price: Decimal,
}

impl From<transaction::Model> for TransactionView {
    fn from(model: transaction::Model) -> Self {
        Self {
            id: model.id,
            applied_coupons: model.applied_coupons.0,
            customer: model.customer_id,
            products: model.products.0,
            status: model.status,
            total_amount: model.total_amount,
            total_price: model.total_price,
        }
    }
}

/// Totals computed from line items and coupons before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PricedOrder {
    total_amount: i64,
    total_price: Decimal,
}

/// Validates stock, applies coupons and records PENDING transactions.
///
/// Stock is checked but not decremented; reservation belongs to payment
/// confirmation.
#[derive(Clone)]
pub struct TransactionEngine {
    repo: Arc<dyn CommerceRepository>,
    event_sender: Arc<EventSender>,
}

impl TransactionEngine {
    pub fn new(repo: Arc<dyn CommerceRepository>, event_sender: Arc<EventSender>) -> Self {
        Self { repo, event_sender }
    }

    pub async fn create_transaction(
        &self,
        user_id: Uuid,
        request: CreateTransactionRequest,
    ) -> Result<transaction::Model, ServiceError> {
        self.create_transaction_at(user_id, request, Utc::now())
            .await
    }

    /// Runs the pipeline with `now` as the coupon evaluation time.
    #[instrument(skip(self, request), fields(store_id = %request.store_id, customer_id = %request.customer))]
    pub async fn create_transaction_at(
        &self,
        user_id: Uuid,
        request: CreateTransactionRequest,
        now: DateTime<Utc>,
    ) -> Result<transaction::Model, ServiceError> {
        let priced = match self.price_order(user_id, &request, now).await {
            Ok(priced) => priced,
            Err(err) => {
                counter!("storehub_transactions_rejected_total", 1);
                warn!(error = %err, "transaction rejected");
                return Err(err);
            }
        };

        let model = transaction::Model {
            id: Uuid::new_v4(),
            store_id: request.store_id,
            customer_id: request.customer,
            created_by: user_id,
            products: LineItems(request.products),
            applied_coupons: IdList(request.applied_coupons),
            total_amount: priced.total_amount,
            total_price: priced.total_price,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let recorded = self.repo.record_transaction(model).await.map_err(|err| {
            error!(error = %err, "failed to record transaction");
            err
        })?;

        counter!("storehub_transactions_created_total", 1);
        self.event_sender
            .send_or_log(Event::TransactionCreated {
                transaction_id: recorded.id,
                store_id: recorded.store_id,
                customer_id: recorded.customer_id,
                total_price: recorded.total_price,
                occurred_at: now,
            })
            .await;

        info!(
            transaction_id = %recorded.id,
            total_amount = recorded.total_amount,
            total_price = %recorded.total_price,
            "transaction created"
        );
        Ok(recorded)
    }

    /// Every check that must pass before the transaction is written.
    async fn price_order(
        &self,
        user_id: Uuid,
        request: &CreateTransactionRequest,
        now: DateTime<Utc>,
    ) -> Result<PricedOrder, ServiceError> {
        let store = self.repo.get_store(request.store_id).await?;
        let customer = self.repo.get_customer(request.customer).await?;
        require_listed(&store.customers, customer.id, "customer")?;

        let user = self.repo.get_user(user_id).await?;
        AuthorizationGate::require_store_membership(&user, store.id)?;

        let mut total_amount: i64 = 0;
        let mut total_price = Decimal::ZERO;
        for item in &request.products {
            let product = self.repo.get_product(item.id).await?;
            require_listed(&store.products, product.id, "product")?;
            check_stock_availability(product.stock, item.quantity)?;

            total_price = product
                .price
                .checked_mul(Decimal::from(item.quantity))
                .and_then(|line| total_price.checked_add(line))
                .ok_or_else(|| ServiceError::BusinessRule(TOTAL_OUT_OF_RANGE.to_string()))?;
            total_amount = total_amount
                .checked_add(i64::from(item.quantity))
                .ok_or_else(|| ServiceError::BusinessRule(TOTAL_OUT_OF_RANGE.to_string()))?;
        }

        if request.applied_coupons.len() > MAX_APPLIED_COUPONS {
            return Err(ServiceError::ValidationError(
                "applied_coupons: at most 3 coupons can be applied".to_string(),
            ));
        }
        for coupon_id in &request.applied_coupons {
            let coupon = self.repo.get_coupon(*coupon_id).await?;
            require_listed(&store.coupons, coupon.id, "coupon")?;
            CouponEngine::validate_window(&coupon, now)?;
            total_price = CouponEngine::apply_discount(&coupon, total_price)?;
        }

        Ok(PricedOrder {
            total_amount,
            total_price,
        })
    }
}

fn require_listed(list: &IdList, id: Uuid, entity: &str) -> Result<(), ServiceError> {
    if list.contains(&id) {
        Ok(())
    } else {
        Err(ServiceError::NotFound(format!(
            "{entity} not available in the store"
        )))
    }
}

fn check_stock_availability(stock: i32, quantity: u32) -> Result<(), ServiceError> {
    if i64::from(stock) < i64::from(quantity) {
        return Err(ServiceError::BusinessRule("insufficient stock".to_string()));
    }
    Ok(())
}
