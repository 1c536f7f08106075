use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{coupon, customer, product, store, transaction, user};
use crate::errors::ServiceError;

pub mod commerce_repository;
pub mod in_memory;

pub use commerce_repository::SeaOrmCommerceRepository;
pub use in_memory::InMemoryCommerceRepository;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Storage boundary of the commerce core.
///
/// Lookups return `ServiceError::NotFound` on a miss. Writes that touch more
/// than one record (store membership, catalog and coupon binding,
/// transaction back-references) are applied atomically by every implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommerceRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<user::Model, ServiceError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError>;

    async fn get_store(&self, id: Uuid) -> Result<store::Model, ServiceError>;

    async fn get_product(&self, id: Uuid) -> Result<product::Model, ServiceError>;

    async fn get_customer(&self, id: Uuid) -> Result<customer::Model, ServiceError>;

    async fn get_coupon(&self, id: Uuid) -> Result<coupon::Model, ServiceError>;

    /// Fails with `Conflict` when the email is already registered.
    async fn insert_user(&self, user: user::Model) -> Result<user::Model, ServiceError>;

    /// Inserts the store and appends it to the owner's `work_at`.
    async fn insert_store(&self, store: store::Model) -> Result<store::Model, ServiceError>;

    /// Adds `user_id` to the store's employees and the store to the user's
    /// `work_at`. Adding an existing employee is a no-op.
    async fn add_employee(&self, store_id: Uuid, user_id: Uuid)
        -> Result<store::Model, ServiceError>;

    /// Inserts the product and lists it in its store's catalog.
    async fn insert_product(&self, product: product::Model) -> Result<product::Model, ServiceError>;

    /// Inserts the customer and lists it on its store.
    async fn insert_customer(
        &self,
        customer: customer::Model,
    ) -> Result<customer::Model, ServiceError>;

    /// Inserts the coupon and binds it to its store.
    async fn insert_coupon(&self, coupon: coupon::Model) -> Result<coupon::Model, ServiceError>;

    /// Inserts the transaction and links it into the store's and the
    /// customer's transaction lists as one unit.
    async fn record_transaction(
        &self,
        transaction: transaction::Model,
    ) -> Result<transaction::Model, ServiceError>;
}
