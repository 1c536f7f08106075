use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::entities::{
    coupon, customer, product, store, transaction, user, Coupon, Customer, Product, Store, User,
};
use crate::errors::ServiceError;
use crate::repositories::{BaseRepository, CommerceRepository, Repository};

/// sea-orm backed [`CommerceRepository`].
#[derive(Debug, Clone)]
pub struct SeaOrmCommerceRepository {
    base: BaseRepository,
}

impl SeaOrmCommerceRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

async fn load_store<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<store::Model, ServiceError> {
    Store::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Store", id))
}

async fn load_user<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<user::Model, ServiceError> {
    User::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("User", id))
}

// Rows whose id lists are about to be rewritten are read with FOR UPDATE so
// concurrent appends queue behind each other instead of overwriting.
// Lock order is store first, then user or customer.

async fn lock_store<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<store::Model, ServiceError> {
    Store::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Store", id))
}

async fn lock_user<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<user::Model, ServiceError> {
    User::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("User", id))
}

async fn lock_customer<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<customer::Model, ServiceError> {
    Customer::find_by_id(id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Customer", id))
}

#[async_trait]
impl CommerceRepository for SeaOrmCommerceRepository {
    async fn get_user(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        load_user(self.base.get_db(), id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(User::find()
            .filter(user::Column::Email.eq(email))
            .one(self.base.get_db())
            .await?)
    }

    async fn get_store(&self, id: Uuid) -> Result<store::Model, ServiceError> {
        load_store(self.base.get_db(), id).await
    }

    async fn get_product(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(id)
            .one(self.base.get_db())
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }

    async fn get_customer(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        Customer::find_by_id(id)
            .one(self.base.get_db())
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", id))
    }

    async fn get_coupon(&self, id: Uuid) -> Result<coupon::Model, ServiceError> {
        Coupon::find_by_id(id)
            .one(self.base.get_db())
            .await?
            .ok_or_else(|| ServiceError::not_found("Coupon", id))
    }

    async fn insert_user(&self, model: user::Model) -> Result<user::Model, ServiceError> {
        user::ActiveModel {
            id: Set(model.id),
            name: Set(model.name),
            email: Set(model.email),
            password_hash: Set(model.password_hash),
            work_at: Set(model.work_at),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        }
        .insert(self.base.get_db())
        .await
        .map_err(|e| ServiceError::from_db(e, "email already registered"))
    }

    async fn insert_store(&self, model: store::Model) -> Result<store::Model, ServiceError> {
        let txn = self.base.get_db().begin().await?;

        let owner = lock_user(&txn, model.owner_id).await?;
        let inserted = store::ActiveModel {
            id: Set(model.id),
            name: Set(model.name),
            owner_id: Set(model.owner_id),
            employees: Set(model.employees),
            products: Set(model.products),
            customers: Set(model.customers),
            coupons: Set(model.coupons),
            transactions: Set(model.transactions),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        }
        .insert(&txn)
        .await?;

        let work_at = owner.work_at.with(inserted.id);
        let mut owner: user::ActiveModel = owner.into();
        owner.work_at = Set(work_at);
        owner.updated_at = Set(Utc::now());
        owner.update(&txn).await?;

        txn.commit().await?;
        debug!(store_id = %inserted.id, "store inserted");
        Ok(inserted)
    }

    async fn add_employee(
        &self,
        store_id: Uuid,
        user_id: Uuid,
    ) -> Result<store::Model, ServiceError> {
        let txn = self.base.get_db().begin().await?;

        let store = lock_store(&txn, store_id).await?;
        let employee = lock_user(&txn, user_id).await?;
        let now = Utc::now();

        let employees = store.employees.with(user_id);
        let mut store: store::ActiveModel = store.into();
        store.employees = Set(employees);
        store.updated_at = Set(now);
        let store = store.update(&txn).await?;

        let work_at = employee.work_at.with(store_id);
        let mut employee: user::ActiveModel = employee.into();
        employee.work_at = Set(work_at);
        employee.updated_at = Set(now);
        employee.update(&txn).await?;

        txn.commit().await?;
        Ok(store)
    }

    async fn insert_coupon(&self, model: coupon::Model) -> Result<coupon::Model, ServiceError> {
        let txn = self.base.get_db().begin().await?;

        let store = lock_store(&txn, model.store_id).await?;
        let inserted = coupon::ActiveModel {
            id: Set(model.id),
            store_id: Set(model.store_id),
            code: Set(model.code),
            coupon_type: Set(model.coupon_type),
            discount: Set(model.discount),
            is_active: Set(model.is_active),
            starts_date: Set(model.starts_date),
            ends_date: Set(model.ends_date),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::from_db(e, "coupon code already exists in this store"))?;

        let coupons = store.coupons.with(inserted.id);
        let mut store: store::ActiveModel = store.into();
        store.coupons = Set(coupons);
        store.updated_at = Set(Utc::now());
        store.update(&txn).await?;

        txn.commit().await?;
        Ok(inserted)
    }

    async fn insert_product(&self, model: product::Model) -> Result<product::Model, ServiceError> {
        let txn = self.base.get_db().begin().await?;

        let store = lock_store(&txn, model.store_id).await?;
        let inserted = product::ActiveModel {
            id: Set(model.id),
            store_id: Set(model.store_id),
            name: Set(model.name),
            price: Set(model.price),
            stock: Set(model.stock),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        }
        .insert(&txn)
        .await?;

        let products = store.products.with(inserted.id);
        let mut store: store::ActiveModel = store.into();
        store.products = Set(products);
        store.updated_at = Set(Utc::now());
        store.update(&txn).await?;

        txn.commit().await?;
        Ok(inserted)
    }

    async fn insert_customer(
        &self,
        model: customer::Model,
    ) -> Result<customer::Model, ServiceError> {
        let txn = self.base.get_db().begin().await?;

        let store = lock_store(&txn, model.store_id).await?;
        let inserted = customer::ActiveModel {
            id: Set(model.id),
            store_id: Set(model.store_id),
            name: Set(model.name),
            email: Set(model.email),
            transactions: Set(model.transactions),
            created_at: Set(model.created_at),
            updated_at: Set(model.updated_at),
        }
        .insert(&txn)
        .await?;

        let customers = store.customers.with(inserted.id);
        let mut store: store::ActiveModel = store.into();
        store.customers = Set(customers);
        store.updated_at = Set(Utc::now());
        store.update(&txn).await?;

        txn.commit().await?;
        Ok(inserted)
    }

    async fn record_transaction(
        &self,
        model: transaction::Model,
    ) -> Result<transaction::Model, ServiceError> {
        let txn = self.base.get_db().begin().await?;

        let result = async {
            let store = lock_store(&txn, model.store_id).await?;
            let customer = lock_customer(&txn, model.customer_id).await?;

            let inserted = transaction::ActiveModel {
                id: Set(model.id),
                store_id: Set(model.store_id),
                customer_id: Set(model.customer_id),
                created_by: Set(model.created_by),
                products: Set(model.products.clone()),
                applied_coupons: Set(model.applied_coupons.clone()),
                total_amount: Set(model.total_amount),
                total_price: Set(model.total_price),
                status: Set(model.status),
                created_at: Set(model.created_at),
                updated_at: Set(model.updated_at),
            }
            .insert(&txn)
            .await?;

            let now = Utc::now();
            let store_transactions = store.transactions.with(inserted.id);
            let mut store: store::ActiveModel = store.into();
            store.transactions = Set(store_transactions);
            store.updated_at = Set(now);
            store.update(&txn).await?;

            let customer_transactions = customer.transactions.with(inserted.id);
            let mut customer: customer::ActiveModel = customer.into();
            customer.transactions = Set(customer_transactions);
            customer.updated_at = Set(now);
            customer.update(&txn).await?;

            Ok::<_, ServiceError>(inserted)
        }
        .await;

        match result {
            Ok(inserted) => {
                txn.commit().await?;
                Ok(inserted)
            }
            Err(err) => {
                error!(transaction_id = %model.id, error = %err, "rolling back transaction write");
                txn.rollback().await?;
                Err(err)
            }
        }
    }
}
