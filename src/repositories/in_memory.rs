use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entities::{coupon, customer, product, store, transaction, user};
use crate::errors::ServiceError;
use crate::repositories::CommerceRepository;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, user::Model>,
    stores: HashMap<Uuid, store::Model>,
    products: HashMap<Uuid, product::Model>,
    customers: HashMap<Uuid, customer::Model>,
    coupons: HashMap<Uuid, coupon::Model>,
    transactions: HashMap<Uuid, transaction::Model>,
}

/// [`CommerceRepository`] held in process memory.
///
/// Multi-record writes validate every target before mutating anything and
/// run under a single write lock, so readers never observe a half-applied
/// write.
#[derive(Debug, Default)]
pub struct InMemoryCommerceRepository {
    tables: RwLock<Tables>,
}

impl InMemoryCommerceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_user(&self, user: user::Model) {
        self.tables.write().await.users.insert(user.id, user);
    }

    /// Stores `store` as-is. Membership lists on users are not touched.
    pub async fn put_store(&self, store: store::Model) {
        self.tables.write().await.stores.insert(store.id, store);
    }

    /// Stores `coupon` without binding it to a store.
    pub async fn put_coupon(&self, coupon: coupon::Model) {
        self.tables.write().await.coupons.insert(coupon.id, coupon);
    }

    pub async fn transaction_count(&self) -> usize {
        self.tables.read().await.transactions.len()
    }
}

fn found<T: Clone>(map: &HashMap<Uuid, T>, entity: &str, id: Uuid) -> Result<T, ServiceError> {
    map.get(&id)
        .cloned()
        .ok_or_else(|| ServiceError::not_found(entity, id))
}

#[async_trait]
impl CommerceRepository for InMemoryCommerceRepository {
    async fn get_user(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        found(&self.tables.read().await.users, "User", id)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn get_store(&self, id: Uuid) -> Result<store::Model, ServiceError> {
        found(&self.tables.read().await.stores, "Store", id)
    }

    async fn get_product(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        found(&self.tables.read().await.products, "Product", id)
    }

    async fn get_customer(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        found(&self.tables.read().await.customers, "Customer", id)
    }

    async fn get_coupon(&self, id: Uuid) -> Result<coupon::Model, ServiceError> {
        found(&self.tables.read().await.coupons, "Coupon", id)
    }

    async fn insert_user(&self, user: user::Model) -> Result<user::Model, ServiceError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|existing| existing.email == user.email) {
            return Err(ServiceError::Conflict("email already registered".to_string()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn insert_store(&self, store: store::Model) -> Result<store::Model, ServiceError> {
        let mut tables = self.tables.write().await;
        let owner = tables
            .users
            .get_mut(&store.owner_id)
            .ok_or_else(|| ServiceError::not_found("User", store.owner_id))?;

        owner.work_at.insert(store.id);
        owner.updated_at = Utc::now();
        tables.stores.insert(store.id, store.clone());
        Ok(store)
    }

    async fn add_employee(
        &self,
        store_id: Uuid,
        user_id: Uuid,
    ) -> Result<store::Model, ServiceError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(ServiceError::not_found("User", user_id));
        }
        let now = Utc::now();

        let store = tables
            .stores
            .get_mut(&store_id)
            .ok_or_else(|| ServiceError::not_found("Store", store_id))?;
        store.employees.insert(user_id);
        store.updated_at = now;
        let store = store.clone();

        if let Some(user) = tables.users.get_mut(&user_id) {
            user.work_at.insert(store_id);
            user.updated_at = now;
        }
        Ok(store)
    }

    async fn insert_product(&self, product: product::Model) -> Result<product::Model, ServiceError> {
        let mut tables = self.tables.write().await;
        let store = tables
            .stores
            .get_mut(&product.store_id)
            .ok_or_else(|| ServiceError::not_found("Store", product.store_id))?;
        store.products.insert(product.id);
        store.updated_at = Utc::now();
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn insert_customer(
        &self,
        customer: customer::Model,
    ) -> Result<customer::Model, ServiceError> {
        let mut tables = self.tables.write().await;
        let store = tables
            .stores
            .get_mut(&customer.store_id)
            .ok_or_else(|| ServiceError::not_found("Store", customer.store_id))?;
        store.customers.insert(customer.id);
        store.updated_at = Utc::now();
        tables.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn insert_coupon(&self, coupon: coupon::Model) -> Result<coupon::Model, ServiceError> {
        let mut tables = self.tables.write().await;
        let duplicate = tables
            .coupons
            .values()
            .any(|existing| existing.store_id == coupon.store_id && existing.code == coupon.code);
        if duplicate {
            return Err(ServiceError::Conflict(
                "coupon code already exists in this store".to_string(),
            ));
        }

        let store = tables
            .stores
            .get_mut(&coupon.store_id)
            .ok_or_else(|| ServiceError::not_found("Store", coupon.store_id))?;
        store.coupons.insert(coupon.id);
        store.updated_at = Utc::now();
        tables.coupons.insert(coupon.id, coupon.clone());
        Ok(coupon)
    }

    async fn record_transaction(
        &self,
        transaction: transaction::Model,
    ) -> Result<transaction::Model, ServiceError> {
        let mut tables = self.tables.write().await;

        if !tables.stores.contains_key(&transaction.store_id) {
            return Err(ServiceError::not_found("Store", transaction.store_id));
        }
        if !tables.customers.contains_key(&transaction.customer_id) {
            return Err(ServiceError::not_found("Customer", transaction.customer_id));
        }
        if tables.transactions.contains_key(&transaction.id) {
            return Err(ServiceError::Conflict(format!(
                "transaction {} already recorded",
                transaction.id
            )));
        }

        let now = Utc::now();
        if let Some(store) = tables.stores.get_mut(&transaction.store_id) {
            store.transactions.insert(transaction.id);
            store.updated_at = now;
        }
        if let Some(customer) = tables.customers.get_mut(&transaction.customer_id) {
            customer.transactions.insert(transaction.id);
            customer.updated_at = now;
        }
        tables
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::transaction::LineItems;
    use crate::entities::{IdList, TransactionStatus};
    use assert_matches::assert_matches;
    use rust_decimal::Decimal;

    fn user(email: &str) -> user::Model {
        let now = Utc::now();
        user::Model {
            id: Uuid::new_v4(),
            name: "Staff".into(),
            email: email.into(),
            password_hash: String::new(),
            work_at: IdList::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn store_for(owner: Uuid) -> store::Model {
        let now = Utc::now();
        store::Model {
            id: Uuid::new_v4(),
            name: "Kiosk".into(),
            owner_id: owner,
            employees: IdList::new(),
            products: IdList::new(),
            customers: IdList::new(),
            coupons: IdList::new(),
            transactions: IdList::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn pending(store_id: Uuid, customer_id: Uuid) -> transaction::Model {
        let now = Utc::now();
        transaction::Model {
            id: Uuid::new_v4(),
            store_id,
            customer_id,
            created_by: Uuid::new_v4(),
            products: LineItems::default(),
            applied_coupons: IdList::new(),
            total_amount: 0,
            total_price: Decimal::ZERO,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn membership_writes_are_symmetric() {
        let repo = InMemoryCommerceRepository::new();
        let owner = repo.insert_user(user("owner@shop.test")).await.unwrap();
        let clerk = repo.insert_user(user("clerk@shop.test")).await.unwrap();

        let store = repo.insert_store(store_for(owner.id)).await.unwrap();
        assert!(repo.get_user(owner.id).await.unwrap().works_at(&store.id));

        let store = repo.add_employee(store.id, clerk.id).await.unwrap();
        let again = repo.add_employee(store.id, clerk.id).await.unwrap();
        assert_eq!(again.employees.len(), 1);

        // store side and user side agree for owner, employee and outsider
        let outsider = repo.insert_user(user("walk@shop.test")).await.unwrap();
        for id in [owner.id, clerk.id, outsider.id] {
            let user = repo.get_user(id).await.unwrap();
            assert_eq!(again.has_member(&id), user.works_at(&store.id));
        }
    }

    #[tokio::test]
    async fn catalog_entries_need_an_existing_store() {
        let repo = InMemoryCommerceRepository::new();
        let now = Utc::now();
        let customer = customer::Model {
            id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            name: "Lost".into(),
            email: None,
            transactions: IdList::new(),
            created_at: now,
            updated_at: now,
        };
        assert_matches!(
            repo.insert_customer(customer.clone()).await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            repo.get_customer(customer.id).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let repo = InMemoryCommerceRepository::new();
        repo.insert_user(user("dup@shop.test")).await.unwrap();
        assert_matches!(
            repo.insert_user(user("dup@shop.test")).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn transaction_with_unknown_customer_writes_nothing() {
        let repo = InMemoryCommerceRepository::new();
        let owner = repo.insert_user(user("owner@shop.test")).await.unwrap();
        let store = repo.insert_store(store_for(owner.id)).await.unwrap();

        let result = repo.record_transaction(pending(store.id, Uuid::new_v4())).await;
        assert_matches!(result, Err(ServiceError::NotFound(_)));
        assert_eq!(repo.transaction_count().await, 0);
        assert!(repo.get_store(store.id).await.unwrap().transactions.is_empty());
    }

    #[tokio::test]
    async fn transaction_is_linked_on_both_sides() {
        let repo = InMemoryCommerceRepository::new();
        let owner = repo.insert_user(user("owner@shop.test")).await.unwrap();
        let store = repo.insert_store(store_for(owner.id)).await.unwrap();
        let now = Utc::now();
        let customer = customer::Model {
            id: Uuid::new_v4(),
            store_id: store.id,
            name: "Regular".into(),
            email: None,
            transactions: IdList::new(),
            created_at: now,
            updated_at: now,
        };
        repo.insert_customer(customer.clone()).await.unwrap();

        let recorded = repo
            .record_transaction(pending(store.id, customer.id))
            .await
            .unwrap();

        let store = repo.get_store(store.id).await.unwrap();
        assert!(store.customers.contains(&customer.id));
        assert_eq!(store.transactions.0, vec![recorded.id]);
        assert_eq!(
            repo.get_customer(customer.id).await.unwrap().transactions.0,
            vec![recorded.id]
        );
    }
}
