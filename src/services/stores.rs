use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthorizationGate;
use crate::entities::{customer, product, store, IdList};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::repositories::CommerceRepository;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewStore {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddEmployee {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,
    #[schema(value_type = f64)]
    pub price: Decimal,
    #[validate(range(min = 0, message = "stock must not be negative"))]
    pub stock: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewCustomer {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductView {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub stock: i32,
}

impl From<product::Model> for ProductView {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            store_id: model.store_id,
            name: model.name,
            price: model.price,
            stock: model.stock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CustomerView {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub transactions: Vec<Uuid>,
}

impl From<customer::Model> for CustomerView {
    fn from(model: customer::Model) -> Self {
        Self {
            id: model.id,
            store_id: model.store_id,
            name: model.name,
            email: model.email,
            transactions: model.transactions.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StoreView {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub employees: Vec<Uuid>,
    pub products: Vec<Uuid>,
    pub customers: Vec<Uuid>,
    pub coupons: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<store::Model> for StoreView {
    fn from(model: store::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            owner_id: model.owner_id,
            employees: model.employees.0,
            products: model.products.0,
            customers: model.customers.0,
            coupons: model.coupons.0,
            created_at: model.created_at,
        }
    }
}

/// Store creation, staff management and the store's catalog.
#[derive(Clone)]
pub struct StoreService {
    repo: Arc<dyn CommerceRepository>,
    event_sender: Arc<EventSender>,
}

impl StoreService {
    pub fn new(repo: Arc<dyn CommerceRepository>, event_sender: Arc<EventSender>) -> Self {
        Self { repo, event_sender }
    }

    /// Creates a store owned by `owner_id`; the owner starts working there.
    #[instrument(skip(self, input))]
    pub async fn create_store(
        &self,
        owner_id: Uuid,
        input: NewStore,
    ) -> Result<store::Model, ServiceError> {
        input.validate()?;
        let owner = self.repo.get_user(owner_id).await?;

        let now = Utc::now();
        let store = self
            .repo
            .insert_store(store::Model {
                id: Uuid::new_v4(),
                name: input.name.trim().to_string(),
                owner_id: owner.id,
                employees: IdList::new(),
                products: IdList::new(),
                customers: IdList::new(),
                coupons: IdList::new(),
                transactions: IdList::new(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.event_sender
            .send_or_log(Event::StoreCreated {
                store_id: store.id,
                owner_id: owner.id,
            })
            .await;
        info!(store_id = %store.id, owner_id = %owner.id, "store created");
        Ok(store)
    }

    /// Only the owner may add staff. Adding an existing employee is a no-op.
    #[instrument(skip(self))]
    pub async fn add_employee(
        &self,
        actor_id: Uuid,
        store_id: Uuid,
        employee_id: Uuid,
    ) -> Result<store::Model, ServiceError> {
        let store = self.repo.get_store(store_id).await?;
        if store.owner_id != actor_id {
            warn!(%actor_id, %store_id, "non-owner tried to add an employee");
            return Err(ServiceError::Forbidden(
                "only the store owner can add employees".to_string(),
            ));
        }
        self.repo.get_user(employee_id).await?;

        let store = self.repo.add_employee(store.id, employee_id).await?;
        self.event_sender
            .send_or_log(Event::EmployeeAdded {
                store_id: store.id,
                user_id: employee_id,
            })
            .await;
        info!(%store_id, user_id = %employee_id, "employee added");
        Ok(store)
    }

    async fn member_store(
        &self,
        actor_id: Uuid,
        store_id: Uuid,
    ) -> Result<store::Model, ServiceError> {
        let actor = self.repo.get_user(actor_id).await?;
        let store = self.repo.get_store(store_id).await?;
        AuthorizationGate::require_store_membership(&actor, store.id)?;
        Ok(store)
    }

    /// Lists a new product in the store's catalog. Any member may add products.
    #[instrument(skip(self, input))]
    pub async fn add_product(
        &self,
        actor_id: Uuid,
        store_id: Uuid,
        input: NewProduct,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        if input.price < Decimal::ZERO {
            return Err(ServiceError::BusinessRule(
                "price must not be negative".to_string(),
            ));
        }
        let store = self.member_store(actor_id, store_id).await?;

        let now = Utc::now();
        let product = self
            .repo
            .insert_product(product::Model {
                id: Uuid::new_v4(),
                store_id: store.id,
                name: input.name.trim().to_string(),
                price: input.price,
                stock: input.stock,
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.event_sender
            .send_or_log(Event::ProductAdded {
                product_id: product.id,
                store_id: store.id,
            })
            .await;
        info!(product_id = %product.id, %store_id, "product added");
        Ok(product)
    }

    /// Registers a customer on the store. Any member may add customers.
    #[instrument(skip(self, input))]
    pub async fn add_customer(
        &self,
        actor_id: Uuid,
        store_id: Uuid,
        input: NewCustomer,
    ) -> Result<customer::Model, ServiceError> {
        input.validate()?;
        let store = self.member_store(actor_id, store_id).await?;

        let now = Utc::now();
        let customer = self
            .repo
            .insert_customer(customer::Model {
                id: Uuid::new_v4(),
                store_id: store.id,
                name: input.name.trim().to_string(),
                email: input.email.map(|email| email.trim().to_lowercase()),
                transactions: IdList::new(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.event_sender
            .send_or_log(Event::CustomerAdded {
                customer_id: customer.id,
                store_id: store.id,
            })
            .await;
        info!(customer_id = %customer.id, %store_id, "customer added");
        Ok(customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user;
    use crate::repositories::InMemoryCommerceRepository;
    use assert_matches::assert_matches;

    async fn staff(repo: &InMemoryCommerceRepository, email: &str) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        repo.put_user(user::Model {
            id,
            name: email.into(),
            email: email.into(),
            password_hash: String::new(),
            work_at: IdList::new(),
            created_at: now,
            updated_at: now,
        })
        .await;
        id
    }

    fn service(repo: Arc<InMemoryCommerceRepository>) -> StoreService {
        let (events, _rx) = EventSender::channel(16);
        StoreService::new(repo, Arc::new(events))
    }

    #[tokio::test]
    async fn owner_works_at_created_store() {
        let repo = Arc::new(InMemoryCommerceRepository::new());
        let owner = staff(&repo, "owner@shop.test").await;
        let stores = service(repo.clone());

        let store = stores
            .create_store(owner, NewStore { name: " Corner Shop ".into() })
            .await
            .unwrap();
        assert_eq!(store.name, "Corner Shop");
        assert!(repo.get_user(owner).await.unwrap().works_at(&store.id));
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let repo = Arc::new(InMemoryCommerceRepository::new());
        let owner = staff(&repo, "owner@shop.test").await;
        let result = service(repo)
            .create_store(owner, NewStore { name: String::new() })
            .await;
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn only_owner_adds_employees() {
        let repo = Arc::new(InMemoryCommerceRepository::new());
        let owner = staff(&repo, "owner@shop.test").await;
        let clerk = staff(&repo, "clerk@shop.test").await;
        let other = staff(&repo, "other@shop.test").await;
        let stores = service(repo.clone());
        let store = stores
            .create_store(owner, NewStore { name: "Deli".into() })
            .await
            .unwrap();

        let denied = stores.add_employee(clerk, store.id, other).await;
        assert_matches!(denied, Err(ServiceError::Forbidden(_)));

        let updated = stores.add_employee(owner, store.id, clerk).await.unwrap();
        assert!(updated.employees.contains(&clerk));
        assert!(repo.get_user(clerk).await.unwrap().works_at(&store.id));
    }

    #[tokio::test]
    async fn unknown_employee_is_not_found() {
        let repo = Arc::new(InMemoryCommerceRepository::new());
        let owner = staff(&repo, "owner@shop.test").await;
        let stores = service(repo);
        let store = stores
            .create_store(owner, NewStore { name: "Deli".into() })
            .await
            .unwrap();

        let result = stores.add_employee(owner, store.id, Uuid::new_v4()).await;
        assert_matches!(result, Err(ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn members_build_the_catalog() {
        let repo = Arc::new(InMemoryCommerceRepository::new());
        let owner = staff(&repo, "owner@shop.test").await;
        let clerk = staff(&repo, "clerk@shop.test").await;
        let stores = service(repo.clone());
        let store = stores
            .create_store(owner, NewStore { name: "Deli".into() })
            .await
            .unwrap();
        stores.add_employee(owner, store.id, clerk).await.unwrap();

        let product = stores
            .add_product(
                clerk,
                store.id,
                NewProduct {
                    name: " Bagel ".into(),
                    price: Decimal::new(250, 2),
                    stock: 12,
                },
            )
            .await
            .unwrap();
        let customer = stores
            .add_customer(
                owner,
                store.id,
                NewCustomer {
                    name: "Regular".into(),
                    email: Some("Regular@Example.com".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(product.name, "Bagel");
        assert_eq!(customer.email.as_deref(), Some("regular@example.com"));
        let store = repo.get_store(store.id).await.unwrap();
        assert_eq!(store.products.0, vec![product.id]);
        assert_eq!(store.customers.0, vec![customer.id]);
    }

    #[tokio::test]
    async fn catalog_writes_are_limited_to_members() {
        let repo = Arc::new(InMemoryCommerceRepository::new());
        let owner = staff(&repo, "owner@shop.test").await;
        let outsider = staff(&repo, "outsider@shop.test").await;
        let stores = service(repo.clone());
        let store = stores
            .create_store(owner, NewStore { name: "Deli".into() })
            .await
            .unwrap();

        let denied = stores
            .add_customer(
                outsider,
                store.id,
                NewCustomer {
                    name: "Sneaky".into(),
                    email: None,
                },
            )
            .await;
        assert_matches!(denied, Err(ServiceError::Forbidden(_)));

        let negative = stores
            .add_product(
                owner,
                store.id,
                NewProduct {
                    name: "Refund".into(),
                    price: Decimal::new(-1, 0),
                    stock: 1,
                },
            )
            .await;
        assert_matches!(negative, Err(ServiceError::BusinessRule(_)));

        let no_stock = stores
            .add_product(
                owner,
                store.id,
                NewProduct {
                    name: "Ghost".into(),
                    price: Decimal::ONE,
                    stock: -3,
                },
            )
            .await;
        assert_matches!(no_stock, Err(ServiceError::ValidationError(_)));

        let store = repo.get_store(store.id).await.unwrap();
        assert!(store.products.is_empty());
        assert!(store.customers.is_empty());
    }
}
