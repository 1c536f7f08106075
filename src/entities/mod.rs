//! sea-orm entities for the commerce domain.
//!
//! Reference lists (store members, store catalog, back-references to
//! transactions) are stored as JSON id lists on the owning row.

pub mod coupon;
pub mod customer;
pub mod product;
pub mod store;
pub mod transaction;
pub mod user;

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use coupon::{CouponType, Entity as Coupon, Model as CouponModel};
pub use customer::{Entity as Customer, Model as CustomerModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use store::{Entity as Store, Model as StoreModel};
pub use transaction::{Entity as Transaction, LineItem, Model as TransactionModel, TransactionStatus};
pub use user::{Entity as User, Model as UserModel};

/// Ordered list of entity ids persisted in a JSON column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct IdList(pub Vec<Uuid>);

impl IdList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.0.contains(id)
    }

    /// Appends `id` unless it is already present. Returns whether the list changed.
    pub fn insert(&mut self, id: Uuid) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    /// Copy of this list with `id` appended.
    pub fn with(&self, id: Uuid) -> Self {
        let mut next = self.clone();
        next.insert(id);
        next
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Uuid>> for IdList {
    fn from(ids: Vec<Uuid>) -> Self {
        Self(ids)
    }
}
