use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::IdList;

/// Store (tenant). Holds references to its members, catalog and
/// the transactions created against it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    #[sea_orm(column_type = "Json")]
    pub employees: IdList,
    #[sea_orm(column_type = "Json")]
    pub products: IdList,
    #[sea_orm(column_type = "Json")]
    pub customers: IdList,
    #[sea_orm(column_type = "Json")]
    pub coupons: IdList,
    #[sea_orm(column_type = "Json")]
    pub transactions: IdList,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Owner or listed employee.
    pub fn has_member(&self, user_id: &Uuid) -> bool {
        self.owner_id == *user_id || self.employees.contains(user_id)
    }
}
