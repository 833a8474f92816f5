//! Authenticated user entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "authenticated_users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Stable human-readable identifier, unique across providers
    #[sea_orm(unique)]
    pub user_identifier: String,

    pub email: String,

    pub superuser: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::user_lookup::Entity")]
    Lookup,
}

impl Related<super::user_lookup::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lookup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
