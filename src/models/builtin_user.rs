//! Builtin (locally managed) credential entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "builtin_users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_name: String,

    pub email: String,

    /// Unset until the user chooses a password through the reset flow
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
