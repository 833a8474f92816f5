//! User provider lookup entity model
//!
//! Binds an authenticated user to the provider that authenticates them and to
//! the identity string that is meaningful inside that provider's namespace.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "authenticated_user_lookups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Owning user (unique: at most one lookup per user)
    #[sea_orm(unique)]
    pub authenticated_user_id: i64,

    /// Provider row id, or the builtin provider id
    pub authentication_provider_id: Option<String>,

    /// Identity inside the provider's namespace
    pub persistent_user_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::authenticated_user::Entity",
        from = "Column::AuthenticatedUserId",
        to = "super::authenticated_user::Column::Id",
        on_delete = "Cascade"
    )]
    AuthenticatedUser,
}

impl Related<super::authenticated_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthenticatedUser.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
