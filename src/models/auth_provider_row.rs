//! Authentication provider configuration row
//!
//! Durable configuration of one authentication provider. The row survives
//! enable/disable transitions; only an explicit delete removes it.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "auth_provider_rows")]
pub struct Model {
    /// Provider id, stable across restarts (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Alias of the factory that builds the live provider
    pub factory_alias: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    /// Factory-specific payload, opaque to the registry
    #[sea_orm(column_type = "JsonBinary")]
    #[serde(default)]
    pub config: JsonValue,

    #[serde(default)]
    pub enabled: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Creates a row with an empty object payload.
    pub fn new(id: impl Into<String>, factory_alias: impl Into<String>, enabled: bool) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            factory_alias: factory_alias.into(),
            subtitle: None,
            config: JsonValue::Object(Default::default()),
            enabled,
        }
    }

    pub fn with_config(mut self, config: JsonValue) -> Self {
        self.config = config;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}
