//! Provider trait definitions
//!
//! Defines the interface every live authentication provider exposes and the
//! factory capability that turns a stored configuration row into one.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::models::auth_provider_row;

/// Display information for a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

impl ProviderInfo {
    pub fn from_row(row: &auth_provider_row::Model) -> Self {
        Self {
            id: row.id.clone(),
            title: row.title.clone(),
            subtitle: row.subtitle.clone(),
        }
    }
}

/// An activated provider that can serve authentication requests.
pub trait AuthenticationProvider: Send + Sync + fmt::Debug {
    /// Provider id; the registry key
    fn id(&self) -> &str;

    fn info(&self) -> ProviderInfo;

    /// Whether users of this provider may change their password locally
    fn is_password_update_allowed(&self) -> bool {
        false
    }

    /// Whether users of this provider may edit their profile locally
    fn is_user_info_update_allowed(&self) -> bool {
        false
    }
}

/// Construction failed, typically because the configuration payload is malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SetupError {
    pub message: String,
}

impl SetupError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Turns a configuration row into a live provider.
pub trait ProviderFactory: Send + Sync {
    /// Alias matched against `factory_alias` on configuration rows
    fn alias(&self) -> &str;

    /// Short human description
    fn info(&self) -> &str;

    fn build(
        &self,
        row: &auth_provider_row::Model,
    ) -> Result<Arc<dyn AuthenticationProvider>, SetupError>;
}
