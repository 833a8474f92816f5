//! Builtin provider
//!
//! Locally managed username/password credentials. The payload carries no
//! settings; anything other than an object (or null) is rejected.

use std::sync::Arc;

use super::trait_::{AuthenticationProvider, ProviderFactory, ProviderInfo, SetupError};
use crate::models::auth_provider_row;

/// Well-known id of the builtin provider
pub const BUILTIN_PROVIDER_ID: &str = "builtin";

#[derive(Debug, Clone)]
pub struct BuiltinProvider {
    info: ProviderInfo,
}

impl BuiltinProvider {
    pub fn new(info: ProviderInfo) -> Self {
        Self { info }
    }
}

impl AuthenticationProvider for BuiltinProvider {
    fn id(&self) -> &str {
        &self.info.id
    }

    fn info(&self) -> ProviderInfo {
        self.info.clone()
    }

    fn is_password_update_allowed(&self) -> bool {
        true
    }

    fn is_user_info_update_allowed(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct BuiltinProviderFactory;

impl ProviderFactory for BuiltinProviderFactory {
    fn alias(&self) -> &str {
        "builtin"
    }

    fn info(&self) -> &str {
        "Built-in username/password store"
    }

    fn build(
        &self,
        row: &auth_provider_row::Model,
    ) -> Result<Arc<dyn AuthenticationProvider>, SetupError> {
        if !(row.config.is_object() || row.config.is_null()) {
            return Err(SetupError::new(format!(
                "builtin provider takes no settings, got {}",
                row.config
            )));
        }
        Ok(Arc::new(BuiltinProvider::new(ProviderInfo::from_row(row))))
    }
}
