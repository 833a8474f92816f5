//! Shibboleth provider
//!
//! Federated SSO where the identity provider releases attributes through the
//! service provider. Accounts authenticated here are the source of builtin
//! conversions.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::trait_::{AuthenticationProvider, ProviderFactory, ProviderInfo, SetupError};
use crate::models::auth_provider_row;

/// Well-known id of the shibboleth provider
pub const SHIB_PROVIDER_ID: &str = "shib";

/// Factory payload for a shibboleth provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShibSettings {
    /// Entity id of this service provider, when not taken from the environment
    #[serde(default)]
    pub entity_id: Option<String>,
    /// Released attribute name → local user field
    #[serde(default)]
    pub attribute_map: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ShibProvider {
    info: ProviderInfo,
}

impl AuthenticationProvider for ShibProvider {
    fn id(&self) -> &str {
        &self.info.id
    }

    fn info(&self) -> ProviderInfo {
        self.info.clone()
    }
}

#[derive(Debug, Default)]
pub struct ShibProviderFactory;

impl ProviderFactory for ShibProviderFactory {
    fn alias(&self) -> &str {
        "shib"
    }

    fn info(&self) -> &str {
        "Shibboleth federated login"
    }

    fn build(
        &self,
        row: &auth_provider_row::Model,
    ) -> Result<Arc<dyn AuthenticationProvider>, SetupError> {
        let settings = if row.config.is_null() {
            ShibSettings::default()
        } else {
            ShibSettings::deserialize(&row.config).map_err(|err| {
                SetupError::new(format!("malformed shibboleth settings: {err}"))
            })?
        };

        debug!(
            provider_id = %row.id,
            entity_id = settings.entity_id.as_deref().unwrap_or("<environment>"),
            mapped_attributes = settings.attribute_map.len(),
            "Validated shibboleth settings"
        );
        Ok(Arc::new(ShibProvider {
            info: ProviderInfo::from_row(row),
        }))
    }
}
