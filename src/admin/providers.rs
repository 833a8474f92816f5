//! Provider administration
//!
//! Configuration-row operations for authentication providers. Every change is
//! written through the persistence facade first; activation state in the
//! provider registry follows the row's `enabled` flag.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AdminError, AdminResult};
use crate::models::auth_provider_row;
use crate::persistence::{PersistenceFacade, Record, RecordKey, UnitOfWork};
use crate::providers::{
    AuthenticationProviderRegistry, DisableOutcome, EnableOutcome, FactoryInfo, ProviderInfo,
};

/// Summary of a startup activation pass
#[derive(Debug, Default, Clone, Serialize)]
pub struct ActivationReport {
    pub activated: Vec<String>,
    /// Provider id and failure message for each row that could not be activated
    pub failed: Vec<(String, String)>,
}

/// Result of changing a provider's enabled flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Enabled(EnableOutcome),
    Disabled(DisableOutcome),
}

/// A live provider and what its users may change locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveProvider {
    #[serde(flatten)]
    pub info: ProviderInfo,
    pub password_update_allowed: bool,
    pub user_info_update_allowed: bool,
}

/// A stored provider row and what its `enabled` flag did to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredProvider {
    pub provider: auth_provider_row::Model,
    pub activation: ToggleOutcome,
}

pub struct ProviderAdmin {
    store: Arc<dyn PersistenceFacade>,
    registry: Arc<AuthenticationProviderRegistry>,
}

impl ProviderAdmin {
    pub fn new(
        store: Arc<dyn PersistenceFacade>,
        registry: Arc<AuthenticationProviderRegistry>,
    ) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &AuthenticationProviderRegistry {
        &self.registry
    }

    pub fn list_factories(&self) -> Vec<FactoryInfo> {
        self.registry.factories().list_factories()
    }

    /// Providers currently serving logins, ordered by id
    pub fn list_active(&self) -> Vec<ActiveProvider> {
        self.registry
            .list_active_ids()
            .into_iter()
            .filter_map(|id| self.registry.get(&id))
            .map(|provider| ActiveProvider {
                info: provider.info(),
                password_update_allowed: provider.is_password_update_allowed(),
                user_info_update_allowed: provider.is_user_info_update_allowed(),
            })
            .collect()
    }

    pub async fn list_providers(&self) -> AdminResult<Vec<auth_provider_row::Model>> {
        Ok(self.store.list_provider_rows().await?)
    }

    pub async fn show_provider(&self, id: &str) -> AdminResult<auth_provider_row::Model> {
        self.store
            .find_provider_row(id)
            .await?
            .ok_or_else(|| AdminError::not_found("authentication provider", id))
    }

    /// Store `row` and bring the registry in line with its `enabled` flag. An
    /// activation failure is returned but the row stays stored.
    pub async fn add_provider(&self, row: auth_provider_row::Model) -> AdminResult<StoredProvider> {
        let existing = self.store.find_provider_row(&row.id).await?;
        let mut unit = UnitOfWork::begin(&*self.store);
        let provider = if existing.is_some() {
            match unit.merge(Record::ProviderRow(row.clone())) {
                Record::ProviderRow(merged) => merged,
                _ => row,
            }
        } else {
            unit.persist(Record::ProviderRow(row.clone()));
            row
        };
        unit.flush().await?;

        info!(
            provider_id = %provider.id,
            factory_alias = %provider.factory_alias,
            enabled = provider.enabled,
            replaced_row = existing.is_some(),
            "Stored authentication provider row"
        );

        let activation = self.apply_enabled(&provider)?;
        Ok(StoredProvider {
            provider,
            activation,
        })
    }

    /// Set the enabled flag of provider `id` from a textual boolean.
    pub async fn set_enabled(&self, id: &str, body: &str) -> AdminResult<ToggleOutcome> {
        let enable = parse_bool(body).ok_or_else(|| {
            AdminError::invalid_input(format!(
                "Illegal value '{}'. Try 'true' or 'false'",
                body.trim()
            ))
        })?;

        let mut row = self.show_provider(id).await?;
        row.enabled = enable;
        let mut unit = UnitOfWork::begin(&*self.store);
        unit.merge(Record::ProviderRow(row.clone()));
        unit.flush().await?;

        self.apply_enabled(&row)
    }

    fn apply_enabled(&self, row: &auth_provider_row::Model) -> AdminResult<ToggleOutcome> {
        if row.enabled {
            Ok(ToggleOutcome::Enabled(self.registry.enable(row)?))
        } else {
            Ok(ToggleOutcome::Disabled(self.registry.disable(&row.id)))
        }
    }

    /// Deactivate provider `id` and delete its row. Deleting an absent row is
    /// not an error.
    pub async fn delete_provider(&self, id: &str) -> AdminResult<DisableOutcome> {
        let outcome = self.registry.disable(id);

        if self.store.find_provider_row(id).await?.is_some() {
            let mut unit = UnitOfWork::begin(&*self.store);
            unit.remove(RecordKey::ProviderRow(id.to_string()));
            unit.flush().await?;
            info!(provider_id = %id, "Deleted authentication provider row");
        }

        Ok(outcome)
    }

    /// Activate every enabled row. Failures are logged and collected.
    pub async fn activate_enabled(&self) -> AdminResult<ActivationReport> {
        let mut report = ActivationReport::default();

        for row in self.store.list_provider_rows().await? {
            if !row.enabled {
                continue;
            }
            match self.registry.enable(&row) {
                Ok(outcome) => report.activated.push(outcome.provider_id),
                Err(err) => {
                    warn!(
                        provider_id = %row.id,
                        error = %err,
                        "Skipping provider that could not be activated"
                    );
                    report.failed.push((row.id, err.to_string()));
                }
            }
        }

        info!(
            activated = report.activated.len(),
            failed = report.failed.len(),
            "Activated enabled authentication providers"
        );
        Ok(report)
    }
}

fn parse_bool(body: &str) -> Option<bool> {
    match body.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
