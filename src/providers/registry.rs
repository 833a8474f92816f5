//! Authentication provider registry
//!
//! In-memory table of the providers currently serving authentication requests,
//! keyed by provider id. This is the single source of truth for whether a
//! provider is active. Readers share the lock; writers are serialized, and a
//! registration under an active id replaces the incumbent in one step so the
//! id is never briefly absent and never held twice.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{info, warn};

use super::factory::ProviderFactoryRegistry;
use super::trait_::AuthenticationProvider;
use crate::error::AdminError;
use crate::models::auth_provider_row;

/// Non-fatal warning returned alongside a successful result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    /// No provider is left to authenticate anyone
    NoActiveProviders,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::NoActiveProviders => {
                write!(f, "WARNING: no enabled authentication providers left.")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnableOutcome {
    pub provider_id: String,
    /// An instance was already active under this id and has been replaced
    pub replaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisableOutcome {
    pub provider_id: String,
    /// Something was active under this id before the call
    pub was_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<Advisory>,
}

pub struct AuthenticationProviderRegistry {
    factories: Arc<ProviderFactoryRegistry>,
    active: RwLock<HashMap<String, Arc<dyn AuthenticationProvider>>>,
}

impl AuthenticationProviderRegistry {
    /// Create an empty registry resolving factories through `factories`
    pub fn new(factories: Arc<ProviderFactoryRegistry>) -> Self {
        Self {
            factories,
            active: RwLock::new(HashMap::new()),
        }
    }

    pub fn factories(&self) -> &ProviderFactoryRegistry {
        &self.factories
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn AuthenticationProvider>>> {
        self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn AuthenticationProvider>>> {
        self.active.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `provider` eligible for authentication under its id. Returns true
    /// when an incumbent was replaced.
    pub fn register(&self, provider: Arc<dyn AuthenticationProvider>) -> bool {
        let id = provider.id().to_string();
        let (replaced, active) = {
            let mut active = self.write();
            let replaced = active.insert(id.clone(), provider).is_some();
            (replaced, active.len())
        };

        gauge!("auth_providers_active").set(active as f64);
        info!(provider_id = %id, replaced, "Registered authentication provider");
        replaced
    }

    /// Remove the provider registered under `id`. Absent ids are a no-op.
    /// Authentications already holding the provider are unaffected.
    pub fn deregister(&self, id: &str) -> bool {
        let (removed, active) = {
            let mut active = self.write();
            let removed = active.remove(id).is_some();
            (removed, active.len())
        };

        gauge!("auth_providers_active").set(active as f64);
        if removed {
            info!(provider_id = %id, "Deregistered authentication provider");
        }
        removed
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn AuthenticationProvider>> {
        self.read().get(id).cloned()
    }

    /// Ids of all active providers, sorted
    pub fn list_active_ids(&self) -> BTreeSet<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Build a live provider from `row` and activate it, replacing whatever is
    /// active under the same id. On failure the registry is left untouched.
    pub fn enable(&self, row: &auth_provider_row::Model) -> Result<EnableOutcome, AdminError> {
        let factory = self.factories.resolve(&row.factory_alias).inspect_err(|_| {
            warn!(
                provider_id = %row.id,
                factory_alias = %row.factory_alias,
                "No factory registered for provider"
            );
        })?;

        let provider = factory.build(row).map_err(|err| {
            warn!(
                provider_id = %row.id,
                factory_alias = %row.factory_alias,
                error = %err,
                "Error instantiating authentication provider"
            );
            AdminError::Setup {
                provider_id: row.id.clone(),
                cause: err.message,
            }
        })?;

        if provider.id() != row.id {
            return Err(AdminError::Setup {
                provider_id: row.id.clone(),
                cause: format!(
                    "factory '{}' produced a provider with id '{}'",
                    row.factory_alias,
                    provider.id()
                ),
            });
        }

        let replaced = self.register(provider);
        counter!("auth_provider_enabled_total", "provider" => row.id.clone()).increment(1);

        Ok(EnableOutcome {
            provider_id: row.id.clone(),
            replaced,
        })
    }

    /// Deactivate `id`. Always succeeds; the outcome carries an advisory when
    /// no provider remains active.
    pub fn disable(&self, id: &str) -> DisableOutcome {
        let was_active = self.deregister(id);
        counter!("auth_provider_disabled_total", "provider" => id.to_string()).increment(1);

        let advisory = self.is_empty().then_some(Advisory::NoActiveProviders);
        if advisory.is_some() {
            warn!(provider_id = %id, "No enabled authentication providers left");
        }

        DisableOutcome {
            provider_id: id.to_string(),
            was_active,
            advisory,
        }
    }
}

impl fmt::Debug for AuthenticationProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationProviderRegistry")
            .field("factories", &self.factories)
            .field("active", &self.list_active_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::trait_::{ProviderFactory, ProviderInfo, SetupError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Debug)]
    struct TestProvider {
        id: String,
        generation: usize,
    }

    impl TestProvider {
        /// Zero-based build count of the factory when this instance was made
        fn generation(&self) -> usize {
            self.generation
        }
    }

    impl AuthenticationProvider for TestProvider {
        fn id(&self) -> &str {
            &self.id
        }

        fn info(&self) -> ProviderInfo {
            ProviderInfo {
                id: self.id.clone(),
                title: format!("Test {}", self.id),
                subtitle: Some(format!("generation {}", self.generation())),
            }
        }
    }

    /// Counts builds and fails when the payload asks it to
    #[derive(Default)]
    struct TestFactory {
        builds: AtomicUsize,
    }

    impl ProviderFactory for TestFactory {
        fn alias(&self) -> &str {
            "factoryA"
        }

        fn info(&self) -> &str {
            "Factory used in tests"
        }

        fn build(
            &self,
            row: &auth_provider_row::Model,
        ) -> Result<Arc<dyn AuthenticationProvider>, SetupError> {
            if let Some(reason) = row.config.get("fail").and_then(|v| v.as_str()) {
                return Err(SetupError::new(reason));
            }
            let generation = self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(TestProvider {
                id: row.id.clone(),
                generation,
            }))
        }
    }

    fn registry() -> AuthenticationProviderRegistry {
        let mut factories = ProviderFactoryRegistry::new();
        factories.register(Arc::new(TestFactory::default()));
        AuthenticationProviderRegistry::new(Arc::new(factories))
    }

    fn row(id: &str) -> auth_provider_row::Model {
        auth_provider_row::Model::new(id, "factoryA", true)
    }

    #[test]
    fn enable_then_disable_leaves_nothing_registered() {
        let registry = registry();

        registry.enable(&row("p1")).unwrap();
        assert!(registry.is_registered("p1"));

        let outcome = registry.disable("p1");
        assert!(!registry.is_registered("p1"));
        assert!(outcome.was_active);
        assert_eq!(outcome.advisory, Some(Advisory::NoActiveProviders));
    }

    #[test]
    fn enabling_twice_keeps_a_single_instance() {
        let registry = registry();

        let first = registry.enable(&row("p1")).unwrap();
        let second = registry.enable(&row("p1")).unwrap();

        assert!(!first.replaced);
        assert!(second.replaced);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.list_active_ids().into_iter().collect::<Vec<_>>(),
            vec!["p1".to_string()]
        );
    }

    #[test]
    fn disabling_an_inactive_id_is_a_no_op() {
        let registry = registry();
        registry.enable(&row("p2")).unwrap();

        let outcome = registry.disable("p1");
        assert!(!outcome.was_active);
        assert_eq!(outcome.advisory, None);
        assert!(registry.is_registered("p2"));
    }

    #[test]
    fn disabling_with_nothing_active_still_reports_advisory() {
        let registry = registry();
        let outcome = registry.disable("ghost");
        assert!(!outcome.was_active);
        assert_eq!(outcome.advisory, Some(Advisory::NoActiveProviders));
    }

    #[test]
    fn unknown_factory_leaves_registry_unchanged() {
        let registry = registry();
        registry.enable(&row("p1")).unwrap();

        let bad = auth_provider_row::Model::new("p1", "missing", true);
        match registry.enable(&bad) {
            Err(AdminError::FactoryNotFound { alias }) => assert_eq!(alias, "missing"),
            other => panic!("Expected FactoryNotFound, got {:?}", other),
        }
        assert!(registry.is_registered("p1"));
    }

    #[test]
    fn setup_failure_reports_cause_and_keeps_incumbent() {
        let registry = registry();
        registry.enable(&row("p1")).unwrap();
        let incumbent = registry.get("p1").unwrap();

        let bad = row("p1").with_config(json!({ "fail": "missing certificate" }));
        match registry.enable(&bad) {
            Err(AdminError::Setup { provider_id, cause }) => {
                assert_eq!(provider_id, "p1");
                assert_eq!(cause, "missing certificate");
            }
            other => panic!("Expected Setup error, got {:?}", other),
        }

        let still_active = registry.get("p1").unwrap();
        assert!(Arc::ptr_eq(&incumbent, &still_active));
    }

    #[test]
    fn register_overwrites_silently() {
        let registry = registry();
        let first: Arc<dyn AuthenticationProvider> = Arc::new(TestProvider {
            id: "p1".to_string(),
            generation: 0,
        });
        let second: Arc<dyn AuthenticationProvider> = Arc::new(TestProvider {
            id: "p1".to_string(),
            generation: 1,
        });

        assert!(!registry.register(first));
        assert!(registry.register(second.clone()));
        assert!(Arc::ptr_eq(&registry.get("p1").unwrap(), &second));
        assert!(registry.deregister("p1"));
        assert!(!registry.deregister("p1"));
    }

    #[test]
    fn concurrent_enables_never_duplicate_an_id() {
        let registry = Arc::new(registry());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..50 {
                        registry.enable(&row("p1")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 1);
        assert!(registry.is_registered("p1"));
    }

    #[test]
    fn debug_lists_active_ids() {
        let registry = registry();
        registry.enable(&row("p1")).unwrap();
        let rendered = format!("{:?}", registry);
        assert!(rendered.contains("p1"));
        assert!(rendered.contains("factoryA"));
    }

    #[test]
    fn generations_increase_on_reenable() {
        let registry = registry();
        registry.enable(&row("p1")).unwrap();
        registry.enable(&row("p1")).unwrap();
        let provider = registry.get("p1").unwrap();
        assert_eq!(provider.info().subtitle.as_deref(), Some("generation 1"));
        assert_eq!(registry.len(), 1);
    }
}
