//! Provider factory registry
//!
//! Read-mostly directory mapping a factory alias to the capability that builds
//! live providers from configuration rows.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::builtin::BuiltinProviderFactory;
use super::shib::ShibProviderFactory;
use super::trait_::ProviderFactory;
use crate::error::AdminError;

/// Alias and description of a registered factory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactoryInfo {
    pub alias: String,
    pub info: String,
}

#[derive(Clone, Default)]
pub struct ProviderFactoryRegistry {
    factories: HashMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderFactoryRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the builtin and shibboleth factories wired in
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BuiltinProviderFactory));
        registry.register(Arc::new(ShibProviderFactory));
        registry
    }

    /// Register a factory under its alias, replacing any previous one
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(factory.alias().to_string(), factory);
    }

    /// All factories, sorted by alias for stable ordering
    pub fn list_factories(&self) -> Vec<FactoryInfo> {
        let mut infos: Vec<_> = self
            .factories
            .values()
            .map(|factory| FactoryInfo {
                alias: factory.alias().to_string(),
                info: factory.info().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.alias.cmp(&b.alias));
        infos
    }

    pub fn resolve(&self, alias: &str) -> Result<Arc<dyn ProviderFactory>, AdminError> {
        self.factories
            .get(alias)
            .cloned()
            .ok_or_else(|| AdminError::FactoryNotFound {
                alias: alias.to_string(),
            })
    }
}

impl fmt::Debug for ProviderFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut aliases: Vec<_> = self.factories.keys().collect();
        aliases.sort();
        f.debug_struct("ProviderFactoryRegistry")
            .field("aliases", &aliases)
            .finish()
    }
}
