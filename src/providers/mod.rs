//! Providers module
//!
//! This module provides the authentication provider plumbing:
//! - The `AuthenticationProvider` and `ProviderFactory` traits
//! - The factory registry resolving a configuration row's factory alias
//! - The registry of currently active providers
//! - The builtin and shibboleth provider implementations

pub mod builtin;
pub mod factory;
pub mod registry;
pub mod shib;
pub mod trait_;

pub use builtin::{BUILTIN_PROVIDER_ID, BuiltinProvider, BuiltinProviderFactory};
pub use factory::{FactoryInfo, ProviderFactoryRegistry};
pub use registry::{Advisory, AuthenticationProviderRegistry, DisableOutcome, EnableOutcome};
pub use shib::{SHIB_PROVIDER_ID, ShibProvider, ShibProviderFactory, ShibSettings};
pub use trait_::{AuthenticationProvider, ProviderFactory, ProviderInfo, SetupError};
