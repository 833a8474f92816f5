//! Administrative operations
//!
//! - Provider configuration and activation (`providers`)
//! - Conversion of externally authenticated accounts to builtin (`migration`)
//! - Field diagnostics for validation failures (`diagnostics`)

pub mod diagnostics;
pub mod migration;
pub mod providers;

pub use migration::{AccountMigration, ConversionResult};
pub use providers::{ActivationReport, ActiveProvider, ProviderAdmin, StoredProvider, ToggleOutcome};

use crate::models::authenticated_user;

/// Who is invoking an administrative operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    Authenticated(authenticated_user::Model),
}

impl Caller {
    pub fn is_superuser(&self) -> bool {
        matches!(self, Caller::Authenticated(user) if user.superuser)
    }
}
