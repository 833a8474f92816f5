//! Account migration workflow
//!
//! Converts an account authenticated by the external (shibboleth) provider to
//! the builtin provider. Conversion runs in two phases:
//!
//! 1. The credential service creates the builtin credential. Any failure here
//!    leaves the account untouched.
//! 2. The account's lookup record is repointed at the builtin provider and its
//!    email replaced. These writes go through the persistence facade without
//!    a surrounding transaction; a failure part-way is reported as
//!    [`AdminError::PartialConversion`] with the details an operator needs to
//!    finish the job by hand. The credential from phase 1 is kept.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::Caller;
use super::diagnostics::{Translation, render_log, translate};
use crate::credentials::BuiltinCredentialService;
use crate::error::{AdminError, AdminResult, StateViolation};
use crate::models::{authenticated_user, builtin_user, user_lookup};
use crate::persistence::{PersistenceFacade, Record, StorageResult, UnitOfWork};
use crate::providers::{BUILTIN_PROVIDER_ID, SHIB_PROVIDER_ID};

/// Returned on a completed conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    pub email: String,
    pub username: String,
}

pub struct AccountMigration {
    store: Arc<dyn PersistenceFacade>,
    credentials: Arc<dyn BuiltinCredentialService>,
    external_provider_id: String,
    builtin_provider_id: String,
}

impl AccountMigration {
    pub fn new(
        store: Arc<dyn PersistenceFacade>,
        credentials: Arc<dyn BuiltinCredentialService>,
    ) -> Self {
        Self {
            store,
            credentials,
            external_provider_id: SHIB_PROVIDER_ID.to_string(),
            builtin_provider_id: BUILTIN_PROVIDER_ID.to_string(),
        }
    }

    /// Override the provider ids accounts are migrated from and to
    pub fn with_provider_ids(
        mut self,
        external_provider_id: impl Into<String>,
        builtin_provider_id: impl Into<String>,
    ) -> Self {
        self.external_provider_id = external_provider_id.into();
        self.builtin_provider_id = builtin_provider_id.into();
        self
    }

    /// Convert user `user_id` to the builtin provider, setting `new_email` as
    /// the account email. Surrounding whitespace is dropped and the same
    /// address goes to the credential and the account.
    #[instrument(skip(self, caller, new_email))]
    pub async fn convert_to_builtin(
        &self,
        caller: &Caller,
        user_id: i64,
        new_email: &str,
    ) -> AdminResult<ConversionResult> {
        let result = self.convert(caller, user_id, new_email).await;
        let outcome = match &result {
            Ok(_) => "converted",
            Err(AdminError::PartialConversion { .. }) => "partial",
            Err(err) => err.error_code(),
        };
        counter!("account_conversion_total", "outcome" => outcome).increment(1);
        result
    }

    async fn convert(
        &self,
        caller: &Caller,
        user_id: i64,
        new_email: &str,
    ) -> AdminResult<ConversionResult> {
        if !caller.is_superuser() {
            return Err(AdminError::Forbidden);
        }
        let new_email = new_email.trim();

        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AdminError::not_found("user", user_id))?;

        let lookup = self
            .store
            .find_lookup_for_user(user_id)
            .await?
            .ok_or(AdminError::InvalidState {
                user_id,
                violation: StateViolation::NoLookupRecord,
            })?;

        let Some(provider_id) = lookup.authentication_provider_id.as_deref() else {
            return Err(AdminError::InvalidState {
                user_id,
                violation: StateViolation::NoProviderId,
            });
        };
        if provider_id != self.external_provider_id {
            return Err(AdminError::InvalidState {
                user_id,
                violation: StateViolation::WrongProvider {
                    actual: provider_id.to_string(),
                    expected: self.external_provider_id.clone(),
                },
            });
        }

        let credential = self.provision_credential(&user, new_email).await?;

        if let Err(cause) = self.repoint_account(user, lookup.clone(), new_email).await {
            warn!(
                user_id,
                lookup_id = lookup.id,
                username = %credential.user_name,
                error = %cause,
                "Account only half converted to builtin"
            );
            return Err(AdminError::PartialConversion {
                user_id,
                lookup_id: lookup.id,
                username: credential.user_name,
                cause,
            });
        }

        info!(
            user_id,
            username = %credential.user_name,
            "Converted account to builtin"
        );
        Ok(ConversionResult {
            email: credential.email,
            username: credential.user_name,
        })
    }

    async fn provision_credential(
        &self,
        user: &authenticated_user::Model,
        new_email: &str,
    ) -> AdminResult<builtin_user::Model> {
        let user_id = user.id;
        match self.credentials.convert_from_external(user, new_email).await {
            Ok(Some(credential)) => Ok(credential),
            Ok(None) => Err(AdminError::ConversionFailed { user_id }),
            Err(err) => match translate(&err) {
                Translation::Violations(violations) => {
                    warn!(
                        user_id,
                        violations = %render_log(&violations),
                        "Account cannot be converted to builtin"
                    );
                    Err(AdminError::ValidationFailed {
                        user_id,
                        violations,
                    })
                }
                Translation::Opaque(cause) => {
                    warn!(user_id, error = %cause, "Unexpected failure converting account");
                    Err(AdminError::ConversionUnexpected { user_id, cause })
                }
            },
        }
    }

    async fn repoint_account(
        &self,
        mut user: authenticated_user::Model,
        mut lookup: user_lookup::Model,
        new_email: &str,
    ) -> StorageResult<()> {
        let mut unit = UnitOfWork::begin(&*self.store);
        lookup.authentication_provider_id = Some(self.builtin_provider_id.clone());
        lookup.persistent_user_id = Some(user.user_identifier.clone());
        unit.persist(Record::Lookup(lookup));

        user.email = new_email.to_string();
        unit.persist(Record::User(user));

        unit.flush().await
    }
}
