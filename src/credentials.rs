//! Builtin credential provisioning
//!
//! Creates the locally managed credential an externally authenticated account
//! is converted to. Field validation failures are raised as
//! [`ValidationFailure`] so callers can report them per field.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use crate::admin::diagnostics::{ConstraintViolation, ValidationFailure};
use crate::models::{authenticated_user, builtin_user};
use crate::persistence::{PersistenceFacade, Record, RecordKey, UnitOfWork};

const USERNAME_MAX_LEN: usize = 255;
const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$";
const USERNAME_PATTERN: &str = r"^[A-Za-z0-9._@\-]+$";

/// Creates builtin credentials for accounts leaving an external provider
#[async_trait]
pub trait BuiltinCredentialService: Send + Sync {
    /// Provision a builtin credential for `user` under `new_email`. The email
    /// is stored as given; callers normalise it.
    ///
    /// `Ok(None)` means the credential could not be created for a reason the
    /// service does not explain.
    async fn convert_from_external(
        &self,
        user: &authenticated_user::Model,
        new_email: &str,
    ) -> anyhow::Result<Option<builtin_user::Model>>;
}

/// Credential service writing `builtin_users` rows through the persistence facade
pub struct StoreCredentialService {
    store: Arc<dyn PersistenceFacade>,
    email_pattern: Regex,
    username_pattern: Regex,
}

impl StoreCredentialService {
    pub fn new(store: Arc<dyn PersistenceFacade>) -> Result<Self, regex::Error> {
        Ok(Self {
            store,
            email_pattern: Regex::new(EMAIL_PATTERN)?,
            username_pattern: Regex::new(USERNAME_PATTERN)?,
        })
    }

    fn validate(&self, candidate: &builtin_user::Model) -> Vec<ConstraintViolation> {
        let owner = RecordKey::BuiltinUser(candidate.user_name.clone()).to_string();
        let mut violations = Vec::new();

        if candidate.user_name.is_empty() {
            violations.push(ConstraintViolation::new(
                &owner,
                "userName",
                "",
                "Please enter a username.",
            ));
        } else if candidate.user_name.chars().count() > USERNAME_MAX_LEN {
            violations.push(ConstraintViolation::new(
                &owner,
                "userName",
                &candidate.user_name,
                format!("Username must be at most {USERNAME_MAX_LEN} characters."),
            ));
        } else if !self.username_pattern.is_match(&candidate.user_name) {
            violations.push(ConstraintViolation::new(
                &owner,
                "userName",
                &candidate.user_name,
                "Found an illegal character(s). Valid characters are a-Z, 0-9, '_', '-', '.' and '@'.",
            ));
        }

        if !self.email_pattern.is_match(&candidate.email) {
            violations.push(ConstraintViolation::new(
                &owner,
                "email",
                &candidate.email,
                "is not a valid email address.",
            ));
        }

        violations
    }
}

#[async_trait]
impl BuiltinCredentialService for StoreCredentialService {
    async fn convert_from_external(
        &self,
        user: &authenticated_user::Model,
        new_email: &str,
    ) -> anyhow::Result<Option<builtin_user::Model>> {
        let candidate = builtin_user::Model {
            user_name: user.user_identifier.clone(),
            email: new_email.to_string(),
            password_hash: None,
        };

        let mut violations = self.validate(&candidate);
        if violations.is_empty()
            && self
                .store
                .find_builtin_user(&candidate.user_name)
                .await
                .context("checking for an existing builtin user")?
                .is_some()
        {
            violations.push(ConstraintViolation::new(
                RecordKey::BuiltinUser(candidate.user_name.clone()).to_string(),
                "userName",
                &candidate.user_name,
                "This username is already taken.",
            ));
        }
        if !violations.is_empty() {
            debug!(
                user_id = user.id,
                violations = violations.len(),
                "Builtin credential rejected by validation"
            );
            return Err(ValidationFailure::new(violations).into());
        }

        let mut unit = UnitOfWork::begin(&*self.store);
        unit.persist(Record::BuiltinUser(candidate.clone()));
        unit.flush().await.context("writing builtin user")?;

        info!(
            user_id = user.id,
            username = %candidate.user_name,
            "Created builtin credential"
        );
        Ok(Some(candidate))
    }
}
