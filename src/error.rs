//! # Error Handling
//!
//! Unified error taxonomy for provider administration and account conversion.
//! Every failure carries a stable code, a response class and a human-readable
//! message; [`Problem`] is the serializable form handed to whatever surface
//! sits above this crate.

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::admin::diagnostics::Diagnostic;
use crate::persistence::StorageError;

/// How a result should be surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseClass {
    Success,
    /// Bad input, forbidden or not found
    ClientError,
    /// Unexpected or storage failure
    ServerError,
}

/// Why a user's current state does not allow conversion
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateViolation {
    #[error("does not have an 'authenticateduserlookup' row")]
    NoLookupRecord,
    #[error("provider id is null")]
    NoProviderId,
    #[error(
        "cannot be converted because current provider id is '{actual}' rather than '{expected}'"
    )]
    WrongProvider { actual: String, expected: String },
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Superusers only.")]
    Forbidden,

    #[error("Can't find {entity} with id '{id}'")]
    NotFound { entity: &'static str, id: String },

    #[error("User id {user_id} {violation}")]
    InvalidState {
        user_id: i64,
        violation: StateViolation,
    },

    #[error("{message}")]
    InvalidInput { message: String },

    #[error("Can't instantiate provider, as there's no factory with alias {alias}")]
    FactoryNotFound { alias: String },

    #[error("Can't instantiate provider '{provider_id}': {cause}")]
    Setup { provider_id: String, cause: String },

    #[error(
        "User id {user_id} could not be converted to builtin:{}",
        render_violations(.violations)
    )]
    ValidationFailed {
        user_id: i64,
        violations: Vec<Diagnostic>,
    },

    #[error("User id {user_id} could not be converted to builtin")]
    ConversionFailed { user_id: i64 },

    #[error("User id {user_id} cannot be converted due to unexpected failure: {cause}")]
    ConversionUnexpected { user_id: i64, cause: String },

    #[error("{}", partial_conversion_message(.user_id, .cause))]
    PartialConversion {
        user_id: i64,
        lookup_id: i64,
        username: String,
        cause: StorageError,
    },

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
}

fn render_violations(violations: &[Diagnostic]) -> String {
    violations
        .iter()
        .map(|violation| format!(" {}", violation.summary()))
        .collect()
}

fn partial_conversion_message(user_id: &i64, cause: &StorageError) -> String {
    if cause.is_database_failure() {
        format!(
            "User id {user_id} only half converted to builtin and may not be able to log in. \
             {PARTIAL_CONVERSION_REMEDIATION}"
        )
    } else {
        format!(
            "User id {user_id} only half converted to builtin and may not be able to log in \
             due to unexpected failure ({cause}). {PARTIAL_CONVERSION_REMEDIATION}"
        )
    }
}

/// Operator instructions attached to every half-applied conversion
pub const PARTIAL_CONVERSION_REMEDIATION: &str = "Manual changes may be necessary on \
     'authenticationproviderid' and 'persistentuserid' on 'authenticateduserlookup' table \
     and 'email' on 'authenticateduser' table.";

impl AdminError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn response_class(&self) -> ResponseClass {
        match self {
            AdminError::Forbidden
            | AdminError::NotFound { .. }
            | AdminError::InvalidState { .. }
            | AdminError::InvalidInput { .. }
            | AdminError::FactoryNotFound { .. }
            | AdminError::Setup { .. }
            | AdminError::ValidationFailed { .. }
            | AdminError::ConversionFailed { .. } => ResponseClass::ClientError,
            AdminError::ConversionUnexpected { .. }
            | AdminError::PartialConversion { .. }
            | AdminError::Storage(_) => ResponseClass::ServerError,
        }
    }

    /// Error code for programmatic handling (SCREAMING_SNAKE_CASE)
    pub fn error_code(&self) -> &'static str {
        match self {
            AdminError::Forbidden => "FORBIDDEN",
            AdminError::NotFound { .. } => "NOT_FOUND",
            AdminError::InvalidState { .. } => "INVALID_STATE",
            AdminError::InvalidInput { .. } => "INVALID_INPUT",
            AdminError::FactoryNotFound { .. } => "FACTORY_NOT_FOUND",
            AdminError::Setup { .. } => "PROVIDER_SETUP_FAILED",
            AdminError::ValidationFailed { .. } => "VALIDATION_FAILED",
            AdminError::ConversionFailed { .. } => "CONVERSION_FAILED",
            AdminError::ConversionUnexpected { .. } => "CONVERSION_ERROR",
            AdminError::PartialConversion { .. } => "PARTIAL_CONVERSION",
            AdminError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Structured details, when the error carries any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AdminError::ValidationFailed { violations, .. } => {
                Some(json!({ "violations": violations }))
            }
            AdminError::InvalidState {
                violation: StateViolation::WrongProvider { actual, expected },
                ..
            } => Some(json!({ "actual": actual, "expected": expected })),
            AdminError::PartialConversion {
                user_id,
                lookup_id,
                username,
                ..
            } => Some(json!({
                "user_id": user_id,
                "lookup_id": lookup_id,
                "builtin_username": username,
                "remediation": PARTIAL_CONVERSION_REMEDIATION,
            })),
            _ => None,
        }
    }

    pub fn to_problem(&self) -> Problem {
        Problem {
            class: self.response_class(),
            code: self.error_code(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

/// Serializable error body
#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    pub class: ResponseClass,
    /// Error code for programmatic handling
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

pub type AdminResult<T> = Result<T, AdminError>;
