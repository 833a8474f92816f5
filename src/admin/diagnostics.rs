//! Constraint diagnostic translator
//!
//! Turns a failure raised by a collaborator into either a list of structured
//! field diagnostics (when a record failed validation somewhere in the cause
//! chain) or an opaque message taken from the deepest cause.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// One field of one record that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    /// Identity of the record the field belongs to, e.g. `BuiltinUser[jdoe]`
    pub owner_record_id: String,
    pub field_path: String,
    pub invalid_value: String,
    pub message: String,
}

impl ConstraintViolation {
    pub fn new(
        owner_record_id: impl Into<String>,
        field_path: impl Into<String>,
        invalid_value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            owner_record_id: owner_record_id.into(),
            field_path: field_path.into(),
            invalid_value: invalid_value.into(),
            message: message.into(),
        }
    }
}

/// A record was rejected by field validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} constraint violation(s)", .violations.len())]
pub struct ValidationFailure {
    pub violations: Vec<ConstraintViolation>,
}

impl ValidationFailure {
    pub fn new(violations: Vec<ConstraintViolation>) -> Self {
        Self { violations }
    }

    pub fn single(violation: ConstraintViolation) -> Self {
        Self {
            violations: vec![violation],
        }
    }
}

/// Machine-readable form of a [`ConstraintViolation`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub owner_record_id: String,
    pub field_path: String,
    pub invalid_value: String,
    pub message: String,
}

impl Diagnostic {
    /// User-facing line. The owning record is left out.
    pub fn summary(&self) -> String {
        format!(
            "Invalid value: <<<{}>>> for {} - {}",
            self.invalid_value, self.field_path, self.message
        )
    }

    /// Operator-facing line including the owning record
    pub fn log_line(&self) -> LogLine<'_> {
        LogLine(self)
    }
}

pub struct LogLine<'a>(&'a Diagnostic);

impl fmt::Display for LogLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid value: <<<{}>>> for {} at {} - {}",
            self.0.invalid_value, self.0.field_path, self.0.owner_record_id, self.0.message
        )
    }
}

impl From<&ConstraintViolation> for Diagnostic {
    fn from(violation: &ConstraintViolation) -> Self {
        Self {
            owner_record_id: violation.owner_record_id.clone(),
            field_path: violation.field_path.clone(),
            invalid_value: violation.invalid_value.clone(),
            message: violation.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    Violations(Vec<Diagnostic>),
    /// No validation failure in the chain; carries the deepest cause's message
    Opaque(String),
}

/// Walk the cause chain of `error` and extract field diagnostics from the
/// first validation failure found.
pub fn translate(error: &anyhow::Error) -> Translation {
    for cause in error.chain() {
        if let Some(failure) = cause.downcast_ref::<ValidationFailure>() {
            return Translation::Violations(failure.violations.iter().map(Diagnostic::from).collect());
        }
    }

    Translation::Opaque(error.root_cause().to_string())
}

/// Join diagnostics into one operator log message
pub fn render_log(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|diagnostic| diagnostic.log_line().to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn bad_email() -> ConstraintViolation {
        ConstraintViolation::new(
            "BuiltinUser[jdoe]",
            "email",
            "not-an-email",
            "is not a valid email address",
        )
    }

    #[test]
    fn direct_validation_failure_is_translated() {
        let error = anyhow::Error::new(ValidationFailure::single(bad_email()));

        match translate(&error) {
            Translation::Violations(diagnostics) => {
                assert_eq!(diagnostics.len(), 1);
                assert_eq!(diagnostics[0].field_path, "email");
                assert_eq!(diagnostics[0].owner_record_id, "BuiltinUser[jdoe]");
            }
            other => panic!("Expected violations, got {:?}", other),
        }
    }

    #[test]
    fn wrapped_validation_failure_is_found_in_chain() {
        let error = Err::<(), _>(ValidationFailure::single(bad_email()))
            .context("persisting builtin user")
            .context("converting account")
            .unwrap_err();

        assert!(matches!(translate(&error), Translation::Violations(d) if d.len() == 1));
    }

    #[test]
    fn other_failures_report_deepest_message() {
        let error = Err::<(), _>(std::io::Error::other("socket closed"))
            .context("writing credential")
            .unwrap_err();

        assert_eq!(
            translate(&error),
            Translation::Opaque("socket closed".to_string())
        );
    }

    #[test]
    fn summary_omits_owner_and_log_line_includes_it() {
        let diagnostic = Diagnostic::from(&bad_email());

        assert_eq!(
            diagnostic.summary(),
            "Invalid value: <<<not-an-email>>> for email - is not a valid email address"
        );
        let logged = diagnostic.log_line().to_string();
        assert!(logged.contains("at BuiltinUser[jdoe]"));
        assert!(!diagnostic.summary().contains("BuiltinUser"));
    }

    #[test]
    fn diagnostics_serialize_with_all_fields() {
        let value = serde_json::to_value(Diagnostic::from(&bad_email())).unwrap();
        assert_eq!(value["owner_record_id"], "BuiltinUser[jdoe]");
        assert_eq!(value["field_path"], "email");
        assert_eq!(value["invalid_value"], "not-an-email");
    }
}
