//! # Validation Errors
//!
//! Local input problems. These never leave the client: a value that fails
//! validation blocks stage advancement until the caller corrects it.

use thiserror::Error;

/// Input validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Pairing code is empty or whitespace.
    #[error("device code must be non-empty")]
    EmptyDeviceCode,

    /// An identifier of the named kind is empty.
    #[error("{kind} must be non-empty")]
    EmptyIdentifier {
        /// Which identifier was empty (e.g. "child id").
        kind: &'static str,
    },

    /// A bearer token or credential is empty.
    #[error("{kind} must be non-empty")]
    EmptySecret {
        /// Which secret was empty.
        kind: &'static str,
    },

    /// A new child profile has no name.
    #[error("child name is required")]
    MissingChildName,

    /// A new child profile has no date of birth.
    #[error("child date of birth is required")]
    MissingDateOfBirth,

    /// Date of birth could not be parsed as `YYYY-MM-DD`.
    #[error("invalid date of birth \"{0}\" (expected YYYY-MM-DD)")]
    InvalidDateOfBirth(String),

    /// Date of birth lies after the reference date.
    #[error("date of birth {dob} is after {today}")]
    DateOfBirthInFuture {
        /// The rejected date of birth.
        dob: chrono::NaiveDate,
        /// The reference date.
        today: chrono::NaiveDate,
    },

    /// An operation required a selected child but none was chosen.
    #[error("no child selected")]
    NoChildSelected,

    /// The selected child is not among the operator's known children.
    #[error("child {0} is not a known child of this operator")]
    UnknownChild(String),

    /// The selected app does not exist in the catalog.
    #[error("app {0} is not in the catalog")]
    UnknownApp(String),

    /// The selected app exists but is not offered for the child's age.
    #[error("app {app} is not available for age {age}")]
    AppNotEligible {
        /// The rejected app.
        app: String,
        /// The child's derived age.
        age: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identifier_display_names_kind() {
        let err = ValidationError::EmptyIdentifier { kind: "child id" };
        assert_eq!(format!("{err}"), "child id must be non-empty");
    }

    #[test]
    fn app_not_eligible_display_includes_age() {
        let err = ValidationError::AppNotEligible {
            app: "tiktok".into(),
            age: 8,
        };
        let msg = format!("{err}");
        assert!(msg.contains("tiktok"));
        assert!(msg.contains('8'));
    }
}
