//! Identity constraint violations
//!
//! Violations are not Rust errors: validation carries on after each one.
//! They are handed to an [`ErrorReporter`], the downstream collaborator that
//! decides what to do with them (collect, print, count).

use std::fmt;

use serde::{Serialize, Serializer};

use crate::namespaces::QName;

/// Taxonomy of identity constraint violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    /// A key field matched nil content
    KeyMatchesNillable,
    /// A field matched more than once within one scope
    FieldMultipleMatch,
    /// A key scope finalized with an empty or nil required field
    AbsentKeyValue,
    /// Tuple collision within a key's table
    DuplicateKeyValue,
    /// Tuple collision within a unique's table
    DuplicateUniqueValue,
    /// A keyref tuple has no matching entry in its target's table
    KeyRefNotFound,
    /// A selector or field pattern does not compile
    InvalidFieldPath,
    /// A field selected an element without simple content
    FieldNotSimpleContent,
}

impl ErrorCode {
    /// The XSD 1.0 validation rule this code corresponds to
    pub fn rule(&self) -> &'static str {
        match self {
            ErrorCode::KeyMatchesNillable => "cvc-identity-constraint.4.2.3",
            ErrorCode::FieldMultipleMatch => "cvc-identity-constraint.3",
            ErrorCode::AbsentKeyValue => "cvc-identity-constraint.4.2.1",
            ErrorCode::DuplicateKeyValue => "cvc-identity-constraint.4.2.2",
            ErrorCode::DuplicateUniqueValue => "cvc-identity-constraint.4.1",
            ErrorCode::KeyRefNotFound => "cvc-identity-constraint.4.3",
            ErrorCode::InvalidFieldPath => "c-fields-xpaths",
            ErrorCode::FieldNotSimpleContent => "cvc-identity-constraint.3",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn serialize_display<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// One reported identity constraint violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintViolation {
    /// What went wrong
    pub code: ErrorCode,
    /// Name of the violated constraint
    #[serde(serialize_with = "serialize_display")]
    pub constraint: QName,
    /// Element the violation is attributed to
    #[serde(serialize_with = "serialize_display")]
    pub element: QName,
    /// String form of the offending tuple, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,
}

impl ConstraintViolation {
    /// Create a violation without a tuple
    pub fn new(code: ErrorCode, constraint: QName, element: QName) -> Self {
        Self {
            code,
            constraint,
            element,
            values: None,
        }
    }

    /// Attach the tuple's string form
    pub fn with_values(mut self, values: impl Into<String>) -> Self {
        self.values = Some(values.into());
        self
    }

    /// Human readable description of the violation
    pub fn message(&self) -> String {
        let values = self.values.as_deref().unwrap_or("");
        match self.code {
            ErrorCode::KeyMatchesNillable => format!(
                "field of key '{}' matched nil content of element {}",
                self.constraint, self.element
            ),
            ErrorCode::FieldMultipleMatch => format!(
                "a field of '{}' matched more than one node in scope {}",
                self.constraint, self.element
            ),
            ErrorCode::AbsentKeyValue => format!(
                "key '{}' has an absent or nil field value for element {}",
                self.constraint, self.element
            ),
            ErrorCode::DuplicateKeyValue => format!(
                "duplicate key value {} for '{}' at element {}",
                values, self.constraint, self.element
            ),
            ErrorCode::DuplicateUniqueValue => format!(
                "duplicate unique value {} for '{}' at element {}",
                values, self.constraint, self.element
            ),
            ErrorCode::KeyRefNotFound => format!(
                "key value {} referenced from element {} not found for '{}'",
                values, self.element, self.constraint
            ),
            ErrorCode::InvalidFieldPath => format!(
                "invalid selector or field path in '{}': {}",
                self.constraint, values
            ),
            ErrorCode::FieldNotSimpleContent => format!(
                "a field of '{}' selected element {} which has no simple content",
                self.constraint, self.element
            ),
        }
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.code, self.code.rule(), self.message())
    }
}

/// Downstream collaborator receiving constraint violations
pub trait ErrorReporter {
    /// Receive one violation; validation continues afterwards
    fn report_constraint_error(&mut self, violation: ConstraintViolation);
}

impl<R: ErrorReporter + ?Sized> ErrorReporter for &mut R {
    fn report_constraint_error(&mut self, violation: ConstraintViolation) {
        (**self).report_constraint_error(violation)
    }
}

impl<R: ErrorReporter + ?Sized> ErrorReporter for Box<R> {
    fn report_constraint_error(&mut self, violation: ConstraintViolation) {
        (**self).report_constraint_error(violation)
    }
}

/// Reporter that keeps every violation in report order
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    violations: Vec<ConstraintViolation>,
}

impl CollectingReporter {
    /// Create an empty reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Reported violations, in report order
    pub fn violations(&self) -> &[ConstraintViolation] {
        &self.violations
    }

    /// Codes of the reported violations, in report order
    pub fn codes(&self) -> Vec<ErrorCode> {
        self.violations.iter().map(|v| v.code).collect()
    }

    /// Number of violations reported with `code`
    pub fn count(&self, code: ErrorCode) -> usize {
        self.violations.iter().filter(|v| v.code == code).count()
    }

    /// Check if nothing was reported
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of reported violations
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Drop everything reported so far
    pub fn clear(&mut self) {
        self.violations.clear();
    }

    /// Take the reported violations, leaving the reporter empty
    pub fn take(&mut self) -> Vec<ConstraintViolation> {
        std::mem::take(&mut self.violations)
    }
}

impl ErrorReporter for CollectingReporter {
    fn report_constraint_error(&mut self, violation: ConstraintViolation) {
        self.violations.push(violation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(code: ErrorCode) -> ConstraintViolation {
        ConstraintViolation::new(code, QName::local("itemKey"), QName::local("item"))
    }

    #[test]
    fn test_collecting_reporter() {
        let mut reporter = CollectingReporter::new();
        assert!(reporter.is_empty());

        reporter.report_constraint_error(violation(ErrorCode::AbsentKeyValue));
        reporter.report_constraint_error(violation(ErrorCode::DuplicateKeyValue).with_values("(1)"));

        assert_eq!(reporter.len(), 2);
        assert_eq!(
            reporter.codes(),
            vec![ErrorCode::AbsentKeyValue, ErrorCode::DuplicateKeyValue]
        );
        assert_eq!(reporter.count(ErrorCode::DuplicateKeyValue), 1);
        assert_eq!(reporter.take().len(), 2);
        assert!(reporter.is_empty());
    }

    #[test]
    fn test_reporter_through_mut_ref() {
        fn report_into<R: ErrorReporter>(mut reporter: R) {
            reporter.report_constraint_error(violation(ErrorCode::KeyRefNotFound));
        }

        let mut reporter = CollectingReporter::new();
        report_into(&mut reporter);
        assert_eq!(reporter.codes(), vec![ErrorCode::KeyRefNotFound]);
    }

    #[test]
    fn test_violation_display() {
        let v = violation(ErrorCode::DuplicateUniqueValue).with_values("(1)");
        let text = v.to_string();
        assert!(text.starts_with("DuplicateUniqueValue [cvc-identity-constraint.4.1]"));
        assert!(text.contains("(1)"));
        assert!(text.contains("itemKey"));
    }

    #[test]
    fn test_violation_serializes_names_as_strings() {
        let v = ConstraintViolation::new(
            ErrorCode::KeyRefNotFound,
            QName::namespaced("urn:a", "ref"),
            QName::local("order"),
        )
        .with_values("(9)");
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["code"], "KeyRefNotFound");
        assert_eq!(json["constraint"], "{urn:a}ref");
        assert_eq!(json["element"], "order");
        assert_eq!(json["values"], "(9)");

        let bare = serde_json::to_value(violation(ErrorCode::AbsentKeyValue)).unwrap();
        assert!(bare.get("values").is_none());
    }
}
