//! Error types for xmlschema-idc
//!
//! This module defines the fatal error types used throughout the library.
//! Identity constraint violations found while validating a document are not
//! errors in this sense: they are reported through
//! [`ErrorReporter`](crate::validators::ErrorReporter) and validation goes on.

use std::fmt;
use thiserror::Error;

use crate::xpath::XPathError;

/// Result type alias using xmlschema-idc Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xmlschema-idc operations
#[derive(Error, Debug)]
pub enum Error {
    /// Schema or constraint definition error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Invalid selector or field pattern
    #[error("xpath error: {0}")]
    XPath(#[from] XPathError),

    /// Value error (lexical form not valid for a type)
    #[error("value error: {0}")]
    Value(String),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML well-formedness error reported by the document reader
    #[error("XML error: {0}")]
    Xml(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Schema or constraint definition error
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Location in the schema file
    pub location: Option<String>,
    /// Schema source that caused the error
    pub source: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            source: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, "\n\nLocation: {}", loc)?;
        }

        if let Some(ref src) = self.source {
            write!(f, "\n\nSource:\n{}", src)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("keyref 'orderRef' must have a 'refer' attribute")
            .with_location("orders.xsd:42:10")
            .with_source("<xs:keyref name='orderRef'/>");

        let msg = format!("{}", err);
        assert!(msg.contains("must have a 'refer' attribute"));
        assert!(msg.contains("Location:"));
        assert!(msg.contains("Source:"));
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ParseError::new("test").into();
        assert!(matches!(err, Error::Parse(_)));

        let err: Error = XPathError::Empty.into();
        assert!(matches!(err, Error::XPath(_)));
        assert!(err.to_string().starts_with("xpath error:"));
    }
}
