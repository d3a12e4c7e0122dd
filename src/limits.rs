//! Limits and constraints for document processing
//!
//! These limits bound the resources a single validation pass may consume.
//! They are enforced by the document driver; exceeding one aborts the pass
//! the same way a well-formedness error does.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum element nesting depth
    pub max_xml_depth: usize,

    /// Maximum XML input size in bytes
    pub max_xml_size: usize,

    /// Maximum number of attributes per element
    pub max_attributes: usize,

    /// Maximum number of simultaneously open scope instances
    pub max_open_scopes: usize,

    /// Maximum number of keyref tuples waiting for the end of the document
    pub max_deferred_keyrefs: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xml_depth: 1000,
            max_xml_size: 100 * 1024 * 1024, // 100 MB
            max_attributes: 1000,
            max_open_scopes: 10_000,
            max_deferred_keyrefs: 1_000_000,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_xml_depth: 100,
            max_xml_size: 10 * 1024 * 1024, // 10 MB
            max_attributes: 100,
            max_open_scopes: 1_000,
            max_deferred_keyrefs: 100_000,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_xml_depth: 10_000,
            max_xml_size: 1024 * 1024 * 1024, // 1 GB
            max_attributes: 10_000,
            max_open_scopes: 1_000_000,
            max_deferred_keyrefs: 100_000_000,
        }
    }

    /// Load limits from a JSON document; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check if XML depth is within limits
    pub fn check_xml_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_xml_depth {
            Err(Error::LimitExceeded(format!(
                "XML depth {} exceeds maximum {}",
                depth, self.max_xml_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if XML size is within limits
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        if size > self.max_xml_size {
            Err(Error::LimitExceeded(format!(
                "XML size {} bytes exceeds maximum {} bytes",
                size, self.max_xml_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if number of attributes is within limits
    pub fn check_attributes(&self, count: usize) -> Result<()> {
        if count > self.max_attributes {
            Err(Error::LimitExceeded(format!(
                "Attribute count {} exceeds maximum {}",
                count, self.max_attributes
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the number of open scope instances is within limits
    pub fn check_open_scopes(&self, count: usize) -> Result<()> {
        if count > self.max_open_scopes {
            Err(Error::LimitExceeded(format!(
                "Open scope count {} exceeds maximum {}",
                count, self.max_open_scopes
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the number of deferred keyref tuples is within limits
    pub fn check_deferred_keyrefs(&self, count: usize) -> Result<()> {
        if count > self.max_deferred_keyrefs {
            Err(Error::LimitExceeded(format!(
                "Deferred keyref count {} exceeds maximum {}",
                count, self.max_deferred_keyrefs
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_xml_depth, 1000);
        assert!(limits.check_xml_depth(500).is_ok());
        assert!(limits.check_xml_depth(1500).is_err());
    }

    #[test]
    fn test_strict_limits() {
        let limits = Limits::strict();
        assert!(limits.max_xml_depth < Limits::default().max_xml_depth);
        assert!(limits.check_xml_depth(150).is_err());
        assert!(limits.check_open_scopes(1_001).is_err());
    }

    #[test]
    fn test_permissive_limits() {
        let limits = Limits::permissive();
        assert!(limits.max_xml_depth > Limits::default().max_xml_depth);
        assert!(limits.check_xml_depth(5000).is_ok());
    }

    #[test]
    fn test_check_xml_size() {
        let limits = Limits::default();
        assert!(limits.check_xml_size(1024).is_ok());
        assert!(limits.check_xml_size(200 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_limits_from_partial_json() {
        let limits = Limits::from_json(r#"{"max_xml_depth": 8}"#).unwrap();
        assert_eq!(limits.max_xml_depth, 8);
        assert_eq!(limits.max_attributes, Limits::default().max_attributes);

        assert!(matches!(
            Limits::from_json("{not json"),
            Err(Error::Json(_))
        ));
    }
}
