//! XSD Identity Constraints
//!
//! This module implements the definitions of identity constraints:
//! - xs:unique - Ensures values are unique within scope
//! - xs:key - Like unique, but all field values must be present
//! - xs:keyref - References a key/unique constraint (foreign key)
//!
//! Definitions are immutable once built and shared through `Arc` by every
//! scope instance they spawn.

use std::sync::Arc;

use crate::error::{ParseError, Result};
use crate::names::validate_ncname;
use crate::namespaces::{NamespaceContext, QName};
use crate::xpath::{PathExpression, PathMatcher, XPathError};

/// XPath selector for identity constraints.
/// The selector identifies which elements are subject to the constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsdSelector {
    /// The XPath expression
    pub xpath: String,
    path: Arc<PathExpression>,
}

impl XsdSelector {
    /// Compile a selector expression
    pub fn new(xpath: impl Into<String>, namespaces: &NamespaceContext) -> std::result::Result<Self, XPathError> {
        let xpath = xpath.into();
        let path = PathExpression::selector(&xpath, namespaces)?;
        Ok(Self {
            xpath,
            path: Arc::new(path),
        })
    }

    /// The compiled expression
    pub fn path(&self) -> &Arc<PathExpression> {
        &self.path
    }

    /// A fresh matcher, activated by the next open event it receives
    pub fn matcher(&self) -> PathMatcher {
        PathMatcher::new(self.path.clone())
    }
}

/// XPath field selector for identity constraints.
/// Fields identify which values form the key within selected elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsdField {
    /// The XPath expression
    pub xpath: String,
    path: Arc<PathExpression>,
}

impl XsdField {
    /// Compile a field expression
    pub fn new(xpath: impl Into<String>, namespaces: &NamespaceContext) -> std::result::Result<Self, XPathError> {
        let xpath = xpath.into();
        let path = PathExpression::field(&xpath, namespaces)?;
        Ok(Self {
            xpath,
            path: Arc::new(path),
        })
    }

    /// The compiled expression
    pub fn path(&self) -> &Arc<PathExpression> {
        &self.path
    }

    /// A fresh matcher, activated by the next open event it receives
    pub fn matcher(&self) -> PathMatcher {
        PathMatcher::new(self.path.clone())
    }
}

/// Type of identity constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityConstraintKind {
    /// xs:unique - values must be unique, but fields can be missing
    Unique,
    /// xs:key - values must be unique AND all fields must be present
    Key,
    /// xs:keyref - references a key or unique constraint
    Keyref,
}

impl std::fmt::Display for IdentityConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityConstraintKind::Unique => write!(f, "unique"),
            IdentityConstraintKind::Key => write!(f, "key"),
            IdentityConstraintKind::Keyref => write!(f, "keyref"),
        }
    }
}

/// A compiled identity constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsdIdentity {
    /// Constraint name
    pub name: QName,
    /// Kind of constraint
    pub kind: IdentityConstraintKind,
    /// Element declaring the constraint; its instances bound the scope
    pub element: QName,
    /// XPath selector
    pub selector: XsdSelector,
    /// XPath fields, in tuple order
    pub fields: Vec<XsdField>,
    /// Referenced key or unique (keyref only)
    pub refer: Option<QName>,
}

impl XsdIdentity {
    /// Check if this is a unique constraint
    pub fn is_unique(&self) -> bool {
        matches!(self.kind, IdentityConstraintKind::Unique)
    }

    /// Check if this is a key constraint
    pub fn is_key(&self) -> bool {
        matches!(self.kind, IdentityConstraintKind::Key)
    }

    /// Check if this is a keyref constraint
    pub fn is_keyref(&self) -> bool {
        matches!(self.kind, IdentityConstraintKind::Keyref)
    }

    /// Number of fields, i.e. tuple length
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Builder for identity constraints
#[derive(Debug)]
pub struct IdentityBuilder {
    name: Option<QName>,
    kind: IdentityConstraintKind,
    element: Option<QName>,
    selector: Option<String>,
    fields: Vec<String>,
    refer: Option<QName>,
    namespaces: NamespaceContext,
}

impl IdentityBuilder {
    fn new(kind: IdentityConstraintKind) -> Self {
        Self {
            name: None,
            kind,
            element: None,
            selector: None,
            fields: Vec::new(),
            refer: None,
            namespaces: NamespaceContext::new(),
        }
    }

    /// Create a builder for a unique constraint
    pub fn unique() -> Self {
        Self::new(IdentityConstraintKind::Unique)
    }

    /// Create a builder for a key constraint
    pub fn key() -> Self {
        Self::new(IdentityConstraintKind::Key)
    }

    /// Create a builder for a keyref constraint
    pub fn keyref() -> Self {
        Self::new(IdentityConstraintKind::Keyref)
    }

    /// Set the constraint name
    pub fn name(mut self, name: QName) -> Self {
        self.name = Some(name);
        self
    }

    /// Set the defining element
    pub fn element(mut self, element: QName) -> Self {
        self.element = Some(element);
        self
    }

    /// Set the selector
    pub fn selector(mut self, xpath: impl Into<String>) -> Self {
        self.selector = Some(xpath.into());
        self
    }

    /// Add a field
    pub fn field(mut self, xpath: impl Into<String>) -> Self {
        self.fields.push(xpath.into());
        self
    }

    /// Set the refer attribute (for keyref)
    pub fn refer(mut self, refer: QName) -> Self {
        self.refer = Some(refer);
        self
    }

    /// Prefix mappings used to compile the selector and fields
    pub fn namespaces(mut self, namespaces: NamespaceContext) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Build the identity constraint, compiling its patterns
    pub fn build(self) -> Result<XsdIdentity> {
        let name = self.name.ok_or_else(|| ParseError::new(
            "identity constraint must have a name",
        ))?;
        validate_ncname(&name.local_name)?;

        let element = self.element.ok_or_else(|| ParseError::new(format!(
            "identity constraint '{}' must have a defining element",
            name
        )))?;

        let selector = self.selector.ok_or_else(|| ParseError::new(format!(
            "identity constraint '{}' must have a selector",
            name
        )))?;

        if self.fields.is_empty() {
            return Err(ParseError::new(format!(
                "identity constraint '{}' must have at least one field",
                name
            ))
            .into());
        }

        match (self.kind, &self.refer) {
            (IdentityConstraintKind::Keyref, None) => {
                return Err(ParseError::new(format!(
                    "keyref '{}' must have a 'refer' attribute",
                    name
                ))
                .into());
            }
            (IdentityConstraintKind::Unique | IdentityConstraintKind::Key, Some(_)) => {
                return Err(ParseError::new(format!(
                    "only a keyref may have a 'refer' attribute, '{}' is a {}",
                    name, self.kind
                ))
                .into());
            }
            _ => {}
        }

        let selector = XsdSelector::new(selector, &self.namespaces)?;
        let fields = self
            .fields
            .into_iter()
            .map(|xpath| XsdField::new(xpath, &self.namespaces))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(XsdIdentity {
            name,
            kind: self.kind,
            element,
            selector,
            fields,
            refer: self.refer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::validators::ErrorCode;
    use crate::xpath::PatternKind;

    #[test]
    fn test_identity_builder() {
        let identity = IdentityBuilder::key()
            .name(QName::local("bookKey"))
            .element(QName::local("library"))
            .selector(".//book")
            .field("@isbn")
            .build()
            .unwrap();

        assert!(identity.is_key());
        assert_eq!(identity.name.local_name, "bookKey");
        assert_eq!(identity.selector.xpath, ".//book");
        assert_eq!(identity.selector.path().kind(), PatternKind::Selector);
        assert_eq!(identity.field_count(), 1);
        assert_eq!(identity.fields[0].xpath, "@isbn");
        assert_eq!(identity.fields[0].path().kind(), PatternKind::Field);
    }

    #[test]
    fn test_keyref_builder() {
        let identity = IdentityBuilder::keyref()
            .name(QName::local("orderBookRef"))
            .element(QName::local("library"))
            .selector(".//orderItem")
            .field("bookId")
            .refer(QName::local("bookKey"))
            .build()
            .unwrap();

        assert!(identity.is_keyref());
        assert_eq!(identity.refer.as_ref().unwrap().local_name, "bookKey");
    }

    #[test]
    fn test_builder_compiles_prefixed_patterns() {
        let identity = IdentityBuilder::unique()
            .name(QName::local("u"))
            .element(QName::local("root"))
            .namespaces(NamespaceContext::new().with_prefix("b", "urn:books"))
            .selector("b:book")
            .field("@b:id")
            .build()
            .unwrap();

        assert_eq!(identity.selector.path().paths().len(), 1);

        let err = IdentityBuilder::unique()
            .name(QName::local("u"))
            .element(QName::local("root"))
            .selector("c:book")
            .field("@id")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::XPath(XPathError::UnknownPrefix(_))));
    }

    #[test]
    fn test_builder_validation_errors() {
        // Missing name
        let result = IdentityBuilder::unique()
            .element(QName::local("root"))
            .selector(".")
            .field("@id")
            .build();
        assert!(matches!(result, Err(Error::Parse(_))));

        // Missing defining element
        let result = IdentityBuilder::unique()
            .name(QName::local("test"))
            .selector(".")
            .field("@id")
            .build();
        assert!(result.is_err());

        // Missing selector
        let result = IdentityBuilder::unique()
            .name(QName::local("test"))
            .element(QName::local("root"))
            .field("@id")
            .build();
        assert!(result.is_err());

        // Missing field
        let result = IdentityBuilder::unique()
            .name(QName::local("test"))
            .element(QName::local("root"))
            .selector(".")
            .build();
        assert!(result.is_err());

        // Keyref missing refer
        let result = IdentityBuilder::keyref()
            .name(QName::local("test"))
            .element(QName::local("root"))
            .selector(".")
            .field("@id")
            .build();
        assert!(result.is_err());

        // Key with refer
        let result = IdentityBuilder::key()
            .name(QName::local("test"))
            .element(QName::local("root"))
            .selector(".")
            .field("@id")
            .refer(QName::local("other"))
            .build();
        assert!(result.is_err());

        // Name is not an NCName
        let result = IdentityBuilder::unique()
            .name(QName::local("1st"))
            .element(QName::local("root"))
            .selector(".")
            .field("@id")
            .build();
        assert!(matches!(result, Err(Error::Name(_))));
    }

    #[test]
    fn test_invalid_field_path() {
        let err = IdentityBuilder::unique()
            .name(QName::local("test"))
            .element(QName::local("root"))
            .selector("item")
            .field("@id/child")
            .build()
            .unwrap_err();

        match err {
            Error::XPath(e) => assert_eq!(e.code(), ErrorCode::InvalidFieldPath),
            other => panic!("unexpected {:?}", other),
        }

        let err = IdentityBuilder::unique()
            .name(QName::local("test"))
            .element(QName::local("root"))
            .selector("item/@id")
            .field("@id")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::XPath(XPathError::AttributeInSelector(_))));
    }
}
