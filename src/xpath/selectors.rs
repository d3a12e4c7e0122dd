//! Compiled selector and field patterns
//!
//! A [`PathExpression`] is the compiled form of an `xs:selector` or
//! `xs:field` xpath attribute: a union of location paths, each an ordered
//! sequence of [`Step`]s. Compiled expressions are immutable and shared by
//! every [`PathMatcher`](super::PathMatcher) created from them.

use std::fmt;

use crate::namespaces::{NamespaceContext, QName};

use super::parsers::{IdentityXPathParser, XPathError};

/// Axis of a location step.
///
/// Only the axes of the identity-constraint XPath subset exist; anything
/// else is rejected while compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// `child::` (the default axis)
    Child,
    /// `descendant-or-self::node()`, spelled `.//` at the start of a path
    DescendantOrSelf,
    /// `self::node()`, spelled `.`
    Self_,
    /// `attribute::`, spelled `@`; only legal as the final step of a field
    Attribute,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Axis::Child => "child",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Self_ => "self",
            Axis::Attribute => "attribute",
        };
        write!(f, "{}", s)
    }
}

/// Name test of a location step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameTest {
    /// `*` (or the implicit `node()` of `.` and `.//`)
    Wildcard,
    /// `prefix:*`, any local name in the given namespace
    Namespace(String),
    /// An expanded name
    Qualified(QName),
}

impl NameTest {
    /// Check whether an expanded element or attribute name passes this test
    pub fn matches(&self, name: &QName) -> bool {
        match self {
            NameTest::Wildcard => true,
            NameTest::Namespace(ns) => name.namespace() == Some(ns.as_str()),
            NameTest::Qualified(qname) => qname == name,
        }
    }
}

impl fmt::Display for NameTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameTest::Wildcard => write!(f, "*"),
            NameTest::Namespace(ns) => write!(f, "{{{}}}*", ns),
            NameTest::Qualified(qname) => write!(f, "{}", qname),
        }
    }
}

/// A single location step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    /// The axis
    pub axis: Axis,
    /// The name test
    pub name_test: NameTest,
}

impl Step {
    /// Create a step
    pub fn new(axis: Axis, name_test: NameTest) -> Self {
        Self { axis, name_test }
    }

    /// `child::` step
    pub fn child(name_test: NameTest) -> Self {
        Self::new(Axis::Child, name_test)
    }

    /// `attribute::` step
    pub fn attribute(name_test: NameTest) -> Self {
        Self::new(Axis::Attribute, name_test)
    }

    /// `self::node()` step
    pub fn self_node() -> Self {
        Self::new(Axis::Self_, NameTest::Wildcard)
    }

    /// `descendant-or-self::node()` step
    pub fn descendant_or_self() -> Self {
        Self::new(Axis::DescendantOrSelf, NameTest::Wildcard)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.axis {
            Axis::Self_ => write!(f, "."),
            Axis::DescendantOrSelf => write!(f, "descendant-or-self::node()"),
            Axis::Child => write!(f, "{}", self.name_test),
            Axis::Attribute => write!(f, "@{}", self.name_test),
        }
    }
}

/// One alternative of a union pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationPath {
    /// Steps in document order, relative to the context node
    pub steps: Vec<Step>,
}

impl LocationPath {
    /// Create a location path from its steps
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the path has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check whether this path selects an attribute
    pub fn selects_attribute(&self) -> bool {
        self.steps
            .last()
            .map(|step| step.axis == Axis::Attribute)
            .unwrap_or(false)
    }

    /// Index of the first attribute step that is not the final step
    pub fn misplaced_attribute(&self) -> Option<usize> {
        let last = self.steps.len().saturating_sub(1);
        self.steps
            .iter()
            .position(|step| step.axis == Axis::Attribute)
            .filter(|&i| i < last)
    }
}

impl fmt::Display for LocationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

/// What a pattern is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// `xs:selector`: selects elements, never attributes
    Selector,
    /// `xs:field`: selects one element or attribute value
    Field,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternKind::Selector => write!(f, "selector"),
            PatternKind::Field => write!(f, "field"),
        }
    }
}

/// A compiled selector or field pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpression {
    source: String,
    kind: PatternKind,
    paths: Vec<LocationPath>,
}

impl PathExpression {
    /// Compile a selector pattern
    pub fn selector(pattern: &str, namespaces: &NamespaceContext) -> Result<Self, XPathError> {
        IdentityXPathParser::for_selector(namespaces).parse(pattern)
    }

    /// Compile a field pattern
    pub fn field(pattern: &str, namespaces: &NamespaceContext) -> Result<Self, XPathError> {
        IdentityXPathParser::for_field(namespaces).parse(pattern)
    }

    /// Assemble an expression from already-built paths, checking the
    /// attribute-step placement rules for `kind`
    pub fn from_paths(
        source: impl Into<String>,
        kind: PatternKind,
        paths: Vec<LocationPath>,
    ) -> Result<Self, XPathError> {
        if paths.is_empty() {
            return Err(XPathError::Empty);
        }
        for path in &paths {
            let misplaced = path.misplaced_attribute();
            if kind == PatternKind::Selector && (path.selects_attribute() || misplaced.is_some()) {
                return Err(XPathError::AttributeInSelector(path.to_string()));
            }
            if let Some(index) = misplaced {
                return Err(XPathError::AttributeNotLast {
                    path: path.to_string(),
                    step: index + 1,
                });
            }
        }
        Ok(Self {
            source: source.into(),
            kind,
            paths,
        })
    }

    /// The pattern text this expression was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Selector or field
    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    /// The union alternatives, in declaration order
    pub fn paths(&self) -> &[LocationPath] {
        &self.paths
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
