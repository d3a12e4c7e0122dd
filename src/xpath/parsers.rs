//! Parser for identity constraint XPath patterns
//!
//! Selectors and fields use a restricted XPath subset (XML Schema 1.0
//! §3.11.6):
//!
//! ```text
//! Selector  ::= Path ( '|' Path )*
//! Path      ::= ('.//')? Step ( '/' Step )*
//! Field     ::= Path ( '|' Path )*
//! Path      ::= ('.//')? ( Step '/' )* ( Step | '@' NameTest )
//! Step      ::= '.' | NameTest
//! NameTest  ::= QName | '*' | NCName ':' '*'
//! ```
//!
//! The explicit `child::`, `attribute::` and `self::node()` spellings are
//! accepted as well.

use thiserror::Error;

use crate::names::is_valid_ncname;
use crate::namespaces::{NamespaceContext, QName};
use crate::validators::ErrorCode;

use super::selectors::{LocationPath, NameTest, PathExpression, PatternKind, Step};

/// Error compiling a selector or field pattern
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XPathError {
    /// Empty pattern or empty union branch
    #[error("empty path expression")]
    Empty,
    /// Pattern starts with `/`
    #[error("absolute path '{0}' is not allowed in an identity constraint")]
    AbsolutePath(String),
    /// Attribute step anywhere in a selector
    #[error("attribute step not allowed in selector path '{0}'")]
    AttributeInSelector(String),
    /// Attribute step before the final step of a field
    #[error("attribute step {step} of '{path}' must be the final step")]
    AttributeNotLast {
        /// Offending path
        path: String,
        /// One-based index of the attribute step
        step: usize,
    },
    /// Axis outside the identity constraint subset
    #[error("axis '{0}' not allowed in identity constraint")]
    UnsupportedAxis(String),
    /// Prefix without an in-scope namespace binding
    #[error("unknown namespace prefix '{0}'")]
    UnknownPrefix(String),
    /// Name that is not an NCName
    #[error("invalid name '{0}'")]
    InvalidName(String),
    /// Anything else
    #[error("unexpected '{found}' at offset {position}")]
    Unexpected {
        /// Byte offset into the pattern
        position: usize,
        /// Offending input
        found: String,
    },
    /// Pattern ends in the middle of a step
    #[error("unexpected end of path expression")]
    UnexpectedEnd,
}

impl XPathError {
    /// Taxonomy code for reporting: every pattern error is `InvalidFieldPath`
    pub fn code(&self) -> ErrorCode {
        ErrorCode::InvalidFieldPath
    }
}

/// Parser for identity constraint XPath (xs:selector, xs:field)
#[derive(Debug, Clone)]
pub struct IdentityXPathParser<'a> {
    kind: PatternKind,
    namespaces: &'a NamespaceContext,
}

impl<'a> IdentityXPathParser<'a> {
    /// Create a parser for the given pattern kind
    pub fn new(kind: PatternKind, namespaces: &'a NamespaceContext) -> Self {
        Self { kind, namespaces }
    }

    /// Create a parser for selector expressions
    pub fn for_selector(namespaces: &'a NamespaceContext) -> Self {
        Self::new(PatternKind::Selector, namespaces)
    }

    /// Create a parser for field expressions (allows a final attribute step)
    pub fn for_field(namespaces: &'a NamespaceContext) -> Self {
        Self::new(PatternKind::Field, namespaces)
    }

    /// Parse and check an identity constraint XPath expression
    pub fn parse(&self, xpath: &str) -> Result<PathExpression, XPathError> {
        let mut cursor = Cursor::new(xpath);
        let mut paths = Vec::new();

        loop {
            paths.push(self.parse_path(&mut cursor)?);
            cursor.skip_blanks();
            if cursor.eat("|") {
                continue;
            }
            if cursor.at_end() {
                break;
            }
            return Err(cursor.unexpected());
        }

        PathExpression::from_paths(xpath.trim(), self.kind, paths)
    }

    fn parse_path(&self, cursor: &mut Cursor<'_>) -> Result<LocationPath, XPathError> {
        cursor.skip_blanks();
        if cursor.at_end() || cursor.peek() == Some('|') {
            return Err(XPathError::Empty);
        }
        if cursor.peek() == Some('/') {
            return Err(XPathError::AbsolutePath(cursor.rest().trim().to_string()));
        }

        let mut steps = Vec::new();
        if cursor.eat(".//") {
            steps.push(Step::self_node());
            steps.push(Step::descendant_or_self());
            cursor.skip_blanks();
        }

        loop {
            steps.push(self.parse_step(cursor)?);
            cursor.skip_blanks();
            if cursor.starts_with("//") {
                return Err(cursor.unexpected());
            }
            if !cursor.eat("/") {
                break;
            }
            cursor.skip_blanks();
        }

        Ok(LocationPath::new(steps))
    }

    fn parse_step(&self, cursor: &mut Cursor<'_>) -> Result<Step, XPathError> {
        match cursor.peek() {
            None | Some('|') | Some('/') => return Err(XPathError::UnexpectedEnd),
            Some('.') if cursor.starts_with("..") => {
                return Err(XPathError::UnsupportedAxis("parent".to_string()));
            }
            Some('.') => {
                cursor.bump(1);
                return Ok(Step::self_node());
            }
            Some('@') => {
                cursor.bump(1);
                cursor.skip_blanks();
                return Ok(Step::attribute(self.parse_name_test(cursor)?));
            }
            Some('*') => {
                cursor.bump(1);
                return Ok(Step::child(NameTest::Wildcard));
            }
            _ => {}
        }

        let name = cursor.scan_name();
        if name.is_empty() {
            return Err(cursor.unexpected());
        }

        if cursor.eat("::") {
            return match name {
                "child" => Ok(Step::child(self.parse_name_test(cursor)?)),
                "attribute" => Ok(Step::attribute(self.parse_name_test(cursor)?)),
                "self" if cursor.eat("node()") => Ok(Step::self_node()),
                "self" => Err(cursor.unexpected()),
                other => Err(XPathError::UnsupportedAxis(other.to_string())),
            };
        }

        Ok(Step::child(self.finish_name_test(name, cursor)?))
    }

    fn parse_name_test(&self, cursor: &mut Cursor<'_>) -> Result<NameTest, XPathError> {
        if cursor.eat("*") {
            return Ok(NameTest::Wildcard);
        }
        let name = cursor.scan_name();
        if name.is_empty() {
            return Err(match cursor.peek() {
                None => XPathError::UnexpectedEnd,
                Some(_) => cursor.unexpected(),
            });
        }
        self.finish_name_test(name, cursor)
    }

    /// Complete a name test whose first NCName has already been scanned
    fn finish_name_test(&self, first: &str, cursor: &mut Cursor<'_>) -> Result<NameTest, XPathError> {
        if !is_valid_ncname(first) {
            return Err(XPathError::InvalidName(first.to_string()));
        }
        if !cursor.starts_with(":") || cursor.starts_with("::") {
            return Ok(NameTest::Qualified(QName::local(first)));
        }
        cursor.bump(1);

        let namespace = self
            .namespaces
            .get_namespace(first)
            .ok_or_else(|| XPathError::UnknownPrefix(first.to_string()))?
            .to_string();

        if cursor.eat("*") {
            return Ok(NameTest::Namespace(namespace));
        }
        let local = cursor.scan_name();
        if !is_valid_ncname(local) {
            return Err(XPathError::InvalidName(format!("{}:{}", first, local)));
        }
        Ok(NameTest::Qualified(QName::namespaced(namespace, local)))
    }
}

/// Byte cursor over a pattern string
struct Cursor<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Cursor<'s> {
    fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn bump(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.src.len());
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.bump(s.len());
            true
        } else {
            false
        }
    }

    fn skip_blanks(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches([' ', '\t', '\r', '\n']);
        self.pos += rest.len() - trimmed.len();
    }

    /// Scan a run of NCName characters (no colon)
    fn scan_name(&mut self) -> &'s str {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(_, c)| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}')))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn unexpected(&self) -> XPathError {
        match self.peek() {
            None => XPathError::UnexpectedEnd,
            Some(c) => XPathError::Unexpected {
                position: self.pos,
                found: c.to_string(),
            },
        }
    }
}
