//! XPath subset for identity constraints
//!
//! `xs:selector` and `xs:field` use a restricted XPath grammar:
//!
//! ```text
//! Selector ::= Path ( '|' Path )*
//! Field    ::= Path ( '|' Path )*      (last step may be @NameTest)
//! Path     ::= ('.//')? Step ( '/' Step )*
//! Step     ::= '.' | NameTest
//! NameTest ::= QName | '*' | NCName ':' '*'
//! ```
//!
//! Patterns are compiled once into a [`PathExpression`] and then evaluated
//! incrementally by [`PathMatcher`]s over open/attribute/text/close events,
//! so a document is never materialized.

mod matcher;
mod parsers;
mod selectors;

pub use matcher::{MatchSignal, PathMatcher};
pub use parsers::{IdentityXPathParser, XPathError};
pub use selectors::{Axis, LocationPath, NameTest, PathExpression, PatternKind, Step};
