//! # xmlschema-idc
//!
//! Streaming validation of XML Schema identity constraints: `xs:unique`,
//! `xs:key` and `xs:keyref`.
//!
//! Constraints are checked in a single forward pass over a document's
//! structural events, without building a tree. Selector and field patterns
//! are compiled into incremental matchers, field values are compared by
//! their typed value, and keyref references are resolved once the document
//! has ended.
//!
//! ## Features
//!
//! - Restricted XPath compiler and incremental matcher for selectors/fields
//! - Typed-value equality for the XSD primitive types
//! - Per-scope tuple accumulation with duplicate and completeness checks
//! - Deferred keyref resolution in document order
//! - quick-xml streaming driver and roxmltree-based XSD constraint loader
//! - Resource limits for untrusted input
//!
//! ## Example
//!
//! ```rust,ignore
//! use xmlschema_idc::documents::DocumentValidator;
//! use xmlschema_idc::loaders::SchemaLoader;
//! use xmlschema_idc::validators::CollectingReporter;
//!
//! let schema = SchemaLoader::new().load_file("catalog.xsd")?;
//! let mut validator = DocumentValidator::new(schema.table()?, CollectingReporter::new())
//!     .with_type_hints(schema.type_hints.clone());
//!
//! validator.validate_file("catalog.xml")?;
//! for violation in validator.reporter().violations() {
//!     println!("{}", violation);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Utilities
pub mod names;
pub mod namespaces;

// Pattern compiler and matcher
pub mod xpath;

// Identity constraint validation
pub mod validators;

// Document driver and schema loader
pub mod documents;
pub mod loaders;

// Re-exports for convenience
pub use documents::{DocumentValidator, TypeHints};
pub use error::{Error, Result};
pub use limits::Limits;
pub use loaders::{LoadedSchema, SchemaLoader};
pub use namespaces::{NamespaceContext, QName};
pub use validators::{
    CollectingReporter, ConstraintViolation, ErrorCode, ErrorReporter, IdentityBuilder,
    IdentityConstraintTable, IdentityValidator, TypedValue, ValidationSummary, XsdIdentity,
};

/// Version of the xmlschema-idc library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema instance namespace (`xsi:nil`)
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
