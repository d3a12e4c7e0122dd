//! Identity constraint validators
//!
//! This module contains the streaming validation logic for `xs:unique`,
//! `xs:key` and `xs:keyref`: constraint definitions, typed values, field
//! activation per selector scope, value stores, the per-document constraint
//! table and the event-driven validator tying them together.

pub mod exceptions;
pub mod fields;
pub mod identities;
pub mod stores;
pub mod table;
pub mod validation;
pub mod values;

// Re-exports
pub use exceptions::{CollectingReporter, ConstraintViolation, ErrorCode, ErrorReporter};
pub use fields::{FieldActivator, ScopeInstance};
pub use identities::{IdentityBuilder, IdentityConstraintKind, XsdField, XsdIdentity, XsdSelector};
pub use stores::{FieldTuple, Finalized, KeyRefEntry, ValueStore};
pub use table::{IdentityConstraintTable, KeyRefResolution};
pub use validation::{IdentityValidator, ValidationSummary};
pub use values::{BinaryKind, Duration, Float, GregorianKind, Temporal, TemporalKind, TypedValue};
