//! Value stores: tuple finalization and duplicate detection
//!
//! One [`ValueStore`] exists per open instance of a constraint's defining
//! element. Unique and key tuples are checked against it when their scope
//! closes; keyref tuples are turned into deferred [`KeyRefEntry`]s and
//! checked once the whole document has been seen.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::namespaces::QName;

use super::exceptions::{ConstraintViolation, ErrorCode, ErrorReporter};
use super::fields::ScopeInstance;
use super::identities::{IdentityConstraintKind, XsdIdentity};
use super::values::TypedValue;

/// A complete tuple of typed field values, in field declaration order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldTuple(Vec<TypedValue>);

impl FieldTuple {
    /// Create a tuple from its values
    pub fn new(values: Vec<TypedValue>) -> Self {
        Self(values)
    }

    /// The values, in field order
    pub fn values(&self) -> &[TypedValue] {
        &self.0
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the tuple has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Into<TypedValue>> FromIterator<T> for FieldTuple {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// `(a, b)`
impl fmt::Display for FieldTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// A keyref tuple waiting for the end of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRefEntry {
    /// The keyref constraint
    pub constraint: Arc<XsdIdentity>,
    /// The referenced tuple
    pub tuple: FieldTuple,
    /// Ordinal of the scope that produced the tuple
    pub scope: usize,
    /// The referencing element
    pub element: QName,
}

/// What happened to a scope's tuple at finalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalized {
    /// The tuple was added to the store
    Committed(FieldTuple),
    /// Incomplete unique or keyref tuple, skipped without error
    Discarded,
    /// A violation was reported; nothing was committed
    Rejected,
    /// Keyref tuple to be resolved at document end
    Deferred(KeyRefEntry),
}

/// Committed tuples of one constraint within one defining-element instance
#[derive(Debug, Clone)]
pub struct ValueStore {
    identity: Arc<XsdIdentity>,
    /// Committed tuple -> scope that committed it
    committed: IndexMap<FieldTuple, usize>,
}

impl ValueStore {
    /// Create an empty store
    pub fn new(identity: Arc<XsdIdentity>) -> Self {
        Self {
            identity,
            committed: IndexMap::new(),
        }
    }

    /// The constraint this store belongs to
    pub fn identity(&self) -> &Arc<XsdIdentity> {
        &self.identity
    }

    /// Check whether an equal tuple has been committed
    pub fn contains(&self, tuple: &FieldTuple) -> bool {
        self.committed.contains_key(tuple)
    }

    /// Committed tuples, in commit order
    pub fn tuples(&self) -> impl Iterator<Item = &FieldTuple> {
        self.committed.keys()
    }

    /// Number of committed tuples
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    /// Check if nothing was committed
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Consume the store, yielding its committed tuples in commit order
    pub fn into_tuples(self) -> impl Iterator<Item = FieldTuple> {
        self.committed.into_keys()
    }

    /// Validate a closed scope's tuple and commit it if it passes
    pub fn finalize<R: ErrorReporter + ?Sized>(
        &mut self,
        scope: ScopeInstance,
        reporter: &mut R,
    ) -> Finalized {
        let scope_id = scope.id();
        let (element, slots) = scope.into_slots();
        let complete = slots.iter().all(|slot| matches!(slot, Some((_, false))));

        let identity = &self.identity;
        match identity.kind {
            IdentityConstraintKind::Unique | IdentityConstraintKind::Keyref if !complete => {
                tracing::debug!(constraint = %identity.name, %element, scope = scope_id, "incomplete tuple discarded");
                return Finalized::Discarded;
            }
            IdentityConstraintKind::Key if !complete => {
                reporter.report_constraint_error(ConstraintViolation::new(
                    ErrorCode::AbsentKeyValue,
                    identity.name.clone(),
                    element,
                ));
                return Finalized::Rejected;
            }
            _ => {}
        }

        let tuple: FieldTuple = slots
            .into_iter()
            .flatten()
            .map(|(value, _)| value)
            .collect();

        if identity.is_keyref() {
            return Finalized::Deferred(KeyRefEntry {
                constraint: identity.clone(),
                tuple,
                scope: scope_id,
                element,
            });
        }

        if let Some(first) = self.committed.get(&tuple) {
            tracing::debug!(constraint = %identity.name, %tuple, first_scope = *first, scope = scope_id, "duplicate tuple");
            let code = if identity.is_key() {
                ErrorCode::DuplicateKeyValue
            } else {
                ErrorCode::DuplicateUniqueValue
            };
            reporter.report_constraint_error(
                ConstraintViolation::new(code, identity.name.clone(), element)
                    .with_values(tuple.to_string()),
            );
            return Finalized::Rejected;
        }

        tracing::debug!(constraint = %identity.name, %tuple, scope = scope_id, "tuple committed");
        self.committed.insert(tuple.clone(), scope_id);
        Finalized::Committed(tuple)
    }
}
