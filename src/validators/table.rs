//! Per-document registry of identity constraints
//!
//! The table is built once from the compiled constraints and reused for
//! every document. It indexes constraints by their defining element,
//! binds each keyref to its target, and holds the per-document state that
//! outlives a single defining-element instance: the merged committed
//! tuples of every key and unique, and the queue of keyref tuples waiting
//! for the end of the document.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::error::{ParseError, Result};
use crate::namespaces::QName;

use super::exceptions::{ConstraintViolation, ErrorCode, ErrorReporter};
use super::identities::XsdIdentity;
use super::stores::{FieldTuple, KeyRefEntry, ValueStore};

/// Outcome of resolving the deferred keyrefs of one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRefResolution {
    /// Deferred tuples checked
    pub checked: usize,
    /// Tuples without a matching target tuple
    pub failed: usize,
}

/// Registry mapping constraint names to definitions and document state
#[derive(Debug, Clone)]
pub struct IdentityConstraintTable {
    constraints: IndexMap<QName, Arc<XsdIdentity>>,
    by_element: HashMap<QName, Vec<Arc<XsdIdentity>>>,
    /// keyref name -> target name, when the target exists
    targets: HashMap<QName, QName>,
    committed: HashMap<QName, IndexSet<FieldTuple>>,
    activations: HashMap<QName, usize>,
    deferred: Vec<KeyRefEntry>,
}

impl IdentityConstraintTable {
    /// Index compiled constraints and bind keyrefs to their targets
    pub fn new(constraints: impl IntoIterator<Item = XsdIdentity>) -> Result<Self> {
        let mut index: IndexMap<QName, Arc<XsdIdentity>> = IndexMap::new();
        let mut by_element: HashMap<QName, Vec<Arc<XsdIdentity>>> = HashMap::new();

        for identity in constraints {
            if index.contains_key(&identity.name) {
                return Err(ParseError::new(format!(
                    "duplicate identity constraint name '{}'",
                    identity.name
                ))
                .into());
            }
            let identity = Arc::new(identity);
            by_element
                .entry(identity.element.clone())
                .or_default()
                .push(identity.clone());
            index.insert(identity.name.clone(), identity);
        }

        let mut targets = HashMap::new();
        for identity in index.values().filter(|i| i.is_keyref()) {
            let Some(refer) = &identity.refer else { continue };
            match index.get(refer) {
                Some(target) if target.is_keyref() => {
                    return Err(ParseError::new(format!(
                        "keyref '{}' refers to keyref '{}', not a key or unique",
                        identity.name, refer
                    ))
                    .into());
                }
                Some(target) if target.field_count() != identity.field_count() => {
                    return Err(ParseError::new(format!(
                        "keyref '{}' has {} fields but '{}' has {}",
                        identity.name,
                        identity.field_count(),
                        refer,
                        target.field_count()
                    ))
                    .into());
                }
                Some(_) => {
                    targets.insert(identity.name.clone(), refer.clone());
                }
                None => {
                    tracing::warn!(keyref = %identity.name, refer = %refer, "keyref target is not declared, every reference will fail");
                }
            }
        }

        Ok(Self {
            constraints: index,
            by_element,
            targets,
            committed: HashMap::new(),
            activations: HashMap::new(),
            deferred: Vec::new(),
        })
    }

    /// All constraints, in declaration order
    pub fn constraints(&self) -> impl Iterator<Item = &Arc<XsdIdentity>> {
        self.constraints.values()
    }

    /// Number of constraints
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Check if the table has no constraints
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Look up a constraint by name
    pub fn get(&self, name: &QName) -> Option<&Arc<XsdIdentity>> {
        self.constraints.get(name)
    }

    /// Constraints declared on `element`, in declaration order
    pub fn defined_on(&self, element: &QName) -> &[Arc<XsdIdentity>] {
        self.by_element.get(element).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The key or unique a keyref is bound to, if it exists
    pub fn target_of(&self, keyref: &QName) -> Option<&Arc<XsdIdentity>> {
        self.targets.get(keyref).and_then(|name| self.constraints.get(name))
    }

    /// Start a fresh value store for a new instance of the defining element
    pub fn open_store(&mut self, identity: &Arc<XsdIdentity>) -> ValueStore {
        *self.activations.entry(identity.name.clone()).or_insert(0) += 1;
        ValueStore::new(identity.clone())
    }

    /// Merge a closed instance's committed tuples into the document-wide set
    pub fn close_store(&mut self, store: ValueStore) {
        let name = store.identity().name.clone();
        if store.identity().is_keyref() {
            return;
        }
        self.committed.entry(name).or_default().extend(store.into_tuples());
    }

    /// How many defining-element instances opened a store for `name`
    pub fn activations(&self, name: &QName) -> usize {
        self.activations.get(name).copied().unwrap_or(0)
    }

    /// Committed tuples of a key or unique across all closed instances
    pub fn committed(&self, name: &QName) -> Option<&IndexSet<FieldTuple>> {
        self.committed.get(name)
    }

    /// Queue a keyref tuple for resolution at document end
    pub fn defer(&mut self, entry: KeyRefEntry) {
        self.deferred.push(entry);
    }

    /// Number of keyref tuples waiting for document end
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    /// Resolve every deferred keyref tuple, in document order, against the
    /// committed tuples of its target. Drains the queue.
    pub fn resolve_keyrefs<R: ErrorReporter + ?Sized>(&mut self, reporter: &mut R) -> KeyRefResolution {
        let mut resolution = KeyRefResolution::default();

        // Queued at scope close; scope ids follow document order
        let mut pending = std::mem::take(&mut self.deferred);
        pending.sort_by_key(|entry| entry.scope);

        for entry in pending {
            resolution.checked += 1;
            let target = self.targets.get(&entry.constraint.name);
            let found = target
                .and_then(|name| self.committed.get(name))
                .map(|tuples| tuples.contains(&entry.tuple))
                .unwrap_or(false);
            if found {
                continue;
            }

            resolution.failed += 1;
            let target_name = entry
                .constraint
                .refer
                .clone()
                .unwrap_or_else(|| entry.constraint.name.clone());
            let target_activations = target.map(|name| self.activations(name)).unwrap_or(0);
            tracing::debug!(
                keyref = %entry.constraint.name,
                target = %target_name,
                target_activations,
                tuple = %entry.tuple,
                scope = entry.scope,
                "keyref not found"
            );
            reporter.report_constraint_error(
                ConstraintViolation::new(ErrorCode::KeyRefNotFound, target_name, entry.element)
                    .with_values(entry.tuple.to_string()),
            );
        }

        resolution
    }

    /// Committed tuples of every key and unique, by constraint name in
    /// declaration order
    pub fn committed_snapshot(&self) -> IndexMap<QName, Vec<FieldTuple>> {
        self.constraints
            .keys()
            .filter_map(|name| {
                self.committed
                    .get(name)
                    .map(|tuples| (name.clone(), tuples.iter().cloned().collect()))
            })
            .collect()
    }

    /// Forget all document state, keeping the definitions
    pub fn reset(&mut self) {
        self.committed.clear();
        self.activations.clear();
        self.deferred.clear();
    }
}
