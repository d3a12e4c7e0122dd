//! Event-driven identity constraint validation
//!
//! [`IdentityValidator`] consumes the structural events of one document at a
//! time, in document order, and reports violations to its
//! [`ErrorReporter`]. It never aborts on its own: only the caller decides to
//! stop a document, through [`IdentityValidator::abort`].

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::namespaces::QName;
use crate::xpath::{MatchSignal, PathMatcher};

use super::exceptions::ErrorReporter;
use super::fields::FieldActivator;
use super::identities::XsdIdentity;
use super::stores::{FieldTuple, Finalized, ValueStore};
use super::table::{IdentityConstraintTable, KeyRefResolution};
use super::values::TypedValue;

/// An open instance of a constraint's defining element
#[derive(Debug)]
struct DefiningInstance {
    id: usize,
    identity: Arc<XsdIdentity>,
    selector: PathMatcher,
    store: ValueStore,
}

/// What a completed document produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    /// Committed tuples of every key and unique, by constraint name
    pub committed: IndexMap<QName, Vec<FieldTuple>>,
    /// Keyref resolution counts
    pub keyrefs: KeyRefResolution,
}

impl ValidationSummary {
    /// Committed tuples of one constraint
    pub fn committed(&self, name: &QName) -> &[FieldTuple] {
        self.committed.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Single-pass identity constraint validator
#[derive(Debug)]
pub struct IdentityValidator<R: ErrorReporter> {
    table: IdentityConstraintTable,
    reporter: R,
    instances: Vec<DefiningInstance>,
    activator: FieldActivator,
    next_instance: usize,
    depth: usize,
}

impl<R: ErrorReporter> IdentityValidator<R> {
    /// Create a validator over a constraint table
    pub fn new(table: IdentityConstraintTable, reporter: R) -> Self {
        Self {
            table,
            reporter,
            instances: Vec::new(),
            activator: FieldActivator::new(),
            next_instance: 0,
            depth: 0,
        }
    }

    /// The constraint table
    pub fn table(&self) -> &IdentityConstraintTable {
        &self.table
    }

    /// The error reporter
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Mutable access to the error reporter
    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    /// Consume the validator, returning its reporter
    pub fn into_reporter(self) -> R {
        self.reporter
    }

    /// Number of currently open elements
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of open scope instances across all constraints
    pub fn open_scope_count(&self) -> usize {
        self.activator.len()
    }

    /// Number of keyref tuples waiting for the end of the document
    pub fn deferred_keyref_count(&self) -> usize {
        self.table.deferred_count()
    }

    /// Committed tuples of a key or unique across closed defining elements
    pub fn committed(&self, name: &QName) -> Option<&IndexSet<FieldTuple>> {
        self.table.committed(name)
    }

    /// An element opened; `attributes` are its typed attribute values
    pub fn open_element(&mut self, name: &QName, attributes: &[(QName, TypedValue)]) {
        self.activator.open_element(name);

        let mut activations = Vec::new();
        for instance in &mut self.instances {
            if instance.selector.advance_open(name) == MatchSignal::Selected {
                activations.push((instance.identity.clone(), instance.id));
            }
        }

        let defined = self.table.defined_on(name).to_vec();
        for identity in defined {
            let id = self.next_instance;
            self.next_instance += 1;

            let store = self.table.open_store(&identity);
            let mut selector = identity.selector.matcher();
            if selector.advance_open(name) == MatchSignal::Selected {
                activations.push((identity.clone(), id));
            }
            tracing::debug!(constraint = %identity.name, element = %name, instance = id, "defining element opened");
            self.instances.push(DefiningInstance {
                id,
                identity,
                selector,
                store,
            });
        }

        for (identity, owner) in activations {
            self.activator.activate(identity, owner, name);
        }
        for (attribute, value) in attributes {
            self.activator.attribute(attribute, value, &mut self.reporter);
        }
        self.depth += 1;
    }

    /// Character content of the current element, when it has simple content
    pub fn character_content(&mut self, value: &TypedValue, is_nil: bool) {
        self.activator.character_content(value, is_nil, &mut self.reporter);
    }

    /// The current element closed
    pub fn close_element(&mut self, name: &QName) {
        tracing::trace!(element = %name, depth = self.depth, "close");

        for scope in self.activator.close_element(&mut self.reporter) {
            let owner = scope.owner();
            let Some(instance) = self.instances.iter_mut().rev().find(|i| i.id == owner) else {
                continue;
            };
            if let Finalized::Deferred(entry) = instance.store.finalize(scope, &mut self.reporter) {
                self.table.defer(entry);
            }
        }

        let mut open = Vec::with_capacity(self.instances.len());
        for mut instance in std::mem::take(&mut self.instances) {
            instance.selector.advance_close();
            if instance.selector.is_finished() {
                tracing::debug!(constraint = %instance.identity.name, instance = instance.id, committed = instance.store.len(), "defining element closed");
                self.table.close_store(instance.store);
            } else {
                open.push(instance);
            }
        }
        self.instances = open;

        self.depth = self.depth.saturating_sub(1);
    }

    /// The document ended: resolve deferred keyrefs, then reset for the
    /// next document
    pub fn end_document(&mut self) -> ValidationSummary {
        if self.depth != 0 {
            tracing::warn!(depth = self.depth, "document ended with open elements");
        }
        let keyrefs = self.table.resolve_keyrefs(&mut self.reporter);
        let summary = ValidationSummary {
            committed: self.table.committed_snapshot(),
            keyrefs,
        };
        tracing::debug!(
            constraints = summary.committed.len(),
            keyrefs_checked = summary.keyrefs.checked,
            keyrefs_failed = summary.keyrefs.failed,
            "document finished"
        );
        self.reset();
        summary
    }

    /// The surrounding parse failed: drop all state without finalizing
    /// scopes or resolving keyrefs
    pub fn abort(&mut self) {
        tracing::debug!(
            depth = self.depth,
            open_scopes = self.activator.len(),
            deferred = self.table.deferred_count(),
            "validation aborted"
        );
        self.reset();
    }

    fn reset(&mut self) {
        self.instances.clear();
        self.activator.discard();
        self.table.reset();
        self.next_instance = 0;
        self.depth = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::exceptions::{CollectingReporter, ErrorCode};
    use crate::validators::identities::IdentityBuilder;

    fn q(name: &str) -> QName {
        QName::local(name)
    }

    fn attr(name: &str, value: &str) -> (QName, TypedValue) {
        (q(name), TypedValue::string(value))
    }

    fn validator(constraints: Vec<XsdIdentity>) -> IdentityValidator<CollectingReporter> {
        let table = IdentityConstraintTable::new(constraints).unwrap();
        IdentityValidator::new(table, CollectingReporter::new())
    }

    fn unique_item_id() -> XsdIdentity {
        IdentityBuilder::unique()
            .name(q("u"))
            .element(q("list"))
            .selector("item")
            .field("@id")
            .build()
            .unwrap()
    }

    fn leaf(v: &mut IdentityValidator<CollectingReporter>, name: &str, attributes: &[(QName, TypedValue)]) {
        v.open_element(&q(name), attributes);
        v.close_element(&q(name));
    }

    #[test]
    fn test_duplicates_are_scoped_per_defining_instance() {
        let mut v = validator(vec![unique_item_id()]);

        v.open_element(&q("root"), &[]);
        for _ in 0..2 {
            v.open_element(&q("list"), &[]);
            leaf(&mut v, "item", &[attr("id", "1")]);
            v.close_element(&q("list"));
        }
        assert_eq!(v.committed(&q("u")).unwrap().len(), 1);
        v.close_element(&q("root"));
        let summary = v.end_document();

        assert!(v.reporter().is_empty());
        assert_eq!(summary.committed(&q("u")).len(), 1);
    }

    #[test]
    fn test_introspection() {
        let mut v = validator(vec![unique_item_id()]);

        v.open_element(&q("list"), &[]);
        v.open_element(&q("item"), &[attr("id", "1")]);
        assert_eq!(v.depth(), 2);
        assert_eq!(v.open_scope_count(), 1);
        v.close_element(&q("item"));
        assert_eq!(v.open_scope_count(), 0);
        assert!(v.committed(&q("u")).is_none());
        v.close_element(&q("list"));
        assert_eq!(v.committed(&q("u")).unwrap().len(), 1);
        assert_eq!(v.depth(), 0);
    }

    #[test]
    fn test_abort_discards_everything() {
        let keyref = IdentityBuilder::keyref()
            .name(q("r"))
            .element(q("list"))
            .selector("ref")
            .field("@to")
            .refer(q("u"))
            .build()
            .unwrap();
        let mut v = validator(vec![unique_item_id(), keyref]);

        v.open_element(&q("list"), &[]);
        leaf(&mut v, "ref", &[attr("to", "9")]);
        assert_eq!(v.deferred_keyref_count(), 1);
        v.open_element(&q("item"), &[attr("id", "1")]);
        v.abort();

        assert_eq!(v.depth(), 0);
        assert_eq!(v.open_scope_count(), 0);
        assert_eq!(v.deferred_keyref_count(), 0);
        assert!(v.reporter().is_empty());

        // reusable after abort
        v.open_element(&q("list"), &[]);
        leaf(&mut v, "ref", &[attr("to", "9")]);
        v.close_element(&q("list"));
        v.end_document();
        assert_eq!(v.reporter().codes(), vec![ErrorCode::KeyRefNotFound]);
    }

    #[test]
    fn test_constraint_on_selected_element_itself() {
        let key = IdentityBuilder::key()
            .name(q("self"))
            .element(q("item"))
            .selector(".")
            .field("@id")
            .build()
            .unwrap();
        let mut v = validator(vec![key]);

        leaf(&mut v, "item", &[]);
        leaf(&mut v, "item", &[attr("id", "1")]);
        v.end_document();

        assert_eq!(v.reporter().codes(), vec![ErrorCode::AbsentKeyValue]);
    }
}
