//! Field activation within selector scopes
//!
//! Every element a selector picks out starts a [`ScopeInstance`]: one field
//! matcher per declared field, rooted at that element, and a pending tuple
//! with one empty slot per field. The [`FieldActivator`] owns all open
//! scopes, forwards structural events to their field matchers and records
//! the values they deliver. A field fills its slot at most once per scope.

use std::sync::Arc;

use crate::namespaces::QName;
use crate::xpath::{MatchSignal, PathMatcher};

use super::exceptions::{ConstraintViolation, ErrorCode, ErrorReporter};
use super::identities::XsdIdentity;
use super::values::TypedValue;

/// One activation of a constraint, bounded by the selected element
#[derive(Debug, Clone)]
pub struct ScopeInstance {
    id: usize,
    identity: Arc<XsdIdentity>,
    /// Defining-element instance whose selector opened this scope
    owner: usize,
    element: QName,
    /// Depth below the selected element
    depth: usize,
    matchers: Vec<PathMatcher>,
    /// (value, nil) per field
    slots: Vec<Option<(TypedValue, bool)>>,
    may_match: Vec<bool>,
}

impl ScopeInstance {
    /// Create a scope with all slots empty; field matchers are not yet
    /// activated
    pub fn new(id: usize, identity: Arc<XsdIdentity>, owner: usize, element: QName) -> Self {
        let matchers = identity.fields.iter().map(|f| f.matcher()).collect();
        let count = identity.field_count();
        Self {
            id,
            identity,
            owner,
            element,
            depth: 0,
            matchers,
            slots: vec![None; count],
            may_match: vec![true; count],
        }
    }

    /// Ordinal of this scope within the document
    pub fn id(&self) -> usize {
        self.id
    }

    /// The constraint this scope belongs to
    pub fn identity(&self) -> &Arc<XsdIdentity> {
        &self.identity
    }

    /// Defining-element instance that owns this scope
    pub fn owner(&self) -> usize {
        self.owner
    }

    /// The selected element
    pub fn element(&self) -> &QName {
        &self.element
    }

    /// Value recorded for field `index`
    pub fn value(&self, index: usize) -> Option<&TypedValue> {
        self.slots.get(index)?.as_ref().map(|(value, _)| value)
    }

    /// Whether field `index` can still match
    pub fn may_match(&self, index: usize) -> bool {
        self.may_match.get(index).copied().unwrap_or(false)
    }

    /// Record a value for field `index`, closing the field
    pub fn set_value(&mut self, index: usize, value: TypedValue, is_nil: bool) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some((value, is_nil));
            self.may_match[index] = false;
        }
    }

    /// Consume the scope, yielding the selected element and its slots
    pub fn into_slots(self) -> (QName, Vec<Option<(TypedValue, bool)>>) {
        (self.element, self.slots)
    }

    fn violation(&self, code: ErrorCode) -> ConstraintViolation {
        ConstraintViolation::new(code, self.identity.name.clone(), self.element.clone())
    }

    fn accept<R: ErrorReporter + ?Sized>(&mut self, index: usize, signal: MatchSignal, reporter: &mut R) {
        match signal {
            MatchSignal::Matched {
                value,
                is_nil,
                alternatives,
            } => {
                if !self.may_match[index] {
                    tracing::debug!(constraint = %self.identity.name, field = index, %value, "field matched again");
                    reporter.report_constraint_error(
                        self.violation(ErrorCode::FieldMultipleMatch).with_values(value.to_string()),
                    );
                    return;
                }
                if alternatives > 1 {
                    reporter.report_constraint_error(
                        self.violation(ErrorCode::FieldMultipleMatch).with_values(value.to_string()),
                    );
                }
                if is_nil && self.identity.is_key() {
                    reporter.report_constraint_error(self.violation(ErrorCode::KeyMatchesNillable));
                }
                self.set_value(index, value, is_nil);
            }
            MatchSignal::Unvalued => {
                let code = if self.may_match[index] {
                    ErrorCode::FieldNotSimpleContent
                } else {
                    ErrorCode::FieldMultipleMatch
                };
                reporter.report_constraint_error(self.violation(code));
            }
            MatchSignal::NoMatch | MatchSignal::Partial | MatchSignal::Selected => {}
        }
    }
}

/// Owner of all open scope instances
#[derive(Debug, Clone, Default)]
pub struct FieldActivator {
    scopes: Vec<ScopeInstance>,
    next_id: usize,
}

impl FieldActivator {
    /// Create an activator with no open scopes
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open scopes
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Check if no scope is open
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Open scopes, outermost first
    pub fn scopes(&self) -> &[ScopeInstance] {
        &self.scopes
    }

    /// Open a scope on the element that was just opened and return its id.
    ///
    /// Must be called after [`open_element`](Self::open_element) for the
    /// same event, so the new field matchers see the element only once.
    pub fn activate(&mut self, identity: Arc<XsdIdentity>, owner: usize, element: &QName) -> usize {
        let id = self.next_id;
        self.next_id += 1;

        let mut scope = ScopeInstance::new(id, identity, owner, element.clone());
        for matcher in &mut scope.matchers {
            matcher.advance_open(element);
        }
        tracing::debug!(constraint = %scope.identity.name, %element, scope = id, "scope opened");
        self.scopes.push(scope);
        id
    }

    /// Forward an element open to every open scope
    pub fn open_element(&mut self, name: &QName) {
        for scope in &mut self.scopes {
            scope.depth += 1;
            for matcher in &mut scope.matchers {
                matcher.advance_open(name);
            }
        }
    }

    /// Forward an attribute of the current element to every open scope
    pub fn attribute<R: ErrorReporter + ?Sized>(&mut self, name: &QName, value: &TypedValue, reporter: &mut R) {
        for scope in &mut self.scopes {
            for index in 0..scope.matchers.len() {
                let signal = scope.matchers[index].advance_attribute(name, value);
                scope.accept(index, signal, reporter);
            }
        }
    }

    /// Forward the current element's character content to every open scope
    pub fn character_content<R: ErrorReporter + ?Sized>(&mut self, value: &TypedValue, is_nil: bool, reporter: &mut R) {
        for scope in &mut self.scopes {
            for index in 0..scope.matchers.len() {
                let signal = scope.matchers[index].advance_text(value, is_nil);
                scope.accept(index, signal, reporter);
            }
        }
    }

    /// Forward an element close to every open scope and return the scopes
    /// rooted at the closing element, in the order they were opened
    pub fn close_element<R: ErrorReporter + ?Sized>(&mut self, reporter: &mut R) -> Vec<ScopeInstance> {
        let mut closed = Vec::new();
        let mut open = Vec::with_capacity(self.scopes.len());

        for mut scope in self.scopes.drain(..) {
            for index in 0..scope.matchers.len() {
                let signal = scope.matchers[index].advance_close();
                scope.accept(index, signal, reporter);
            }
            if scope.depth == 0 {
                tracing::debug!(constraint = %scope.identity.name, element = %scope.element, scope = scope.id, "scope closed");
                closed.push(scope);
            } else {
                scope.depth -= 1;
                open.push(scope);
            }
        }

        self.scopes = open;
        closed
    }

    /// Drop every open scope without finalizing it
    pub fn discard(&mut self) {
        self.scopes.clear();
        self.next_id = 0;
    }
}
