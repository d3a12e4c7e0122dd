//! Incremental matching of compiled patterns against a structural event stream
//!
//! A [`PathMatcher`] is activated by the open event of its context node and
//! then fed every open/attribute/text/close event of that node's subtree, in
//! document order. It never sees the tree: for every alternative of the
//! expression it keeps the set of partial matches still alive, each recorded
//! as "the first `step` steps are satisfied at relative depth `level`".
//! Descendant steps make that set non-deterministic, so it is a set rather
//! than a single index.

use std::sync::Arc;

use crate::namespaces::QName;
use crate::validators::TypedValue;

use super::selectors::{Axis, LocationPath, PathExpression, PatternKind};

/// Outcome of feeding one event to a [`PathMatcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSignal {
    /// The event did not advance any alternative
    NoMatch,
    /// Some alternative progressed but none is complete
    Partial,
    /// The opened element satisfies the whole path. Field matchers deliver
    /// its value with the element's character content.
    Selected,
    /// A value-bearing node satisfies the path
    Matched {
        /// The attribute or content value
        value: TypedValue,
        /// Whether the content was nil (`xsi:nil="true"`)
        is_nil: bool,
        /// How many alternatives matched this same node
        alternatives: usize,
    },
    /// A selected element closed without reporting character content
    Unvalued,
}

impl MatchSignal {
    /// Check whether this signal carries a value
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchSignal::Matched { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct State {
    /// Number of leading steps satisfied
    step: usize,
    /// Relative depth of the node that satisfied them
    level: usize,
    /// A descendant-or-self step precedes `step`: the next step may be
    /// satisfied at any depth below `level`, not only the next one
    floating: bool,
}

/// Element awaiting its character content
#[derive(Debug, Clone, Copy)]
struct Pending {
    depth: usize,
    alternatives: usize,
}

/// Per-instance matcher for one [`PathExpression`]
#[derive(Debug, Clone)]
pub struct PathMatcher {
    expression: Arc<PathExpression>,
    /// Relative depth of the current node; 0 is the context node
    depth: usize,
    started: bool,
    finished: bool,
    /// Live states, one set per alternative
    states: Vec<Vec<State>>,
    pending: Vec<Pending>,
}

impl PathMatcher {
    /// Create a matcher; it activates on the first open event it receives
    pub fn new(expression: Arc<PathExpression>) -> Self {
        let alternatives = expression.paths().len();
        Self {
            expression,
            depth: 0,
            started: false,
            finished: false,
            states: vec![Vec::new(); alternatives],
            pending: Vec::new(),
        }
    }

    /// The compiled expression driving this matcher
    pub fn expression(&self) -> &Arc<PathExpression> {
        &self.expression
    }

    /// Relative depth of the current node
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Check whether the context node has been opened and not yet closed
    pub fn is_active(&self) -> bool {
        self.started && !self.finished
    }

    /// Check whether the context node has closed
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed an element open event
    pub fn advance_open(&mut self, name: &QName) -> MatchSignal {
        if self.finished {
            return MatchSignal::NoMatch;
        }

        let mut selected = 0;
        let mut progressed = false;

        if !self.started {
            self.started = true;
            self.depth = 0;
            for (path, states) in self.expression.paths().iter().zip(self.states.iter_mut()) {
                settle(path, State { step: 0, level: 0, floating: false }, states);
                if states.iter().any(|st| st.step == path.len()) {
                    selected += 1;
                } else {
                    progressed = true;
                }
            }
        } else {
            self.depth += 1;
            let depth = self.depth;
            for (path, states) in self.expression.paths().iter().zip(self.states.iter_mut()) {
                let mut reached = Vec::new();
                let mut hit = false;
                for st in states.iter() {
                    match path.steps.get(st.step) {
                        None => {
                            // `.//.` keeps selecting every descendant
                            if st.floating && st.level < depth {
                                hit = true;
                            }
                        }
                        Some(step) if step.axis == Axis::Child => {
                            let reachable = if st.floating {
                                depth > st.level
                            } else {
                                depth == st.level + 1
                            };
                            if reachable && step.name_test.matches(name) {
                                let next = State { step: st.step + 1, level: depth, floating: false };
                                settle(path, next, &mut reached);
                            }
                        }
                        Some(_) => {}
                    }
                }
                for st in reached {
                    if st.step == path.len() {
                        hit = true;
                    } else {
                        progressed = true;
                    }
                    if !states.contains(&st) {
                        states.push(st);
                    }
                }
                if hit {
                    selected += 1;
                }
            }
        }

        if selected > 0 {
            tracing::trace!(pattern = %self.expression, %name, depth = self.depth, "element selected");
            if self.expression.kind() == PatternKind::Field {
                self.pending.push(Pending {
                    depth: self.depth,
                    alternatives: selected,
                });
            }
            MatchSignal::Selected
        } else if progressed {
            MatchSignal::Partial
        } else {
            MatchSignal::NoMatch
        }
    }

    /// Feed an attribute of the most recently opened element
    pub fn advance_attribute(&mut self, name: &QName, value: &TypedValue) -> MatchSignal {
        if !self.is_active() {
            return MatchSignal::NoMatch;
        }

        let depth = self.depth;
        let alternatives = self
            .expression
            .paths()
            .iter()
            .zip(self.states.iter())
            .filter(|(path, states)| {
                states.iter().any(|st| {
                    st.step + 1 == path.len()
                        && path.steps[st.step].axis == Axis::Attribute
                        && path.steps[st.step].name_test.matches(name)
                        && if st.floating { depth >= st.level } else { depth == st.level }
                })
            })
            .count();

        if alternatives == 0 {
            return MatchSignal::NoMatch;
        }
        tracing::trace!(pattern = %self.expression, %name, %value, "attribute matched");
        MatchSignal::Matched {
            value: value.clone(),
            is_nil: false,
            alternatives,
        }
    }

    /// Feed the character content of the most recently opened element
    pub fn advance_text(&mut self, value: &TypedValue, is_nil: bool) -> MatchSignal {
        if !self.is_active() {
            return MatchSignal::NoMatch;
        }
        match self.pending.last() {
            Some(pending) if pending.depth == self.depth => {
                let alternatives = pending.alternatives;
                self.pending.pop();
                tracing::trace!(pattern = %self.expression, %value, is_nil, "content matched");
                MatchSignal::Matched {
                    value: value.clone(),
                    is_nil,
                    alternatives,
                }
            }
            _ => MatchSignal::NoMatch,
        }
    }

    /// Feed an element close event
    pub fn advance_close(&mut self) -> MatchSignal {
        if !self.is_active() {
            return MatchSignal::NoMatch;
        }

        let depth = self.depth;
        let signal = match self.pending.last() {
            Some(pending) if pending.depth == depth => {
                self.pending.pop();
                MatchSignal::Unvalued
            }
            _ => MatchSignal::NoMatch,
        };

        // Progress made at this depth cannot outlive the element
        for states in &mut self.states {
            states.retain(|st| st.level < depth);
        }

        if depth == 0 {
            self.finished = true;
        } else {
            self.depth -= 1;
        }
        signal
    }
}

/// Take `state` through any self and descendant-or-self steps, which consume
/// no node, and record the result in `out`
fn settle(path: &LocationPath, mut state: State, out: &mut Vec<State>) {
    while let Some(step) = path.steps.get(state.step) {
        match step.axis {
            Axis::Self_ => state.step += 1,
            Axis::DescendantOrSelf => {
                state.step += 1;
                state.floating = true;
            }
            Axis::Child | Axis::Attribute => break,
        }
    }
    if !out.contains(&state) {
        out.push(state);
    }
}
