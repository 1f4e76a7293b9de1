//! Two-variable bindings and the conjunctive body evaluator.
//!
//! Rule bodies are conjunctions of triple patterns and boundary
//! constraints over two logical variables. Evaluation walks the patterns
//! in order, extending partial bindings through the fact indices and
//! filtering each extension against every boundary constraint immediately
//! (constraint pushdown), so intermediate binding sets stay small.

use serde::{Deserialize, Serialize};

use crate::rule::{Boundary, Direction, TriplePattern};
use crate::{BoundStore, FactStore, KnowledgeBase, NodeId};

/// Number of logical variables a rule may reference.
pub const NUM_VARS: usize = 2;

/// A logical variable, indexing a slot in a [`Binding`].
///
/// `X` is the primary variable (rule heads always constrain it); `Y` is
/// the secondary variable introduced by triple patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Var {
    X,
    Y,
}

impl Var {
    pub const ALL: [Var; NUM_VARS] = [Var::X, Var::Y];

    pub const fn index(self) -> usize {
        match self {
            Var::X => 0,
            Var::Y => 1,
        }
    }

    pub const fn name(self) -> char {
        match self {
            Var::X => 'x',
            Var::Y => 'y',
        }
    }
}

/// Unbound slot sentinel. Greater than every real node ID, so the derived
/// lexicographic order treats unbound slots as largest. The interner never
/// hands out this ID.
const UNBOUND: u32 = u32::MAX;

/// Partial assignment of the logical variables to node IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Binding {
    values: [u32; NUM_VARS],
}

impl Binding {
    pub const fn empty() -> Self {
        Self {
            values: [UNBOUND; NUM_VARS],
        }
    }

    pub fn get(self, var: Var) -> Option<NodeId> {
        match self.values[var.index()] {
            UNBOUND => None,
            raw => Some(NodeId::new(raw)),
        }
    }

    pub fn is_bound(self, var: Var) -> bool {
        self.values[var.index()] != UNBOUND
    }

    #[must_use]
    pub fn with(mut self, var: Var, value: NodeId) -> Self {
        self.values[var.index()] = value.raw();
        self
    }

    #[must_use]
    pub fn without(mut self, var: Var) -> Self {
        self.values[var.index()] = UNBOUND;
        self
    }
}

// ============================================================================
// Body evaluation
// ============================================================================

/// Evaluates rule bodies against shared read-only stores.
///
/// Pure: never mutates the stores, and one evaluator may score any number
/// of bodies.
pub struct BodyEvaluator<'a> {
    facts: &'a FactStore,
    bounds: &'a BoundStore,
}

impl<'a> BodyEvaluator<'a> {
    pub fn new(kb: &'a KnowledgeBase) -> Self {
        Self {
            facts: &kb.facts,
            bounds: &kb.bounds,
        }
    }

    pub fn from_stores(facts: &'a FactStore, bounds: &'a BoundStore) -> Self {
        Self { facts, bounds }
    }

    /// All bindings satisfying every triple pattern and boundary constraint.
    ///
    /// With no triple patterns the universal set is every known individual
    /// bound to the primary variable; otherwise bindings grow out of the
    /// indices pattern by pattern.
    pub fn evaluate(&self, patterns: &[TriplePattern], boundaries: &[Boundary]) -> Vec<Binding> {
        if patterns.is_empty() {
            return self
                .individual_bindings()
                .filter(|binding| self.matches_all(*binding, boundaries))
                .collect();
        }

        let mut bindings = vec![Binding::empty()];
        for pattern in patterns {
            bindings = self.extend_with_pattern(&bindings, pattern, boundaries);
        }
        bindings
    }

    /// One join step: extend every partial binding through `pattern`,
    /// filtering each extension against all boundary constraints.
    fn extend_with_pattern(
        &self,
        bindings: &[Binding],
        pattern: &TriplePattern,
        boundaries: &[Boundary],
    ) -> Vec<Binding> {
        let mut extended = Vec::new();
        for binding in bindings {
            match (binding.get(pattern.subject), binding.get(pattern.object)) {
                (Some(subject), Some(object)) => {
                    // Both ends fixed: a membership test, boundaries
                    // already held before this pattern.
                    if self.facts.contains(subject, pattern.property, object) {
                        extended.push(*binding);
                    }
                }
                (Some(subject), None) => {
                    for raw in self
                        .facts
                        .objects(pattern.property, subject)
                        .into_iter()
                        .flatten()
                    {
                        let candidate = binding.with(pattern.object, NodeId::new(raw));
                        if self.matches_all(candidate, boundaries) {
                            extended.push(candidate);
                        }
                    }
                }
                (None, Some(object)) => {
                    for raw in self
                        .facts
                        .subjects(pattern.property, object)
                        .into_iter()
                        .flatten()
                    {
                        let candidate = binding.with(pattern.subject, NodeId::new(raw));
                        if self.matches_all(candidate, boundaries) {
                            extended.push(candidate);
                        }
                    }
                }
                (None, None) => {
                    for (subject, objects) in self.facts.forward_entries(pattern.property) {
                        for raw in objects {
                            let candidate = binding
                                .with(pattern.subject, subject)
                                .with(pattern.object, NodeId::new(raw));
                            if self.matches_all(candidate, boundaries) {
                                extended.push(candidate);
                            }
                        }
                    }
                }
            }
        }
        extended
    }

    /// One binding per known individual, on the primary variable.
    pub fn individual_bindings(&self) -> impl Iterator<Item = Binding> + 'a {
        self.facts
            .individuals()
            .iter()
            .map(|raw| Binding::empty().with(Var::X, NodeId::new(raw)))
    }

    /// True when the effective bound of the constrained variable's value
    /// satisfies the boundary. A boundary on an unbound variable never
    /// matches.
    pub fn matches_boundary(&self, binding: Binding, boundary: &Boundary) -> bool {
        let Some(value) = binding.get(boundary.var) else {
            return false;
        };
        match boundary.direction {
            Direction::Upper => {
                boundary.threshold
                    >= self
                        .bounds
                        .effective_upper(self.facts, value, boundary.property)
            }
            Direction::Lower => {
                boundary.threshold
                    <= self
                        .bounds
                        .effective_lower(self.facts, value, boundary.property)
            }
        }
    }

    /// True when the boundary is provably false for the binding: the
    /// asserted threshold conflicts with the opposing effective bound.
    pub fn contradicts_boundary(&self, binding: Binding, boundary: &Boundary) -> bool {
        let Some(value) = binding.get(boundary.var) else {
            return false;
        };
        match boundary.direction {
            Direction::Upper => {
                boundary.threshold
                    < self
                        .bounds
                        .effective_lower(self.facts, value, boundary.property)
            }
            Direction::Lower => {
                boundary.threshold
                    > self
                        .bounds
                        .effective_upper(self.facts, value, boundary.property)
            }
        }
    }

    fn matches_all(&self, binding: Binding, boundaries: &[Boundary]) -> bool {
        boundaries
            .iter()
            .all(|boundary| self.matches_boundary(binding, boundary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KnowledgeBase;
    use std::collections::BTreeSet;

    fn node(kb: &KnowledgeBase, term: &str) -> NodeId {
        kb.node(term).unwrap()
    }

    fn family_kb() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        kb.add_fact("alice", "child", "bob");
        kb.add_fact("alice", "child", "carol");
        kb.add_fact("dave", "child", "bob");
        kb.add_fact("bob", "parent", "alice");
        kb
    }

    #[test]
    fn binding_order_places_unbound_last() {
        let x0 = Binding::empty().with(Var::X, NodeId::new(0));
        let x1 = Binding::empty().with(Var::X, NodeId::new(1));
        let x0y0 = x0.with(Var::Y, NodeId::new(0));
        assert!(x0 < x1);
        assert!(x0y0 < x0); // unbound Y sorts after any bound Y
        assert_eq!(x0y0.without(Var::Y), x0);
        assert!(!x0.is_bound(Var::Y));
        assert_eq!(x0.get(Var::X), Some(NodeId::new(0)));
    }

    #[test]
    fn empty_body_yields_all_individuals() {
        let kb = family_kb();
        let evaluator = BodyEvaluator::new(&kb);
        let bindings = evaluator.evaluate(&[], &[]);
        assert_eq!(bindings.len() as u64, kb.facts.individual_count());
        assert!(bindings.iter().all(|b| b.is_bound(Var::X) && !b.is_bound(Var::Y)));
    }

    #[test]
    fn empty_body_filters_by_head_variable_boundary() {
        let kb = family_kb();
        let child = node(&kb, "child");
        let evaluator = BodyEvaluator::new(&kb);
        // effective lower bound >= 2 holds only for alice (two children)
        let bindings = evaluator.evaluate(&[], &[Boundary::lower(Var::X, child, 2)]);
        let alice = node(&kb, "alice");
        assert_eq!(bindings, vec![Binding::empty().with(Var::X, alice)]);
    }

    #[test]
    fn forward_join_extends_bindings() {
        let kb = family_kb();
        let child = node(&kb, "child");
        let evaluator = BodyEvaluator::new(&kb);
        let pattern = TriplePattern::new(Var::X, child, Var::Y);
        let bindings = evaluator.evaluate(&[pattern], &[]);
        // one binding per fact of the property
        assert_eq!(bindings.len(), 3);
        let subjects: BTreeSet<_> = bindings.iter().map(|b| b.get(Var::X).unwrap()).collect();
        assert_eq!(
            subjects,
            BTreeSet::from([node(&kb, "alice"), node(&kb, "dave")])
        );
    }

    #[test]
    fn reversed_pattern_swaps_variable_roles() {
        let kb = family_kb();
        let child = node(&kb, "child");
        let evaluator = BodyEvaluator::new(&kb);
        // child(y, x) enumerates the same facts with the roles reversed
        let bindings = evaluator.evaluate(&[TriplePattern::new(Var::Y, child, Var::X)], &[]);
        assert_eq!(bindings.len(), 3);
        let objects: BTreeSet<_> = bindings.iter().map(|b| b.get(Var::X).unwrap()).collect();
        assert_eq!(
            objects,
            BTreeSet::from([node(&kb, "bob"), node(&kb, "carol")])
        );
    }

    #[test]
    fn forward_extension_joins_on_the_bound_subject() {
        let kb = family_kb();
        let child = node(&kb, "child");
        let evaluator = BodyEvaluator::new(&kb);
        let seed = vec![Binding::empty().with(Var::X, node(&kb, "alice"))];
        let bindings =
            evaluator.extend_with_pattern(&seed, &TriplePattern::new(Var::X, child, Var::Y), &[]);
        let objects: BTreeSet<_> = bindings.iter().map(|b| b.get(Var::Y).unwrap()).collect();
        assert_eq!(
            objects,
            BTreeSet::from([node(&kb, "bob"), node(&kb, "carol")])
        );
    }

    #[test]
    fn backward_extension_joins_on_the_bound_object() {
        let kb = family_kb();
        let child = node(&kb, "child");
        let evaluator = BodyEvaluator::new(&kb);
        let seed = vec![Binding::empty().with(Var::X, node(&kb, "bob"))];
        let bindings =
            evaluator.extend_with_pattern(&seed, &TriplePattern::new(Var::Y, child, Var::X), &[]);
        let subjects: BTreeSet<_> = bindings.iter().map(|b| b.get(Var::Y).unwrap()).collect();
        assert_eq!(
            subjects,
            BTreeSet::from([node(&kb, "alice"), node(&kb, "dave")])
        );
    }

    #[test]
    fn both_bound_pattern_is_a_membership_test() {
        let kb = family_kb();
        let (child, parent) = (node(&kb, "child"), node(&kb, "parent"));
        let evaluator = BodyEvaluator::new(&kb);
        // child(x, y) then parent(y, x): only (alice, bob) survives
        let bindings = evaluator.evaluate(
            &[
                TriplePattern::new(Var::X, child, Var::Y),
                TriplePattern::new(Var::Y, parent, Var::X),
            ],
            &[],
        );
        assert_eq!(
            bindings,
            vec![Binding::empty()
                .with(Var::X, node(&kb, "alice"))
                .with(Var::Y, node(&kb, "bob"))]
        );
    }

    #[test]
    fn boundary_pushdown_filters_extensions() {
        let kb = family_kb();
        let (child, parent) = (node(&kb, "child"), node(&kb, "parent"));
        let evaluator = BodyEvaluator::new(&kb);
        // child(x, y) restricted to y's with at least one parent fact
        let bindings = evaluator.evaluate(
            &[TriplePattern::new(Var::X, child, Var::Y)],
            &[Boundary::lower(Var::Y, parent, 1)],
        );
        let pairs: BTreeSet<_> = bindings
            .iter()
            .map(|b| (b.get(Var::X).unwrap(), b.get(Var::Y).unwrap()))
            .collect();
        assert_eq!(
            pairs,
            BTreeSet::from([
                (node(&kb, "alice"), node(&kb, "bob")),
                (node(&kb, "dave"), node(&kb, "bob")),
            ])
        );
    }

    #[test]
    fn boundary_on_unbound_variable_never_matches() {
        let kb = family_kb();
        let child = node(&kb, "child");
        let evaluator = BodyEvaluator::from_stores(&kb.facts, &kb.bounds);
        let boundary = Boundary::lower(Var::Y, child, 1);
        let binding = Binding::empty().with(Var::X, node(&kb, "alice"));
        assert!(!evaluator.matches_boundary(binding, &boundary));
        assert!(!evaluator.contradicts_boundary(binding, &boundary));
    }

    #[test]
    fn upper_boundary_match_is_monotone_in_the_threshold() {
        let mut kb = family_kb();
        let child = node(&kb, "child");
        kb.bounds.set_functional(child);
        let alice = node(&kb, "alice");
        kb.bounds.assert_at_most(alice, child, 2);

        let evaluator = BodyEvaluator::new(&kb);
        let binding = Binding::empty().with(Var::X, alice);
        assert!(!evaluator.matches_boundary(binding, &Boundary::upper(Var::X, child, 1)));
        for threshold in 2..=6 {
            assert!(evaluator.matches_boundary(binding, &Boundary::upper(Var::X, child, threshold)));
        }
    }
}
