//! Cardinality bound storage and candidate threshold derivation.
//!
//! A bound limits how many objects a subject may have for a property:
//! at-least (lower) and at-most (upper). Effective bounds resolve in
//! precedence order:
//!
//! 1. explicit per-subject assertion,
//! 2. property-wide default (a functional property defaults every subject
//!    to at-most 1),
//! 3. for lower bounds only, the observed object count,
//! 4. otherwise 0 (lower) / unbounded (upper).
//!
//! The store also derives, per property, the candidate threshold sets that
//! seed rule search: asserted values up to [`CANDIDATE_THRESHOLD_CAP`], a
//! synthetic at-most 0 for every property, and at-least candidates from
//! small observed counts. Candidate sets are sorted so search can walk each
//! monotonic implication chain from its strongest member.

use ahash::AHashMap;
use std::collections::{BTreeMap, BTreeSet};

use crate::{FactStore, NodeId};

/// Asserted and derived thresholds above this value do not seed rule
/// search.
pub const CANDIDATE_THRESHOLD_CAP: u64 = 5;

#[derive(Debug, Default)]
pub struct BoundStore {
    /// Explicit at-least assertions: property -> subject -> bound
    at_least_by_subject: AHashMap<NodeId, AHashMap<NodeId, u64>>,
    /// Explicit at-most assertions: property -> subject -> bound
    at_most_by_subject: AHashMap<NodeId, AHashMap<NodeId, u64>>,
    /// Property-wide at-least defaults
    at_least_defaults: AHashMap<NodeId, u64>,
    /// Property-wide at-most defaults
    at_most_defaults: AHashMap<NodeId, u64>,
    /// Candidate at-least thresholds per property, sorted
    candidate_at_least: BTreeMap<NodeId, BTreeSet<u64>>,
    /// Candidate at-most thresholds per property, sorted
    candidate_at_most: BTreeMap<NodeId, BTreeSet<u64>>,
}

impl BoundStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an explicit at-least bound. A value of 0 carries no
    /// information and is dropped.
    pub fn assert_at_least(&mut self, subject: NodeId, property: NodeId, value: u64) {
        if value == 0 {
            return;
        }
        self.at_least_by_subject
            .entry(property)
            .or_insert_with(AHashMap::new)
            .insert(subject, value);
        if value <= CANDIDATE_THRESHOLD_CAP {
            self.candidate_at_least
                .entry(property)
                .or_default()
                .insert(value);
        }
    }

    /// Record an explicit at-most bound.
    pub fn assert_at_most(&mut self, subject: NodeId, property: NodeId, value: u64) {
        self.at_most_by_subject
            .entry(property)
            .or_insert_with(AHashMap::new)
            .insert(subject, value);
        if value <= CANDIDATE_THRESHOLD_CAP {
            self.candidate_at_most
                .entry(property)
                .or_default()
                .insert(value);
        }
    }

    /// Declare a property functional: every subject without an explicit
    /// at-most bound defaults to at-most 1, and 1 seeds both candidate
    /// sets.
    pub fn set_functional(&mut self, property: NodeId) {
        self.at_most_defaults.insert(property, 1);
        self.candidate_at_most
            .entry(property)
            .or_default()
            .insert(1);
        self.candidate_at_least
            .entry(property)
            .or_default()
            .insert(1);
    }

    /// Set a property-wide at-least default.
    pub fn set_lower_default(&mut self, property: NodeId, value: u64) {
        self.at_least_defaults.insert(property, value);
    }

    /// Set a property-wide at-most default.
    pub fn set_upper_default(&mut self, property: NodeId, value: u64) {
        self.at_most_defaults.insert(property, value);
    }

    /// Derive the synthetic candidates from loaded fact data: at-most 0 for
    /// every known property, and at-least candidates from observed counts
    /// strictly below the cap. Call once after loading completes.
    pub fn derive_candidates(&mut self, facts: &FactStore) {
        for property in facts.properties() {
            self.candidate_at_most
                .entry(property)
                .or_default()
                .insert(0);
        }
        for property in facts.properties() {
            for (_, objects) in facts.forward_entries(property) {
                let observed = objects.len();
                if observed < CANDIDATE_THRESHOLD_CAP {
                    self.candidate_at_least
                        .entry(property)
                        .or_default()
                        .insert(observed);
                }
            }
        }
    }

    /// Effective at-most bound; `u64::MAX` when unbounded.
    pub fn effective_upper(&self, _facts: &FactStore, subject: NodeId, property: NodeId) -> u64 {
        self.at_most_by_subject
            .get(&property)
            .and_then(|subjects| subjects.get(&subject))
            .copied()
            .or_else(|| self.at_most_defaults.get(&property).copied())
            .unwrap_or(u64::MAX)
    }

    /// Effective at-least bound; falls back to the observed object count.
    pub fn effective_lower(&self, facts: &FactStore, subject: NodeId, property: NodeId) -> u64 {
        self.at_least_by_subject
            .get(&property)
            .and_then(|subjects| subjects.get(&subject))
            .copied()
            .or_else(|| self.at_least_defaults.get(&property).copied())
            .unwrap_or_else(|| facts.object_count(subject, property))
    }

    /// Sorted candidate at-least thresholds for one property.
    pub fn candidate_lower_thresholds(&self, property: NodeId) -> Vec<u64> {
        self.candidate_at_least
            .get(&property)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Sorted candidate at-most thresholds for one property.
    pub fn candidate_upper_thresholds(&self, property: NodeId) -> Vec<u64> {
        self.candidate_at_most
            .get(&property)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All per-property candidate at-least sets, in property ID order.
    pub fn lower_candidates(&self) -> &BTreeMap<NodeId, BTreeSet<u64>> {
        &self.candidate_at_least
    }

    /// All per-property candidate at-most sets, in property ID order.
    pub fn upper_candidates(&self) -> &BTreeMap<NodeId, BTreeSet<u64>> {
        &self.candidate_at_most
    }
}
