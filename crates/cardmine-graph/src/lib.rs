//! Cardmine: indexed fact storage and cardinality rule mining.
//!
//! The fact base is a subject–property–object graph:
//!
//! 1. **Node Interning**: All terms stored once, referenced by dense u32 ID
//! 2. **Dual Inverted Indices**: property→subject→{objects} and
//!    property→object→{subjects}, kept mutually consistent
//! 3. **Bitmap Sets**: object/subject sets and the individuals set are
//!    Roaring bitmaps over node IDs
//! 4. **Bound Resolution**: effective cardinality bounds resolved from
//!    explicit assertions, property-wide defaults, and observed counts
//!
//! ## Module Organization
//!
//! - `bounds`: cardinality bound store and candidate thresholds
//! - `load`: record loading with deferred bound resolution
//! - `query`: two-variable bindings and the conjunctive body evaluator
//! - `rule`: boundary constraints, triple patterns, scored rules
//! - `mine`: the four-phase greedy rule search
//! - `apply`: ranked-rule aggregation into exact cardinalities

pub mod apply;
pub mod bounds;
pub mod load;
pub mod mine;
pub mod query;
pub mod rule;

use ahash::AHashMap;
use dashmap::DashMap;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};

pub use apply::{apply_rules, derive_exact_cardinalities, AggregationOutcome, Estimate};
pub use bounds::{BoundStore, CANDIDATE_THRESHOLD_CAP};
pub use load::{LoadStats, Loader};
pub use mine::{MiningConfig, RuleMiner};
pub use query::{Binding, BodyEvaluator, Var, NUM_VARS};
pub use rule::{Boundary, Direction, Rule, TriplePattern, MAX_CONFIDENCE};

// ============================================================================
// Node Interning (Compact Term Storage)
// ============================================================================

/// Interned node ID (4 bytes instead of 24+ for String)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Node interner: maps opaque terms to compact IDs.
///
/// IDs are dense and append-only; the reverse mapping is immutable once an
/// ID has been assigned.
pub struct NodeInterner {
    /// Term to ID mapping
    term_to_id: DashMap<String, NodeId>,
    /// ID to term mapping (for reverse lookup)
    id_to_term: DashMap<NodeId, String>,
    /// Next available ID
    next_id: AtomicU32,
}

impl NodeInterner {
    pub fn new() -> Self {
        Self {
            term_to_id: DashMap::new(),
            id_to_term: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Intern a term, returning its ID
    pub fn intern(&self, term: &str) -> NodeId {
        if let Some(id) = self.term_to_id.get(term) {
            return *id;
        }

        let id = NodeId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.term_to_id.insert(term.to_string(), id);
        self.id_to_term.insert(id, term.to_string());
        id
    }

    /// Look up an existing ID for a term without inserting.
    pub fn id_of(&self, term: &str) -> Option<NodeId> {
        self.term_to_id.get(term).map(|id| *id)
    }

    /// Look up term by ID
    pub fn lookup(&self, id: NodeId) -> Option<String> {
        self.id_to_term.get(&id).map(|term| term.clone())
    }

    /// Number of interned terms.
    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NodeInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fact Storage (Dual Inverted Indices)
// ============================================================================

/// Indexed fact storage over interned node IDs.
///
/// Every fact `(subject, property, object)` lives in both indices:
/// `forward[property][subject]` contains `object` iff
/// `backward[property][object]` contains `subject`. Facts have set
/// semantics, so inserting an existing fact is a no-op.
#[derive(Debug, Default)]
pub struct FactStore {
    /// Forward index: property -> subject -> {objects}
    forward: AHashMap<NodeId, AHashMap<NodeId, RoaringBitmap>>,
    /// Backward index: property -> object -> {subjects}
    backward: AHashMap<NodeId, AHashMap<NodeId, RoaringBitmap>>,
    /// Properties seen in fact data, in ID order
    properties: BTreeSet<NodeId>,
    /// Every node seen as a subject or object of a fact, plus subjects of
    /// accepted bound assertions
    individuals: RoaringBitmap,
    /// Number of distinct facts
    fact_count: u64,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct facts stored.
    pub fn len(&self) -> u64 {
        self.fact_count
    }

    pub fn is_empty(&self) -> bool {
        self.fact_count == 0
    }

    /// Insert one fact. Idempotent: both indices stay consistent and
    /// duplicates collapse.
    pub fn insert(&mut self, subject: NodeId, property: NodeId, object: NodeId) {
        let newly_added = self
            .forward
            .entry(property)
            .or_insert_with(AHashMap::new)
            .entry(subject)
            .or_insert_with(RoaringBitmap::new)
            .insert(object.raw());
        self.backward
            .entry(property)
            .or_insert_with(AHashMap::new)
            .entry(object)
            .or_insert_with(RoaringBitmap::new)
            .insert(subject.raw());

        if newly_added {
            self.fact_count += 1;
        }
        self.properties.insert(property);
        self.individuals.insert(subject.raw());
        self.individuals.insert(object.raw());
    }

    /// Objects of `subject` under `property`. `None` means the empty set.
    pub fn objects(&self, property: NodeId, subject: NodeId) -> Option<&RoaringBitmap> {
        self.forward.get(&property)?.get(&subject)
    }

    /// Subjects reaching `object` under `property`. `None` means the empty set.
    pub fn subjects(&self, property: NodeId, object: NodeId) -> Option<&RoaringBitmap> {
        self.backward.get(&property)?.get(&object)
    }

    /// Membership test for one fact.
    pub fn contains(&self, subject: NodeId, property: NodeId, object: NodeId) -> bool {
        self.objects(property, subject)
            .map(|objects| objects.contains(object.raw()))
            .unwrap_or(false)
    }

    /// Observed number of objects for `(subject, property)`.
    pub fn object_count(&self, subject: NodeId, property: NodeId) -> u64 {
        self.objects(property, subject)
            .map(|objects| objects.len())
            .unwrap_or(0)
    }

    /// All `(subject, {objects})` entries of a property's forward index.
    pub fn forward_entries(
        &self,
        property: NodeId,
    ) -> impl Iterator<Item = (NodeId, &RoaringBitmap)> + '_ {
        self.forward
            .get(&property)
            .into_iter()
            .flat_map(|subjects| subjects.iter().map(|(&subject, objects)| (subject, objects)))
    }

    /// Properties seen in fact data, in ID order.
    pub fn properties(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.properties.iter().copied()
    }

    pub fn is_property(&self, id: NodeId) -> bool {
        self.properties.contains(&id)
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Every known individual, in ID order.
    pub fn individuals(&self) -> &RoaringBitmap {
        &self.individuals
    }

    pub fn individual_count(&self) -> u64 {
        self.individuals.len()
    }

    /// Register a node as a known individual without asserting a fact.
    ///
    /// Used for subjects of accepted bound assertions, which count toward
    /// the universal binding set even when they carry no facts.
    pub fn add_individual(&mut self, id: NodeId) {
        self.individuals.insert(id.raw());
    }
}

// ============================================================================
// Knowledge Base
// ============================================================================

/// The complete fact base: interner + fact indices + cardinality bounds.
///
/// Write-once during load, read-only for mining and aggregation. The
/// instance is passed explicitly to every consumer; there is no global
/// state.
#[derive(Default)]
pub struct KnowledgeBase {
    pub interner: NodeInterner,
    pub facts: FactStore,
    pub bounds: BoundStore,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern the three terms and insert the fact.
    pub fn add_fact(&mut self, subject: &str, property: &str, object: &str) {
        let subject = self.interner.intern(subject);
        let property = self.interner.intern(property);
        let object = self.interner.intern(object);
        self.facts.insert(subject, property, object);
    }

    /// Look up an existing node ID for a term.
    pub fn node(&self, term: &str) -> Option<NodeId> {
        self.interner.id_of(term)
    }

    /// Resolve a node ID back to its term.
    pub fn term(&self, id: NodeId) -> Option<String> {
        self.interner.lookup(id)
    }

    /// Effective at-most bound for `(subject, property)`; `u64::MAX` when
    /// unbounded.
    pub fn effective_upper_bound(&self, subject: NodeId, property: NodeId) -> u64 {
        self.bounds.effective_upper(&self.facts, subject, property)
    }

    /// Effective at-least bound for `(subject, property)`; falls back to the
    /// observed object count.
    pub fn effective_lower_bound(&self, subject: NodeId, property: NodeId) -> u64 {
        self.bounds.effective_lower(&self.facts, subject, property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn interner_assigns_dense_stable_ids() {
        let interner = NodeInterner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        assert_ne!(a, b);
        assert_eq!(interner.intern("a"), a);
        assert_eq!(interner.id_of("b"), Some(b));
        assert_eq!(interner.lookup(a).as_deref(), Some("a"));
        assert_eq!(interner.id_of("c"), None);
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn fact_indices_stay_consistent() {
        let mut kb = KnowledgeBase::new();
        kb.add_fact("a", "p", "b");
        kb.add_fact("a", "p", "c");
        kb.add_fact("d", "p", "b");

        let (a, p, b) = (
            kb.node("a").unwrap(),
            kb.node("p").unwrap(),
            kb.node("b").unwrap(),
        );
        let (c, d) = (kb.node("c").unwrap(), kb.node("d").unwrap());

        assert!(kb.facts.contains(a, p, b));
        assert!(kb.facts.contains(a, p, c));
        assert!(!kb.facts.contains(d, p, c));

        let objects = kb.facts.objects(p, a).unwrap();
        assert_eq!(objects.len(), 2);
        let subjects = kb.facts.subjects(p, b).unwrap();
        assert!(subjects.contains(a.raw()) && subjects.contains(d.raw()));

        assert_eq!(kb.facts.object_count(a, p), 2);
        assert_eq!(kb.facts.object_count(d, p), 1);
        assert_eq!(kb.facts.property_count(), 1);
        assert_eq!(kb.facts.individual_count(), 4);
    }

    #[test]
    fn missing_lookups_are_empty() {
        let store = FactStore::new();
        let id = NodeId::new(0);
        assert!(store.objects(id, id).is_none());
        assert!(store.subjects(id, id).is_none());
        assert!(!store.contains(id, id, id));
        assert_eq!(store.object_count(id, id), 0);
        assert_eq!(store.forward_entries(id).count(), 0);
    }

    #[test]
    fn insertion_is_idempotent() {
        let mut store = FactStore::new();
        let (s, p, o) = (NodeId::new(0), NodeId::new(1), NodeId::new(2));
        store.insert(s, p, o);
        store.insert(s, p, o);
        assert_eq!(store.len(), 1);
        assert_eq!(store.objects(p, s).unwrap().len(), 1);
        assert_eq!(store.subjects(p, o).unwrap().len(), 1);
    }

    proptest! {
        // Forward and backward indices agree with `contains` for every
        // loaded fact, and double insertion never changes observable state.
        #[test]
        fn index_consistency(facts in proptest::collection::vec((0u32..24, 0u32..4, 0u32..24), 1..64)) {
            let mut store = FactStore::new();
            for &(s, p, o) in &facts {
                store.insert(NodeId::new(s), NodeId::new(p), NodeId::new(o));
            }
            let first_count = store.len();
            for &(s, p, o) in &facts {
                store.insert(NodeId::new(s), NodeId::new(p), NodeId::new(o));
            }
            prop_assert_eq!(store.len(), first_count);

            for &(s, p, o) in &facts {
                let (s, p, o) = (NodeId::new(s), NodeId::new(p), NodeId::new(o));
                prop_assert!(store.contains(s, p, o));
                prop_assert!(store.objects(p, s).unwrap().contains(o.raw()));
                prop_assert!(store.subjects(p, o).unwrap().contains(s.raw()));
            }
        }
    }
}
