//! Record loading with deferred bound resolution.
//!
//! The input source is noisy: malformed lines are skipped, and bound
//! assertions may reference properties the fact data never mentions
//! (those carry no information and are dropped). Assertions and
//! functional declarations are collected during the pass and resolved
//! against the known-property set only after every file has been read, so
//! load order does not matter.

use anyhow::{Context, Result};
use cardmine_records::{parse_record_v1, BoundKind, RecordV1};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::{KnowledgeBase, NodeId};

/// Counters for one loading session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub facts: u64,
    pub bound_assertions: u64,
    pub functional_declarations: u64,
    /// Malformed lines, skipped silently.
    pub skipped_lines: u64,
    /// Assertions and declarations naming properties absent from the fact
    /// data.
    pub dropped_assertions: u64,
}

#[derive(Debug)]
struct PendingBound {
    subject: NodeId,
    property: NodeId,
    kind: BoundKind,
    value: u64,
}

/// Streams records into a [`KnowledgeBase`].
///
/// Facts register immediately; bounds wait for [`Loader::finish`], which
/// also derives the candidate threshold sets. The knowledge base is
/// read-only from then on.
pub struct Loader<'a> {
    kb: &'a mut KnowledgeBase,
    pending_bounds: Vec<PendingBound>,
    pending_functionals: Vec<NodeId>,
    stats: LoadStats,
}

impl<'a> Loader<'a> {
    pub fn new(kb: &'a mut KnowledgeBase) -> Self {
        Self {
            kb,
            pending_bounds: Vec::new(),
            pending_functionals: Vec::new(),
            stats: LoadStats::default(),
        }
    }

    /// Load every record of one file.
    pub fn load_path(&mut self, path: &Path) -> Result<()> {
        let file =
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("cannot read {}", path.display()))?;
            match parse_record_v1(&line, index + 1) {
                Ok(Some(record)) => self.load_record(&record),
                Ok(None) => {}
                Err(_) => self.stats.skipped_lines += 1,
            }
        }
        Ok(())
    }

    /// Load a single record.
    pub fn load_record(&mut self, record: &RecordV1) {
        match record {
            RecordV1::Fact {
                subject,
                property,
                object,
            } => {
                self.kb.add_fact(subject, property, object);
                self.stats.facts += 1;
            }
            RecordV1::BoundAssertion {
                subject,
                property,
                kind,
                value,
            } => {
                let subject = self.kb.interner.intern(subject);
                let property = self.kb.interner.intern(property);
                self.pending_bounds.push(PendingBound {
                    subject,
                    property,
                    kind: *kind,
                    value: *value,
                });
                self.stats.bound_assertions += 1;
            }
            RecordV1::FunctionalDeclaration { property } => {
                let property = self.kb.interner.intern(property);
                self.pending_functionals.push(property);
                self.stats.functional_declarations += 1;
            }
        }
    }

    /// Resolve pending bounds against the known-property set and derive
    /// the candidate thresholds. Consumes the loader; the knowledge base
    /// is complete afterwards.
    pub fn finish(self) -> LoadStats {
        let Loader {
            kb,
            pending_bounds,
            pending_functionals,
            mut stats,
        } = self;

        for pending in pending_bounds {
            if !kb.facts.is_property(pending.property) {
                stats.dropped_assertions += 1;
                continue;
            }
            match pending.kind {
                BoundKind::AtLeast => {
                    kb.bounds
                        .assert_at_least(pending.subject, pending.property, pending.value)
                }
                BoundKind::AtMost => {
                    kb.bounds
                        .assert_at_most(pending.subject, pending.property, pending.value)
                }
                BoundKind::Exact => {
                    kb.bounds
                        .assert_at_least(pending.subject, pending.property, pending.value);
                    kb.bounds
                        .assert_at_most(pending.subject, pending.property, pending.value);
                }
            }
            kb.facts.add_individual(pending.subject);
        }

        for property in pending_functionals {
            if kb.facts.is_property(property) {
                kb.bounds.set_functional(property);
            } else {
                stats.dropped_assertions += 1;
            }
        }

        kb.bounds.derive_candidates(&kb.facts);
        stats
    }
}
