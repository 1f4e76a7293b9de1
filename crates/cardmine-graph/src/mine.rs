//! The four-phase greedy rule search.
//!
//! Candidate heads come from the per-property candidate threshold sets,
//! walked strongest-first so each list forms a monotonic implication
//! chain. Refinement phases only accept a candidate whose confidence
//! strictly exceeds the best already accepted from the same chain, which
//! prunes logically redundant thresholds without enumerating subsets.
//!
//! Phases:
//! 1. head generation (empty bodies, scored against the universal set)
//! 2. one extra boundary on the primary variable
//! 3. a triple pattern introducing the secondary variable, optionally
//!    refined by a boundary on it
//! 4. merges of accepted phase-2 and phase-3 rules sharing a head
//!
//! Phase 1 scoring is side-effect free and runs data-parallel; the
//! chain-dependent phases and the merge stay sequential.

use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::query::{Binding, BodyEvaluator, Var};
use crate::rule::{Boundary, Rule, TriplePattern, MAX_CONFIDENCE};
use crate::KnowledgeBase;

/// Search floors and output size. Defaults are the production values; the
/// CLI exposes all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Minimum number of supporting bindings for a candidate to survive.
    pub min_support: u64,
    /// Minimum confidence (percent) for a rule to reach the result pool.
    pub min_confidence: u64,
    /// Ranked rules returned.
    pub top_k: usize,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_support: 200,
            min_confidence: 1,
            top_k: 1000,
        }
    }
}

/// Generates, scores, prunes, and merges candidate rules over a loaded
/// knowledge base.
pub struct RuleMiner<'a> {
    kb: &'a KnowledgeBase,
    config: MiningConfig,
}

impl<'a> RuleMiner<'a> {
    pub fn new(kb: &'a KnowledgeBase, config: MiningConfig) -> Self {
        Self { kb, config }
    }

    /// Run all four phases and return the ranked top-K rules.
    pub fn mine(&self) -> Result<Vec<Rule>> {
        let chains = self.candidate_chains();
        let mut pool: Vec<Rule> = Vec::new();

        // Phase 1: all candidate heads, scored in parallel, collected in
        // chain order.
        let scored_heads: Vec<Rule> = chains
            .iter()
            .flat_map(|chain| chain.iter())
            .map(|&boundary| Rule::with_head(boundary))
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|mut rule| {
                self.score(&mut rule);
                rule
            })
            .collect();

        let mut head_rules: Vec<Rule> = Vec::new();
        for rule in scored_heads {
            if rule.support < self.config.min_support {
                continue;
            }
            if rule.confidence >= self.config.min_confidence {
                pool.push(rule.clone());
            }
            head_rules.push(rule);
        }

        // Phase 2: one extra boundary on the primary variable, never on the
        // head's own property (that rule would be trivially implied).
        let mut primary_rules: Vec<Rule> = Vec::new();
        for head in &head_rules {
            for chain in &chains {
                let mut chain_best = head.confidence;
                for boundary in chain {
                    if boundary.property == head.head.property {
                        continue;
                    }
                    let mut candidate = head.clone();
                    candidate.body_boundaries.push(*boundary);
                    self.score(&mut candidate);
                    if candidate.support >= self.config.min_support
                        && candidate.confidence > chain_best
                    {
                        chain_best = candidate.confidence;
                        if candidate.confidence >= self.config.min_confidence {
                            pool.push(candidate.clone());
                        }
                        primary_rules.push(candidate);
                    }
                }
            }
        }

        // Phase 3: a triple pattern binding the secondary variable, in both
        // directions, then boundary refinement on that variable.
        let mut secondary_rules: Vec<Rule> = Vec::new();
        for head in &head_rules {
            for property in self.kb.facts.properties() {
                let patterns = [
                    TriplePattern::new(Var::X, property, Var::Y),
                    TriplePattern::new(Var::Y, property, Var::X),
                ];
                for pattern in patterns {
                    let mut extended = head.clone();
                    extended.body_patterns.push(pattern);
                    self.score(&mut extended);

                    let mut base_confidence = head.confidence;
                    if extended.support >= self.config.min_support
                        && extended.confidence > head.confidence
                    {
                        base_confidence = extended.confidence;
                        if extended.confidence >= self.config.min_confidence {
                            pool.push(extended.clone());
                        }
                        secondary_rules.push(extended.clone());
                    }

                    for chain in &chains {
                        let mut chain_best = base_confidence;
                        for boundary in chain {
                            let mut candidate = extended.clone();
                            candidate
                                .body_boundaries
                                .push(boundary.with_var(Var::Y));
                            self.score(&mut candidate);
                            if candidate.support >= self.config.min_support
                                && candidate.confidence > chain_best
                            {
                                chain_best = candidate.confidence;
                                if candidate.confidence >= self.config.min_confidence {
                                    pool.push(candidate.clone());
                                }
                                secondary_rules.push(candidate);
                            }
                        }
                    }
                }
            }
        }

        // Phase 4: merge accepted primary and secondary refinements that
        // share a head. A merge survives only if it strictly beats both
        // parents after re-scoring.
        for primary in &primary_rules {
            for secondary in &secondary_rules {
                if primary.head != secondary.head {
                    continue;
                }
                let mut merged = secondary.merged_with(primary)?;
                self.score(&mut merged);
                if merged.support >= self.config.min_support
                    && merged.confidence > primary.confidence
                    && merged.confidence > secondary.confidence
                    && merged.confidence >= self.config.min_confidence
                {
                    pool.push(merged);
                }
            }
        }

        pool.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        pool.truncate(self.config.top_k);
        Ok(pool)
    }

    /// Per-property candidate boundaries as monotonic implication chains:
    /// at-least thresholds descending, at-most thresholds ascending, each
    /// chain ordered strongest first.
    fn candidate_chains(&self) -> Vec<Vec<Boundary>> {
        let bounds = &self.kb.bounds;
        let mut chains = Vec::new();
        for (&property, thresholds) in bounds.lower_candidates() {
            chains.push(
                thresholds
                    .iter()
                    .rev()
                    .map(|&threshold| Boundary::lower(Var::X, property, threshold))
                    .collect(),
            );
        }
        for (&property, thresholds) in bounds.upper_candidates() {
            chains.push(
                thresholds
                    .iter()
                    .map(|&threshold| Boundary::upper(Var::X, property, threshold))
                    .collect(),
            );
        }
        chains
    }

    /// Recompute a rule's derived scores.
    ///
    /// Evaluated bindings are projected onto the primary variable and
    /// deduplicated before counting, so body support counts subjects, not
    /// join results.
    fn score(&self, rule: &mut Rule) {
        let evaluator = BodyEvaluator::new(self.kb);
        let mut projected: BTreeSet<Binding> = BTreeSet::new();
        for binding in evaluator.evaluate(&rule.body_patterns, &rule.body_boundaries) {
            if binding.is_bound(Var::X) {
                projected.insert(binding.without(Var::Y));
            } else {
                // A body that never binds the primary variable constrains
                // nothing: fall back to the universal set.
                projected = evaluator.individual_bindings().collect();
                break;
            }
        }

        rule.body_support = projected.len() as u64;
        rule.support = 0;
        rule.contradictions = 0;
        for &binding in &projected {
            if evaluator.matches_boundary(binding, &rule.head) {
                rule.support += 1;
            }
            if evaluator.contradicts_boundary(binding, &rule.head) {
                rule.contradictions += 1;
            }
        }

        if rule.body_support > 0 {
            rule.confidence = (MAX_CONFIDENCE * rule.support) / rule.body_support;
            rule.contradiction_ratio = rule.contradictions as f32 / rule.body_support as f32;
        } else {
            rule.confidence = MAX_CONFIDENCE;
            rule.contradiction_ratio = 0.0;
        }
    }
}
