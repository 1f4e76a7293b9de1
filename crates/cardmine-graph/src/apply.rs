//! Ranked-rule aggregation into per-pair bound estimates.
//!
//! Estimates seed from the stores' own effective bounds at full
//! confidence, then every mined rule tightens them in ranked order.
//! Application order is part of the contract: a later (lower-confidence)
//! rule must never override an earlier tightening, and a head that
//! conflicts with the opposing recorded estimate counts as a
//! contradiction instead of updating anything.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::query::BodyEvaluator;
use crate::rule::{Direction, Rule, MAX_CONFIDENCE};
use crate::{KnowledgeBase, NodeId};

/// Estimates are keyed by `(subject, property)`.
pub type PairKey = (NodeId, NodeId);

/// A bound value together with the confidence of whatever produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: u64,
    pub confidence: u64,
}

const LOWER_DEFAULT: Estimate = Estimate {
    value: 0,
    confidence: MAX_CONFIDENCE,
};
const UPPER_DEFAULT: Estimate = Estimate {
    value: u64::MAX,
    confidence: MAX_CONFIDENCE,
};

/// Result of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationOutcome {
    pub lower: BTreeMap<PairKey, Estimate>,
    pub upper: BTreeMap<PairKey, Estimate>,
    /// Contradictions added by each rule, in application order.
    pub rule_contradictions: Vec<u64>,
    pub total_contradictions: u64,
}

/// Apply ranked rules (highest confidence first) to tighten the global
/// bound estimates.
pub fn apply_rules(kb: &KnowledgeBase, rules: &[Rule]) -> AggregationOutcome {
    let mut lower: BTreeMap<PairKey, Estimate> = BTreeMap::new();
    let mut upper: BTreeMap<PairKey, Estimate> = BTreeMap::new();

    for property in kb.facts.properties() {
        for raw in kb.facts.individuals() {
            let subject = NodeId::new(raw);
            lower.insert(
                (subject, property),
                Estimate {
                    value: kb.effective_lower_bound(subject, property),
                    confidence: MAX_CONFIDENCE,
                },
            );
            upper.insert(
                (subject, property),
                Estimate {
                    value: kb.effective_upper_bound(subject, property),
                    confidence: MAX_CONFIDENCE,
                },
            );
        }
    }

    let evaluator = BodyEvaluator::new(kb);
    let mut rule_contradictions = Vec::with_capacity(rules.len());
    let mut total_contradictions = 0u64;

    for rule in rules {
        let mut added = 0u64;
        for binding in evaluator.evaluate(&rule.body_patterns, &rule.body_boundaries) {
            let Some(subject) = binding.get(rule.head.var) else {
                continue;
            };
            let key = (subject, rule.head.property);
            let current_lower = lower.get(&key).copied().unwrap_or(LOWER_DEFAULT);
            let current_upper = upper.get(&key).copied().unwrap_or(UPPER_DEFAULT);

            match rule.head.direction {
                Direction::Upper => {
                    if current_lower.value > rule.head.threshold {
                        added += 1;
                    } else if current_upper.value > rule.head.threshold {
                        upper.insert(
                            key,
                            Estimate {
                                value: rule.head.threshold,
                                confidence: rule.confidence,
                            },
                        );
                    }
                }
                Direction::Lower => {
                    if current_upper.value < rule.head.threshold {
                        added += 1;
                    } else if current_lower.value < rule.head.threshold {
                        lower.insert(
                            key,
                            Estimate {
                                value: rule.head.threshold,
                                confidence: rule.confidence,
                            },
                        );
                    }
                }
            }
        }
        total_contradictions += added;
        rule_contradictions.push(added);
    }

    AggregationOutcome {
        lower,
        upper,
        rule_contradictions,
        total_contradictions,
    }
}

/// Exact cardinalities: pairs whose final lower and upper estimates meet,
/// at the weaker of the two confidences.
pub fn derive_exact_cardinalities(
    lower: &BTreeMap<PairKey, Estimate>,
    upper: &BTreeMap<PairKey, Estimate>,
) -> BTreeMap<PairKey, Estimate> {
    let mut exact = BTreeMap::new();
    for (key, low) in lower {
        let high = upper.get(key).copied().unwrap_or(UPPER_DEFAULT);
        if low.value == high.value {
            exact.insert(
                *key,
                Estimate {
                    value: low.value,
                    confidence: low.confidence.min(high.confidence),
                },
            );
        }
    }
    exact
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Var;
    use crate::rule::Boundary;

    fn scored(head: Boundary, confidence: u64) -> Rule {
        let mut rule = Rule::with_head(head);
        rule.confidence = confidence;
        rule
    }

    #[test]
    fn seeds_every_pair_from_effective_bounds() {
        let mut kb = KnowledgeBase::new();
        kb.add_fact("a", "p", "b");
        let (a, p) = (kb.node("a").unwrap(), kb.node("p").unwrap());
        kb.bounds.set_functional(p);

        let outcome = apply_rules(&kb, &[]);
        assert_eq!(
            outcome.lower.get(&(a, p)),
            Some(&Estimate {
                value: 1,
                confidence: 100
            })
        );
        assert_eq!(
            outcome.upper.get(&(a, p)),
            Some(&Estimate {
                value: 1,
                confidence: 100
            })
        );
        // the object has no p facts: lower 0, upper from the functional
        // default
        let b = kb.node("b").unwrap();
        assert_eq!(outcome.lower.get(&(b, p)).unwrap().value, 0);
        assert_eq!(outcome.upper.get(&(b, p)).unwrap().value, 1);
        assert_eq!(outcome.total_contradictions, 0);
    }

    #[test]
    fn upper_rule_tightens_but_never_loosens() {
        let mut kb = KnowledgeBase::new();
        kb.add_fact("a", "p", "b");
        let p = kb.node("p").unwrap();
        let a = kb.node("a").unwrap();

        // ranked: <=3 first, then a weaker <=4 that must not overwrite
        let rules = vec![
            scored(Boundary::upper(Var::X, p, 3), 90),
            scored(Boundary::upper(Var::X, p, 4), 80),
        ];
        let outcome = apply_rules(&kb, &rules);
        assert_eq!(
            outcome.upper.get(&(a, p)),
            Some(&Estimate {
                value: 3,
                confidence: 90
            })
        );
        assert_eq!(outcome.total_contradictions, 0);
    }

    #[test]
    fn contradictions_are_counted_not_applied() {
        let mut kb = KnowledgeBase::new();
        kb.add_fact("a", "p", "b");
        kb.add_fact("a", "p", "c");
        let (a, p) = (kb.node("a").unwrap(), kb.node("p").unwrap());

        // observed lower bound is 2, so an at-most-1 head contradicts for a
        let rules = vec![scored(Boundary::upper(Var::X, p, 1), 70)];
        let outcome = apply_rules(&kb, &rules);
        assert_eq!(outcome.rule_contradictions, vec![1]);
        assert_eq!(outcome.total_contradictions, 1);
        // untouched estimate
        assert_eq!(outcome.upper.get(&(a, p)), Some(&UPPER_DEFAULT));
    }

    #[test]
    fn lower_contradiction_compares_against_the_upper_value() {
        let mut kb = KnowledgeBase::new();
        kb.add_fact("a", "p", "b");
        let (a, p) = (kb.node("a").unwrap(), kb.node("p").unwrap());
        kb.bounds.assert_at_most(a, p, 2);

        // at-least 3 against upper estimate 2: a contradiction for a only
        let rules = vec![scored(Boundary::lower(Var::X, p, 3), 60)];
        let outcome = apply_rules(&kb, &rules);
        assert_eq!(outcome.rule_contradictions, vec![1]);
        assert_eq!(outcome.lower.get(&(a, p)).unwrap().value, 1);
    }

    #[test]
    fn lower_rule_tightens_below_the_upper_estimate() {
        let mut kb = KnowledgeBase::new();
        kb.add_fact("a", "p", "b");
        let (a, p) = (kb.node("a").unwrap(), kb.node("p").unwrap());
        kb.bounds.assert_at_most(a, p, 4);

        let rules = vec![scored(Boundary::lower(Var::X, p, 3), 55)];
        let outcome = apply_rules(&kb, &rules);
        assert_eq!(
            outcome.lower.get(&(a, p)),
            Some(&Estimate {
                value: 3,
                confidence: 55
            })
        );
        assert_eq!(outcome.total_contradictions, 0);
    }

    #[test]
    fn exact_cardinalities_take_the_weaker_confidence() {
        let mut kb = KnowledgeBase::new();
        kb.add_fact("a", "p", "b");
        let (a, p) = (kb.node("a").unwrap(), kb.node("p").unwrap());

        let rules = vec![scored(Boundary::upper(Var::X, p, 1), 40)];
        let outcome = apply_rules(&kb, &rules);
        let exact = derive_exact_cardinalities(&outcome.lower, &outcome.upper);
        assert_eq!(
            exact.get(&(a, p)),
            Some(&Estimate {
                value: 1,
                confidence: 40
            })
        );
        // pairs whose bounds never meet stay out
        let b = kb.node("b").unwrap();
        assert!(!exact.contains_key(&(b, p)));
    }
}
