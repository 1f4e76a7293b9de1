//! Tabular report writers.
//!
//! The core only defines the logical fields; everything here is
//! presentation: the ranked rules TSV and the per-confidence-threshold
//! cardinality exports with their dataset statistics.

use anyhow::{Context, Result};
use cardmine_graph::apply::AggregationOutcome;
use cardmine_graph::{Estimate, KnowledgeBase, NodeId, NodeInterner, Rule, MAX_CONFIDENCE};
use cardmine_records::EXACT_CARDINALITY_RELATION;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One rules-report row, also used for the JSON dump.
#[derive(Debug, Serialize)]
pub struct RuleReportRow {
    pub rule: String,
    pub support: u64,
    pub body_support: u64,
    pub confidence: u64,
    pub contradiction_ratio: f32,
}

pub fn rule_report_rows(rules: &[Rule], interner: &NodeInterner) -> Vec<RuleReportRow> {
    rules
        .iter()
        .map(|rule| RuleReportRow {
            rule: rule.render(interner),
            support: rule.support,
            body_support: rule.body_support,
            confidence: rule.confidence,
            contradiction_ratio: rule.contradiction_ratio,
        })
        .collect()
}

/// Ranked rules as TSV: rendered rule, confidence as a fraction, and the
/// share of body bindings that do not contradict the head.
pub fn write_rules_report(path: &Path, rules: &[Rule], interner: &NodeInterner) -> Result<()> {
    let mut out = String::from("rule\tstandard_confidence\tnot_contradiction_ratio\n");
    for rule in rules {
        out.push_str(&format!(
            "{}\t{}\t{}\n",
            rule.render(interner),
            rule.confidence as f32 / MAX_CONFIDENCE as f32,
            1.0 - rule.contradiction_ratio,
        ));
    }
    fs::write(path, out).with_context(|| format!("cannot write {}", path.display()))
}

fn term_or_id(interner: &NodeInterner, id: NodeId) -> String {
    interner
        .lookup(id)
        .unwrap_or_else(|| format!("?{}", id.raw()))
}

/// One cardinality export per confidence threshold (0, 10, …, 100).
///
/// Each file lists the exact cardinalities whose confidence reaches the
/// threshold, then dataset statistics: how many of those pairs the
/// observed facts already complete, the total shortfall, and how many
/// lower/upper estimates survive the threshold.
pub fn write_cardinality_reports(
    dir: &Path,
    kb: &KnowledgeBase,
    outcome: &AggregationOutcome,
    exact: &BTreeMap<(NodeId, NodeId), Estimate>,
) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;

    for threshold in (0..=MAX_CONFIDENCE).step_by(10) {
        let mut out = String::new();
        let mut complete = 0u64;
        let mut incomplete = 0u64;
        let mut missing_size = 0u64;

        for (&(subject, property), estimate) in exact {
            if estimate.confidence < threshold {
                continue;
            }
            out.push_str(&format!(
                "{}|{}\t{}\t{}\n",
                term_or_id(&kb.interner, subject),
                term_or_id(&kb.interner, property),
                EXACT_CARDINALITY_RELATION,
                estimate.value,
            ));
            let observed = kb.facts.object_count(subject, property);
            if observed >= estimate.value {
                complete += 1;
            } else {
                incomplete += 1;
                missing_size += estimate.value - observed;
            }
        }

        out.push_str(&format!("dataset\tcompleteCount\t{complete}\n"));
        out.push_str(&format!("dataset\tincompleteCount\t{incomplete}\n"));
        out.push_str(&format!("dataset\tmissingSize\t{missing_size}\n"));

        let lower_count = outcome
            .lower
            .values()
            .filter(|estimate| estimate.confidence >= threshold)
            .count();
        let upper_count = outcome
            .upper
            .values()
            .filter(|estimate| estimate.confidence >= threshold)
            .count();
        out.push_str(&format!("dataset\tlowerBoundNumber\t{lower_count}\n"));
        out.push_str(&format!("dataset\tupperBoundNumber\t{upper_count}\n"));

        let path = dir.join(format!("{threshold}.tsv"));
        fs::write(&path, out).with_context(|| format!("cannot write {}", path.display()))?;
    }
    Ok(())
}
