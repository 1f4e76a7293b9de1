//! Boundary constraints, triple patterns, and scored rules.
//!
//! A rule predicts one boundary constraint on the primary variable (the
//! head) from a conjunctive body of triple patterns and further boundary
//! constraints. Scores are derived fields recomputed whenever the body
//! changes; once scored, rules are treated as immutable value objects.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::query::Var;
use crate::{NodeId, NodeInterner};

/// Confidence scale: integer percentage in `0..=100`.
pub const MAX_CONFIDENCE: u64 = 100;

/// Which side of the cardinality a boundary constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// At-least: effective lower bound must reach the threshold.
    Lower,
    /// At-most: effective upper bound must not exceed the threshold.
    Upper,
}

/// A cardinality boundary constraint on one logical variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Boundary {
    pub var: Var,
    pub property: NodeId,
    pub threshold: u64,
    pub direction: Direction,
}

impl Boundary {
    pub const fn lower(var: Var, property: NodeId, threshold: u64) -> Self {
        Self {
            var,
            property,
            threshold,
            direction: Direction::Lower,
        }
    }

    pub const fn upper(var: Var, property: NodeId, threshold: u64) -> Self {
        Self {
            var,
            property,
            threshold,
            direction: Direction::Upper,
        }
    }

    /// The same constraint retargeted at another variable.
    #[must_use]
    pub const fn with_var(mut self, var: Var) -> Self {
        self.var = var;
        self
    }

    /// Render as `C(property(x, _)) <= threshold`.
    pub fn render(&self, interner: &NodeInterner) -> String {
        let property = interner
            .lookup(self.property)
            .unwrap_or_else(|| format!("?{}", self.property.raw()));
        let comparator = match self.direction {
            Direction::Lower => ">=",
            Direction::Upper => "<=",
        };
        format!(
            "C({}({}, _)) {} {}",
            property,
            self.var.name(),
            comparator,
            self.threshold
        )
    }
}

/// One `property(subject_var, object_var)` body atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: Var,
    pub property: NodeId,
    pub object: Var,
}

impl TriplePattern {
    pub const fn new(subject: Var, property: NodeId, object: Var) -> Self {
        Self {
            subject,
            property,
            object,
        }
    }

    pub fn render(&self, interner: &NodeInterner) -> String {
        let property = interner
            .lookup(self.property)
            .unwrap_or_else(|| format!("?{}", self.property.raw()));
        format!(
            "{}({}, {})",
            property,
            self.subject.name(),
            self.object.name()
        )
    }
}

/// A scored cardinality rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub head: Boundary,
    pub body_patterns: Vec<TriplePattern>,
    pub body_boundaries: Vec<Boundary>,
    /// Bindings satisfying body and head.
    pub support: u64,
    /// Bindings satisfying the body.
    pub body_support: u64,
    /// `100 * support / body_support`, in `0..=100`.
    pub confidence: u64,
    /// Bindings whose head is provably false given known bounds.
    pub contradictions: u64,
    pub contradiction_ratio: f32,
}

impl Rule {
    /// A head-only rule with an empty body and zeroed scores.
    pub fn with_head(head: Boundary) -> Self {
        Self {
            head,
            body_patterns: Vec::new(),
            body_boundaries: Vec::new(),
            support: 0,
            body_support: 0,
            confidence: 0,
            contradictions: 0,
            contradiction_ratio: 0.0,
        }
    }

    /// Concatenate another rule's body onto this one.
    ///
    /// The heads must be identical; a mismatch is a caller bug, not a data
    /// condition. The merged rule keeps this rule's scores and must be
    /// re-scored before use.
    pub fn merged_with(&self, other: &Rule) -> Result<Rule> {
        if self.head != other.head {
            bail!(
                "cannot merge rules with different heads: {:?} vs {:?}",
                self.head,
                other.head
            );
        }
        let mut merged = self.clone();
        merged
            .body_patterns
            .extend_from_slice(&other.body_patterns);
        merged
            .body_boundaries
            .extend_from_slice(&other.body_boundaries);
        Ok(merged)
    }

    /// Render as `head <- pattern... boundary...`.
    pub fn render(&self, interner: &NodeInterner) -> String {
        let mut out = self.head.render(interner);
        out.push_str(" <-");
        for pattern in &self.body_patterns {
            out.push(' ');
            out.push_str(&pattern.render(interner));
        }
        for boundary in &self.body_boundaries {
            out.push(' ');
            out.push_str(&boundary.render(interner));
        }
        out
    }
}
