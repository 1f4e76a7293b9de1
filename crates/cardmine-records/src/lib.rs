//! Cardmine input records (boundary adapter).
//!
//! This crate sits at the **interop boundary**:
//!
//! - It parses whitespace-separated three-column lines (untrusted).
//! - It emits typed records for the store loader to interpret.
//! - It does *not* decide skip-vs-register policy (the loader does that).
//!
//! A line is one of:
//! - a plain fact `subject property object`,
//! - a cardinality assertion `subject|property hasXCardinality value`,
//! - a functional-property declaration
//!   `property rdf:type owl:FunctionalProperty`.
//!
//! Terms wrapped in angle brackets (`<iri>`) are unwrapped before
//! classification, so `<http://…#type>` and `http://…#type` read the same.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const RDF_TYPE_IRI: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const OWL_FUNCTIONAL_PROPERTY_IRI: &str = "http://www.w3.org/2002/07/owl#FunctionalProperty";

pub const AT_LEAST_CARDINALITY_RELATION: &str = "hasAtLeastCardinality";
pub const AT_MOST_CARDINALITY_RELATION: &str = "hasAtMostCardinality";
pub const EXACT_CARDINALITY_RELATION: &str = "hasExactCardinality";

// ============================================================================
// Record model
// ============================================================================

/// Which kind of cardinality bound an assertion carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundKind {
    AtLeast,
    AtMost,
    Exact,
}

impl BoundKind {
    /// The relation name this kind uses on the wire.
    pub const fn relation_name(self) -> &'static str {
        match self {
            BoundKind::AtLeast => AT_LEAST_CARDINALITY_RELATION,
            BoundKind::AtMost => AT_MOST_CARDINALITY_RELATION,
            BoundKind::Exact => EXACT_CARDINALITY_RELATION,
        }
    }

    pub fn from_relation(relation: &str) -> Option<Self> {
        match relation {
            AT_LEAST_CARDINALITY_RELATION => Some(BoundKind::AtLeast),
            AT_MOST_CARDINALITY_RELATION => Some(BoundKind::AtMost),
            EXACT_CARDINALITY_RELATION => Some(BoundKind::Exact),
            _ => None,
        }
    }
}

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum RecordV1 {
    /// A plain `(subject, property, object)` fact.
    Fact {
        subject: String,
        property: String,
        object: String,
    },
    /// An explicit cardinality bound on a `(subject, property)` pair.
    ///
    /// On the wire the subject column packs `subject|property`; the split
    /// happens here so downstream code never sees the packed form.
    BoundAssertion {
        subject: String,
        property: String,
        kind: BoundKind,
        value: u64,
    },
    /// `property rdf:type owl:FunctionalProperty`.
    FunctionalDeclaration { property: String },
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Error)]
pub enum RecordParseError {
    #[error("line {line}: expected three whitespace-separated columns")]
    Columns { line: usize },
    #[error("line {line}: cardinality assertion subject `{subject}` is missing the `|` separator")]
    MissingSeparator { line: usize, subject: String },
    #[error("line {line}: invalid cardinality value `{value}`")]
    Value { line: usize, value: String },
}

/// Strip (possibly nested) angle brackets from an IRI-shaped term.
fn unwrap_angles(term: &str) -> &str {
    let mut term = term;
    while term.len() >= 2 && term.starts_with('<') && term.ends_with('>') {
        term = &term[1..term.len() - 1];
    }
    term
}

/// Parse one input line into a typed record.
///
/// Returns `Ok(None)` for blank lines. Extra columns beyond the third are
/// ignored.
pub fn parse_record_v1(line: &str, line_no: usize) -> Result<Option<RecordV1>, RecordParseError> {
    let mut columns = line.split_whitespace();
    let Some(s) = columns.next() else {
        return Ok(None);
    };
    let (Some(p), Some(o)) = (columns.next(), columns.next()) else {
        return Err(RecordParseError::Columns { line: line_no });
    };

    let property = unwrap_angles(p);

    if let Some(kind) = BoundKind::from_relation(property) {
        let Some((subject, bound_property)) = s.split_once('|') else {
            return Err(RecordParseError::MissingSeparator {
                line: line_no,
                subject: s.to_string(),
            });
        };
        let value: u64 = o.parse().map_err(|_| RecordParseError::Value {
            line: line_no,
            value: o.to_string(),
        })?;
        return Ok(Some(RecordV1::BoundAssertion {
            subject: unwrap_angles(subject).to_string(),
            property: unwrap_angles(bound_property).to_string(),
            kind,
            value,
        }));
    }

    if property == RDF_TYPE_IRI && unwrap_angles(o) == OWL_FUNCTIONAL_PROPERTY_IRI {
        return Ok(Some(RecordV1::FunctionalDeclaration {
            property: unwrap_angles(s).to_string(),
        }));
    }

    Ok(Some(RecordV1::Fact {
        subject: unwrap_angles(s).to_string(),
        property: property.to_string(),
        object: unwrap_angles(o).to_string(),
    }))
}
