use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matcher::Assignment;
use crate::series::{CandidateSet, Period, ReferenceSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    pub identity: String,
    pub period: Period,
    pub value: f64,
}

/// Long-format monthly returns keyed by canonical identity, sorted by
/// `(identity, period)` with at most one row per key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputPanel {
    rows: Vec<PanelRow>,
}

impl OutputPanel {
    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn identities(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for row in &self.rows {
            if out.last() != Some(&row.identity.as_str()) {
                out.push(&row.identity);
            }
        }
        out
    }

    /// Number of emitted months per identity.
    pub fn identity_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.identity.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn series<'a>(&'a self, identity: &'a str) -> impl Iterator<Item = (Period, f64)> + 'a {
        self.rows.iter().filter(move |r| r.identity == identity).map(|r| (r.period, r.value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PanelError {
    #[error("identity '{identity}' is claimed by both '{first}' and '{second}'")]
    DuplicateIdentity { identity: String, first: String, second: String },
    #[error("candidate '{0}' is assigned to more than one identity")]
    DuplicateCandidate(String),
    #[error("candidate '{0}' is not present in the candidate set")]
    UnknownCandidate(String),
    #[error("reference '{0}' is not present in the reference set")]
    UnknownReference(String),
}

pub type PanelResult<T> = Result<T, PanelError>;

/// Re-keys the full history of every accepted candidate under its
/// reference's identity. The emitted span is not limited to the overlap that
/// decided the match.
pub fn assemble_panel(
    assignment: &Assignment,
    candidates: &CandidateSet,
    references: &ReferenceSet,
) -> PanelResult<OutputPanel> {
    let mut by_identity: BTreeMap<&str, &str> = BTreeMap::new();
    let mut seen_candidates = BTreeSet::new();
    for pair in &assignment.pairs {
        if !seen_candidates.insert(pair.candidate.as_str()) {
            return Err(PanelError::DuplicateCandidate(pair.candidate.clone()));
        }
        if !references.contains_key(&pair.reference) {
            return Err(PanelError::UnknownReference(pair.reference.clone()));
        }
        if let Some(first) = by_identity.insert(&pair.reference, &pair.candidate) {
            return Err(PanelError::DuplicateIdentity {
                identity: pair.reference.clone(),
                first: first.to_string(),
                second: pair.candidate.clone(),
            });
        }
    }

    let mut rows = Vec::new();
    for (identity, label) in by_identity {
        let series =
            candidates.get(label).ok_or_else(|| PanelError::UnknownCandidate(label.to_string()))?;
        rows.extend(series.defined().filter(|(_, value)| value.is_finite()).map(|(period, value)| {
            PanelRow { identity: identity.to_string(), period, value }
        }));
    }

    tracing::info!(
        identities = assignment.pairs.len(),
        rows = rows.len(),
        "assembled output panel"
    );
    Ok(OutputPanel { rows })
}
