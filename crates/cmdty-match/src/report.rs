//! Human-reviewable diagnostics for one matching run.

use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::matcher::{Assignment, MatchedPair};
use crate::returns::{coverage, ExcludedSeries};
use crate::series::SeriesSet;
use crate::similarity::SimilarityMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Candidate,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedPairReport {
    pub candidate: String,
    pub reference: String,
    pub similarity: f64,
    pub overlap_months: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedReport {
    pub label: String,
    /// Best defined counterpart on the other side, if any cell was scored.
    pub best_match: Option<String>,
    pub best_similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedReport {
    pub side: Side,
    #[serde(flatten)]
    pub series: ExcludedSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageWarning {
    pub side: Side,
    pub label: String,
    pub coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchReport {
    pub acceptance_threshold: f64,
    pub candidates_scored: usize,
    pub references_scored: usize,
    pub defined_cells: usize,
    pub accepted: Vec<AcceptedPairReport>,
    pub rejected: Vec<MatchedPair>,
    pub unmatched_candidates: Vec<UnmatchedReport>,
    pub unmatched_references: Vec<UnmatchedReport>,
    pub excluded: Vec<ExcludedReport>,
    pub low_coverage: Vec<CoverageWarning>,
}

impl MatchReport {
    /// Describes `assignment` against the matrix it was solved on.
    pub fn build(matrix: &SimilarityMatrix, assignment: &Assignment, threshold: f64) -> Self {
        let accepted = assignment
            .pairs
            .iter()
            .map(|pair| {
                let overlap_months = match (
                    matrix.candidate_index(&pair.candidate),
                    matrix.reference_index(&pair.reference),
                ) {
                    (Some(i), Some(j)) => matrix.overlap(i, j),
                    _ => 0,
                };
                AcceptedPairReport {
                    candidate: pair.candidate.clone(),
                    reference: pair.reference.clone(),
                    similarity: pair.similarity,
                    overlap_months,
                    candidate_description: describe(&pair.candidate),
                }
            })
            .collect();

        let unmatched_candidates = assignment
            .unmatched_candidates
            .iter()
            .map(|label| {
                let best = matrix.candidate_index(label).and_then(|i| matrix.best_in_row(i));
                UnmatchedReport {
                    label: label.clone(),
                    best_match: best.map(|(j, _)| matrix.references()[j].clone()),
                    best_similarity: best.map(|(_, s)| s),
                    description: describe(label),
                }
            })
            .collect();

        let unmatched_references = assignment
            .unmatched_references
            .iter()
            .map(|label| {
                let best = matrix.reference_index(label).and_then(|j| matrix.best_in_col(j));
                UnmatchedReport {
                    label: label.clone(),
                    best_match: best.map(|(i, _)| matrix.candidates()[i].clone()),
                    best_similarity: best.map(|(_, s)| s),
                    description: None,
                }
            })
            .collect();

        Self {
            acceptance_threshold: threshold,
            candidates_scored: matrix.nrows(),
            references_scored: matrix.ncols(),
            defined_cells: matrix.defined_cells(),
            accepted,
            rejected: assignment.rejected.clone(),
            unmatched_candidates,
            unmatched_references,
            excluded: Vec::new(),
            low_coverage: Vec::new(),
        }
    }

    pub fn record_exclusions(&mut self, side: Side, excluded: &[ExcludedSeries]) {
        self.excluded
            .extend(excluded.iter().cloned().map(|series| ExcludedReport { side, series }));
    }

    /// Flags series whose share of defined months falls below `threshold`.
    pub fn record_coverage(&mut self, side: Side, set: &SeriesSet, threshold: f64) {
        for (label, series) in set {
            let value = coverage(series);
            if value < threshold {
                tracing::warn!(%label, coverage = value, threshold, "low coverage series");
                self.low_coverage.push(CoverageWarning { side, label: label.clone(), coverage: value });
            }
        }
    }

    /// True when every scored candidate and reference ended up paired.
    pub fn is_complete(&self) -> bool {
        self.unmatched_candidates.is_empty() && self.unmatched_references.is_empty()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn describe(label: &str) -> Option<String> {
    catalog::lookup(label).map(|info| format!("{} ({:?})", info.commodity, info.sector))
}
