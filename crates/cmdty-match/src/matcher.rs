//! Global one-to-one matching of candidates to references.
//!
//! The similarity matrix is turned into a square cost matrix (padding the
//! shorter side with zero-cost dummies) and solved as a linear assignment
//! problem with the Hungarian method. Picking each candidate's best reference
//! independently can assign one reference twice; the assignment formulation
//! cannot.
//!
//! Tie handling:
//! * every real pair carries a small bonus, so among assignments with equal
//!   total similarity the one with more pairs (fewer unmatched references)
//!   has strictly lower cost;
//! * remaining exact ties are resolved by row order, i.e. candidate labels in
//!   lexical order, since the solver keeps the earliest minimal column.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::similarity::SimilarityMatrix;

const PAIR_BONUS: f64 = 1e-9;
const FORBIDDEN_COST: f64 = 1e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchObjective {
    /// Only cells above the acceptance threshold are eligible; the solver
    /// maximizes the similarity of accepted pairs.
    #[default]
    AboveThreshold,
    /// Every defined cell is eligible; optimal pairs at or below the
    /// threshold are dropped afterwards and reported as rejected.
    AllDefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// A pair is accepted only if its similarity is strictly greater.
    pub acceptance_threshold: f64,
    pub objective: MatchObjective,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { acceptance_threshold: 0.5, objective: MatchObjective::AboveThreshold }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub candidate: String,
    pub reference: String,
    pub similarity: f64,
}

/// Injective candidate → reference mapping plus the leftovers on both sides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Assignment {
    /// Accepted pairs, ordered by candidate label.
    pub pairs: Vec<MatchedPair>,
    /// Pairs the solver chose but the acceptance threshold dropped.
    pub rejected: Vec<MatchedPair>,
    pub unmatched_candidates: Vec<String>,
    pub unmatched_references: Vec<String>,
}

impl Assignment {
    /// An assignment with no accepted pairs.
    pub fn unmatched(
        candidates: impl IntoIterator<Item = impl Into<String>>,
        references: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut unmatched_candidates: Vec<String> = candidates.into_iter().map(Into::into).collect();
        let mut unmatched_references: Vec<String> = references.into_iter().map(Into::into).collect();
        unmatched_candidates.sort();
        unmatched_references.sort();
        Self { pairs: Vec::new(), rejected: Vec::new(), unmatched_candidates, unmatched_references }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn total_similarity(&self) -> f64 {
        self.pairs.iter().map(|p| p.similarity).sum()
    }

    pub fn reference_for(&self, candidate: &str) -> Option<&str> {
        self.pairs.iter().find(|p| p.candidate == candidate).map(|p| p.reference.as_str())
    }

    pub fn candidate_for(&self, reference: &str) -> Option<&str> {
        self.pairs.iter().find(|p| p.reference == reference).map(|p| p.candidate.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("no pair exceeds the acceptance threshold {threshold} (best defined score: {best:?})")]
    NoFeasibleAssignment { threshold: f64, best: Option<f64> },
    #[error("acceptance threshold {0} must lie in [-1, 1)")]
    InvalidThreshold(f64),
}

pub type MatchResult<T> = Result<T, MatchError>;

/// Solves the assignment over `matrix`. Fails only when no defined cell in
/// the whole matrix exceeds the threshold; individual rows or columns without
/// an acceptable partner are reported as unmatched.
pub fn match_series(matrix: &SimilarityMatrix, config: &MatcherConfig) -> MatchResult<Assignment> {
    let threshold = config.acceptance_threshold;
    if !threshold.is_finite() || !(-1.0..1.0).contains(&threshold) {
        return Err(MatchError::InvalidThreshold(threshold));
    }
    let best = matrix.max_score();
    if !best.is_some_and(|s| s > threshold) {
        return Err(MatchError::NoFeasibleAssignment { threshold, best });
    }

    let (n, m) = (matrix.nrows(), matrix.ncols());
    let size = n.max(m);
    let cost = DMatrix::from_fn(size, size, |i, j| {
        if i >= n || j >= m {
            return 0.0;
        }
        match (matrix.get(i, j), config.objective) {
            (Some(s), MatchObjective::AboveThreshold) if s > threshold => -(s + PAIR_BONUS),
            (Some(s), MatchObjective::AllDefined) => -(s + PAIR_BONUS),
            (None, MatchObjective::AllDefined) => FORBIDDEN_COST,
            _ => 0.0,
        }
    });
    let row_to_col = solve_assignment(&cost);

    let mut assignment = Assignment::default();
    let mut reference_taken = vec![false; m];
    for (i, &j) in row_to_col.iter().enumerate().take(n) {
        let candidate = &matrix.candidates()[i];
        let similarity = if j < m { matrix.get(i, j) } else { None };
        match similarity {
            Some(s) if s > threshold => {
                reference_taken[j] = true;
                assignment.pairs.push(MatchedPair {
                    candidate: candidate.clone(),
                    reference: matrix.references()[j].clone(),
                    similarity: s,
                });
            }
            Some(s) if config.objective == MatchObjective::AllDefined => {
                assignment.rejected.push(MatchedPair {
                    candidate: candidate.clone(),
                    reference: matrix.references()[j].clone(),
                    similarity: s,
                });
                assignment.unmatched_candidates.push(candidate.clone());
            }
            _ => assignment.unmatched_candidates.push(candidate.clone()),
        }
    }
    assignment.unmatched_references = matrix
        .references()
        .iter()
        .zip(reference_taken)
        .filter(|(_, taken)| !taken)
        .map(|(label, _)| label.clone())
        .collect();

    tracing::info!(
        accepted = assignment.pairs.len(),
        rejected = assignment.rejected.len(),
        unmatched_candidates = assignment.unmatched_candidates.len(),
        unmatched_references = assignment.unmatched_references.len(),
        total_similarity = assignment.total_similarity(),
        "solved candidate/reference assignment"
    );
    Ok(assignment)
}

/// Minimum-cost perfect assignment on a square matrix (Hungarian method with
/// row/column potentials, O(n³)). Returns the column assigned to each row.
pub fn solve_assignment(cost: &DMatrix<f64>) -> Vec<usize> {
    let n = cost.nrows().min(cost.ncols());
    if n == 0 {
        return Vec::new();
    }

    // 1-based working arrays; index 0 is the virtual source column.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut owner = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for row in 1..=n {
        owner[0] = row;
        let mut col0 = 0usize;
        let mut min_reduced = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[col0] = true;
            let row0 = owner[col0];
            let mut delta = f64::INFINITY;
            let mut col1 = 0usize;
            for col in 1..=n {
                if used[col] {
                    continue;
                }
                let reduced = cost[(row0 - 1, col - 1)] - u[row0] - v[col];
                if reduced < min_reduced[col] {
                    min_reduced[col] = reduced;
                    way[col] = col0;
                }
                if min_reduced[col] < delta {
                    delta = min_reduced[col];
                    col1 = col;
                }
            }
            for col in 0..=n {
                if used[col] {
                    u[owner[col]] += delta;
                    v[col] -= delta;
                } else {
                    min_reduced[col] -= delta;
                }
            }
            col0 = col1;
            if owner[col0] == 0 {
                break;
            }
        }
        loop {
            let col1 = way[col0];
            owner[col0] = owner[col1];
            col0 = col1;
            if col0 == 0 {
                break;
            }
        }
    }

    let mut row_to_col = vec![0usize; n];
    for col in 1..=n {
        if owner[col] > 0 {
            row_to_col[owner[col] - 1] = col - 1;
        }
    }
    row_to_col
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_finds_known_optimum() {
        let cost = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 3.0, 2.0, 0.0, 5.0, 3.0, 2.0, 2.0]);
        let assignment = solve_assignment(&cost);
        let total: f64 = assignment.iter().enumerate().map(|(i, &j)| cost[(i, j)]).sum();
        assert_eq!(total, 5.0);
        let mut cols = assignment.clone();
        cols.sort_unstable();
        assert_eq!(cols, vec![0, 1, 2]);
    }

    #[test]
    fn solver_handles_empty_matrix() {
        assert!(solve_assignment(&DMatrix::zeros(0, 0)).is_empty());
    }
}
