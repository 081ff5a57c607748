//! Candidate × reference correlation matrix.
//!
//! Every cell is scored independently from the overlap of the two series, so
//! the matrix is computed in chunks through [`crate::parallel`]. Cells whose
//! overlap is too short, or whose aligned vectors have no variance, are left
//! undefined (stored as NaN).

use std::convert::Infallible;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alignment::{align, AlignmentError};
use crate::parallel::{run_chunked, ExecutionMode, ParallelError};
use crate::series::{ReturnSeries, SeriesSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Minimum number of shared defined months for a cell to be scored.
    pub min_overlap: usize,
    pub execution: ExecutionMode,
    pub chunks_per_worker: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self { min_overlap: 24, execution: ExecutionMode::default(), chunks_per_worker: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimilarityError {
    #[error(transparent)]
    Parallel(#[from] ParallelError),
    #[error("score matrix is {rows}x{cols}, labels describe {expected_rows}x{expected_cols}")]
    ShapeMismatch { rows: usize, cols: usize, expected_rows: usize, expected_cols: usize },
    #[error("score {value} for ({candidate}, {reference}) is outside [-1, 1]")]
    ScoreOutOfRange { candidate: String, reference: String, value: f64 },
    #[error("duplicate label '{0}'")]
    DuplicateLabel(String),
}

pub type SimilarityResult<T> = Result<T, SimilarityError>;

/// Population Pearson correlation. `None` for mismatched or too-short input
/// and for zero-variance vectors.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (xi, yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    let corr = cov / (var_x * var_y).sqrt();
    corr.is_finite().then(|| corr.clamp(-1.0, 1.0))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    candidates: Vec<String>,
    references: Vec<String>,
    scores: DMatrix<f64>,
    overlaps: DMatrix<usize>,
}

impl SimilarityMatrix {
    /// Wraps precomputed scores, NaN meaning undefined. Rows and columns are
    /// reordered so that labels are in lexical order.
    pub fn from_scores(
        candidates: Vec<String>,
        references: Vec<String>,
        scores: DMatrix<f64>,
    ) -> SimilarityResult<Self> {
        if scores.nrows() != candidates.len() || scores.ncols() != references.len() {
            return Err(SimilarityError::ShapeMismatch {
                rows: scores.nrows(),
                cols: scores.ncols(),
                expected_rows: candidates.len(),
                expected_cols: references.len(),
            });
        }
        let row_order = lexical_order(&candidates)?;
        let col_order = lexical_order(&references)?;
        let scores = DMatrix::from_fn(candidates.len(), references.len(), |i, j| {
            scores[(row_order[i], col_order[j])]
        });
        let candidates: Vec<String> = row_order.iter().map(|&i| candidates[i].clone()).collect();
        let references: Vec<String> = col_order.iter().map(|&j| references[j].clone()).collect();

        for i in 0..scores.nrows() {
            for j in 0..scores.ncols() {
                let value = scores[(i, j)];
                if !value.is_nan() && !(-1.0..=1.0).contains(&value) {
                    return Err(SimilarityError::ScoreOutOfRange {
                        candidate: candidates[i].clone(),
                        reference: references[j].clone(),
                        value,
                    });
                }
            }
        }

        let overlaps = DMatrix::zeros(candidates.len(), references.len());
        Ok(Self { candidates, references, scores, overlaps })
    }

    /// Row-major convenience constructor, `None` meaning undefined.
    pub fn from_rows(
        candidates: &[&str],
        references: &[&str],
        rows: &[Vec<Option<f64>>],
    ) -> SimilarityResult<Self> {
        let ncols = references.len();
        if rows.len() != candidates.len() || rows.iter().any(|row| row.len() != ncols) {
            return Err(SimilarityError::ShapeMismatch {
                rows: rows.len(),
                cols: rows.first().map_or(0, Vec::len),
                expected_rows: candidates.len(),
                expected_cols: ncols,
            });
        }
        let scores = DMatrix::from_fn(candidates.len(), ncols, |i, j| rows[i][j].unwrap_or(f64::NAN));
        Self::from_scores(
            candidates.iter().map(ToString::to_string).collect(),
            references.iter().map(ToString::to_string).collect(),
            scores,
        )
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn references(&self) -> &[String] {
        &self.references
    }

    pub fn nrows(&self) -> usize {
        self.scores.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.scores.ncols()
    }

    pub fn scores(&self) -> &DMatrix<f64> {
        &self.scores
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        let value = *self.scores.get((row, col))?;
        (!value.is_nan()).then_some(value)
    }

    pub fn score(&self, candidate: &str, reference: &str) -> Option<f64> {
        self.get(self.candidate_index(candidate)?, self.reference_index(reference)?)
    }

    /// Shared defined months behind a cell; zero for externally supplied scores.
    pub fn overlap(&self, row: usize, col: usize) -> usize {
        self.overlaps.get((row, col)).copied().unwrap_or(0)
    }

    pub fn candidate_index(&self, label: &str) -> Option<usize> {
        self.candidates.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    pub fn reference_index(&self, label: &str) -> Option<usize> {
        self.references.binary_search_by(|r| r.as_str().cmp(label)).ok()
    }

    pub fn defined_cells(&self) -> usize {
        self.scores.iter().filter(|v| !v.is_nan()).count()
    }

    pub fn max_score(&self) -> Option<f64> {
        self.scores.iter().copied().filter(|v| !v.is_nan()).reduce(f64::max)
    }

    /// Highest-scoring reference for a candidate row.
    pub fn best_in_row(&self, row: usize) -> Option<(usize, f64)> {
        (0..self.ncols())
            .filter_map(|col| self.get(row, col).map(|s| (col, s)))
            .fold(None, |best, (col, s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((col, s)),
            })
    }

    /// Highest-scoring candidate for a reference column.
    pub fn best_in_col(&self, col: usize) -> Option<(usize, f64)> {
        (0..self.nrows())
            .filter_map(|row| self.get(row, col).map(|s| (row, s)))
            .fold(None, |best, (row, s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((row, s)),
            })
    }
}

fn lexical_order(labels: &[String]) -> SimilarityResult<Vec<usize>> {
    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| labels[a].cmp(&labels[b]));
    for w in order.windows(2) {
        if labels[w[0]] == labels[w[1]] {
            return Err(SimilarityError::DuplicateLabel(labels[w[0]].clone()));
        }
    }
    Ok(order)
}

#[derive(Debug, Clone, Copy)]
struct CellScore {
    score: Option<f64>,
    overlap: usize,
}

fn score_cell(candidate: &ReturnSeries, reference: &ReturnSeries, min_overlap: usize) -> CellScore {
    match align(candidate, reference, min_overlap) {
        Ok(pair) => CellScore { score: pearson(&pair.left, &pair.right), overlap: pair.len() },
        Err(AlignmentError::InsufficientOverlap { overlap, .. }) => {
            CellScore { score: None, overlap }
        }
    }
}

/// Scores every (candidate, reference) pair. Rows follow the lexical order of
/// candidate labels and columns that of reference labels.
pub fn score_sets(
    candidates: &SeriesSet,
    references: &SeriesSet,
    config: &ScoringConfig,
) -> SimilarityResult<SimilarityMatrix> {
    let rows: Vec<&ReturnSeries> = candidates.values().collect();
    let cols: Vec<&ReturnSeries> = references.values().collect();
    let (n, m) = (rows.len(), cols.len());

    let cells: Vec<(usize, usize)> = (0..n).flat_map(|i| (0..m).map(move |j| (i, j))).collect();
    let min_overlap = config.min_overlap;
    let chunks = run_chunked(&cells, config.execution, config.chunks_per_worker, |chunk| {
        Ok::<_, Infallible>(
            chunk
                .iter()
                .map(|&(i, j)| score_cell(rows[i], cols[j], min_overlap))
                .collect::<Vec<_>>(),
        )
    })?;

    let mut scores = DMatrix::from_element(n, m, f64::NAN);
    let mut overlaps = DMatrix::zeros(n, m);
    for (&(i, j), cell) in cells.iter().zip(chunks.into_iter().flatten()) {
        scores[(i, j)] = cell.score.unwrap_or(f64::NAN);
        overlaps[(i, j)] = cell.overlap;
    }

    let matrix = SimilarityMatrix {
        candidates: candidates.keys().cloned().collect(),
        references: references.keys().cloned().collect(),
        scores,
        overlaps,
    };
    tracing::info!(
        candidates = n,
        references = m,
        defined_cells = matrix.defined_cells(),
        min_overlap,
        "scored similarity matrix"
    );
    Ok(matrix)
}
