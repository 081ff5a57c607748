//! End-to-end run: normalize, score, match, assemble.
//!
//! Stages only flow forward. A run either yields a panel together with its
//! diagnostic report or stops at the first fatal error; per-series problems
//! (short history, low coverage) are recorded in the report instead.

use thiserror::Error;

use crate::cache::SimilarityCache;
use crate::config::{ConfigError, MatchingConfig};
use crate::matcher::{match_series, Assignment, MatchError};
use crate::panel::{assemble_panel, OutputPanel, PanelError};
use crate::report::{MatchReport, Side};
use crate::returns::{filter_min_history, normalize_all, NormalizedSet};
use crate::series::{CandidateSet, RawSeries, ReferenceSet};
use crate::similarity::{score_sets, SimilarityError, SimilarityMatrix};

#[derive(Debug, Clone, Copy)]
pub struct MatchingPipelineInput<'a> {
    /// Vendor level series, labels opaque.
    pub candidates: &'a [RawSeries],
    /// Return-denominated series keyed by canonical identity.
    pub references: &'a ReferenceSet,
}

#[derive(Debug, Clone)]
pub struct MatchingPipelineOutput {
    pub panel: OutputPanel,
    pub report: MatchReport,
    pub assignment: Assignment,
    pub similarity: SimilarityMatrix,
    /// Candidates that survived normalization, as scored.
    pub candidates: CandidateSet,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Similarity(#[from] SimilarityError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Panel(#[from] PanelError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[tracing::instrument(skip_all, fields(candidates = input.candidates.len(), references = input.references.len()))]
pub fn run_matching_pipeline(
    input: MatchingPipelineInput<'_>,
    config: &MatchingConfig,
) -> PipelineResult<MatchingPipelineOutput> {
    config.validate()?;
    let prepared = prepare(input, config);
    let similarity = score_sets(&prepared.candidates.series, &prepared.references.series, &config.scoring)?;
    finish(input, config, prepared, similarity)
}

/// Same as [`run_matching_pipeline`], reusing `cache` for the similarity
/// matrix when the normalized inputs and scoring rule are unchanged.
#[tracing::instrument(skip_all, fields(candidates = input.candidates.len(), references = input.references.len()))]
pub fn run_matching_pipeline_cached(
    input: MatchingPipelineInput<'_>,
    config: &MatchingConfig,
    cache: &mut SimilarityCache,
) -> PipelineResult<MatchingPipelineOutput> {
    config.validate()?;
    let prepared = prepare(input, config);
    let similarity = cache
        .get_or_score(&prepared.candidates.series, &prepared.references.series, &config.scoring)?
        .clone();
    finish(input, config, prepared, similarity)
}

struct Prepared {
    candidates: NormalizedSet,
    references: NormalizedSet,
}

fn prepare(input: MatchingPipelineInput<'_>, config: &MatchingConfig) -> Prepared {
    let candidates = normalize_all(input.candidates, &config.normalizer);
    let references =
        filter_min_history(input.references.clone(), config.normalizer.min_valid_periods);

    let expected = config.normalizer.semantics;
    for (label, series) in &references.series {
        if series.semantics() != expected {
            tracing::warn!(
                %label,
                reference = ?series.semantics(),
                candidates = ?expected,
                "reference return semantics differ from candidates"
            );
        }
    }
    tracing::info!(
        candidates = candidates.series.len(),
        candidates_excluded = candidates.excluded.len(),
        references = references.series.len(),
        references_excluded = references.excluded.len(),
        "normalized inputs"
    );
    Prepared { candidates, references }
}

fn finish(
    input: MatchingPipelineInput<'_>,
    config: &MatchingConfig,
    prepared: Prepared,
    similarity: SimilarityMatrix,
) -> PipelineResult<MatchingPipelineOutput> {
    let assignment = match_series(&similarity, &config.matcher)?;

    let mut report =
        MatchReport::build(&similarity, &assignment, config.matcher.acceptance_threshold);
    report.record_exclusions(Side::Candidate, &prepared.candidates.excluded);
    report.record_exclusions(Side::Reference, &prepared.references.excluded);
    report.record_coverage(
        Side::Candidate,
        &prepared.candidates.series,
        config.coverage_warning_threshold,
    );
    report.record_coverage(
        Side::Reference,
        &prepared.references.series,
        config.coverage_warning_threshold,
    );

    let panel = assemble_panel(&assignment, &prepared.candidates.series, input.references)?;
    Ok(MatchingPipelineOutput {
        panel,
        report,
        assignment,
        similarity,
        candidates: prepared.candidates.series,
    })
}
