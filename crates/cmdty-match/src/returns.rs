//! Level-to-return normalization.
//!
//! Raw levels are collapsed to the last valid observation of each calendar
//! month and turned into month-over-month returns. Months without an
//! observation stay missing; nothing is interpolated or compounded across a
//! gap, so a missing month yields two missing returns rather than one large
//! one.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::series::{IndexSemantics, Period, RawSeries, ReturnSeries, SeriesSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnConvention {
    #[default]
    Simple,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub convention: ReturnConvention,
    pub semantics: IndexSemantics,
    /// Minimum number of defined monthly returns a series must keep.
    pub min_valid_periods: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            convention: ReturnConvention::Simple,
            semantics: IndexSemantics::Excess,
            min_valid_periods: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("series '{label}' has {valid} valid monthly returns, {required} required")]
    InsufficientData { label: String, valid: usize, required: usize },
}

pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// Why a series was left out of matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum ExclusionReason {
    InsufficientData { valid: usize, required: usize },
    DuplicateLabel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedSeries {
    pub label: String,
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedSet {
    pub series: SeriesSet,
    pub excluded: Vec<ExcludedSeries>,
}

/// Last valid level per calendar month, in chronological order. Rows sharing a
/// timestamp resolve to the one delivered last.
pub fn resample_month_end(raw: &RawSeries) -> Vec<(Period, f64)> {
    let mut valid: Vec<_> = raw
        .observations
        .iter()
        .filter_map(|obs| obs.level.filter(|l| l.is_finite()).map(|level| (obs.date, level)))
        .collect();
    // Stable, so duplicates keep delivery order.
    valid.sort_by_key(|(date, _)| *date);

    let mut monthly: Vec<(Period, f64)> = Vec::new();
    for (date, level) in valid {
        let Some(period) = Period::from_date(date) else {
            continue;
        };
        match monthly.last_mut() {
            Some((last, value)) if *last == period => *value = level,
            _ => monthly.push((period, level)),
        }
    }
    monthly
}

/// Return between two consecutive month-end levels.
pub fn period_return(previous: f64, current: f64, convention: ReturnConvention) -> Option<f64> {
    if !(previous > 0.0 && current > 0.0) || !previous.is_finite() || !current.is_finite() {
        return None;
    }
    let ratio = current / previous;
    let value = match convention {
        ReturnConvention::Simple => ratio - 1.0,
        ReturnConvention::Log => ratio.ln(),
    };
    value.is_finite().then_some(value)
}

pub fn normalize_returns(raw: &RawSeries, config: &NormalizerConfig) -> NormalizeResult<ReturnSeries> {
    let monthly = resample_month_end(raw);
    let insufficient = |valid| NormalizeError::InsufficientData {
        label: raw.label.clone(),
        valid,
        required: config.min_valid_periods,
    };
    let (first, last) = match (monthly.first(), monthly.last()) {
        (Some(first), Some(last)) => (first.0, last.0),
        _ => return Err(insufficient(0)),
    };

    let span = first.months_until(last) as usize + 1;
    let mut levels: Vec<Option<f64>> = vec![None; span];
    for (period, level) in &monthly {
        levels[first.months_until(*period) as usize] = Some(*level);
    }

    let mut returns = Vec::with_capacity(span);
    returns.push(None);
    for window in levels.windows(2) {
        let value = match (window[0], window[1]) {
            (Some(previous), Some(current)) => period_return(previous, current, config.convention),
            _ => None,
        };
        returns.push(value);
    }

    let series = ReturnSeries::from_dense(raw.label.clone(), config.semantics, first, returns);
    let valid = series.defined_count();
    if valid < config.min_valid_periods {
        return Err(insufficient(valid));
    }
    Ok(series)
}

/// Normalizes every raw series, keeping failures as exclusions instead of
/// aborting. Labels are expected to be unique; a repeated label keeps the
/// first series.
pub fn normalize_all(raws: &[RawSeries], config: &NormalizerConfig) -> NormalizedSet {
    let mut out = NormalizedSet::default();
    let mut seen = BTreeSet::new();
    for raw in raws {
        if !seen.insert(raw.label.as_str()) {
            tracing::warn!(label = %raw.label, "duplicate series label, keeping first occurrence");
            out.excluded.push(ExcludedSeries {
                label: raw.label.clone(),
                reason: ExclusionReason::DuplicateLabel,
            });
            continue;
        }
        match normalize_returns(raw, config) {
            Ok(series) => {
                tracing::debug!(
                    label = %raw.label,
                    periods = series.len(),
                    defined = series.defined_count(),
                    "normalized series"
                );
                out.series.insert(raw.label.clone(), series);
            }
            Err(NormalizeError::InsufficientData { label, valid, required }) => {
                tracing::warn!(%label, valid, required, "excluding series with insufficient data");
                out.excluded.push(ExcludedSeries {
                    label,
                    reason: ExclusionReason::InsufficientData { valid, required },
                });
            }
        }
    }
    out
}

/// Applies the same minimum-history rule to series that arrive already
/// return-denominated.
pub fn filter_min_history(set: SeriesSet, min_valid_periods: usize) -> NormalizedSet {
    let mut out = NormalizedSet::default();
    for (label, series) in set {
        let valid = series.defined_count();
        if valid < min_valid_periods {
            tracing::warn!(%label, valid, required = min_valid_periods, "excluding short series");
            out.excluded.push(ExcludedSeries {
                label,
                reason: ExclusionReason::InsufficientData { valid, required: min_valid_periods },
            });
        } else {
            out.series.insert(label, series);
        }
    }
    out
}

/// Share of months in the series span that carry a defined return. The
/// leading month of a level-derived series is always missing.
pub fn coverage(series: &ReturnSeries) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.defined_count() as f64 / series.len() as f64
}
