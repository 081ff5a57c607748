use chrono::NaiveDate;
use cmdty_match::returns::{
    coverage, filter_min_history, normalize_all, normalize_returns, ExclusionReason,
    NormalizeError, NormalizerConfig, ReturnConvention,
};
use cmdty_match::series::{IndexSemantics, Period, RawSeries, ReturnSeries, SeriesSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn period(y: i32, m: u32) -> Period {
    Period::new(y, m).expect("valid period")
}

fn month_end(y: i32, m: u32) -> NaiveDate {
    let p = period(y, m);
    NaiveDate::from_ymd_opt(y, m, p.last_day()).expect("valid date")
}

fn mid_month(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 15).expect("valid date")
}

fn config(min_valid_periods: usize) -> NormalizerConfig {
    NormalizerConfig { min_valid_periods, ..NormalizerConfig::default() }
}

#[test]
fn test_gapless_series_returns_equal_level_ratio() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut levels = Vec::new();
    let mut level = 100.0;
    let mut raw = RawSeries::new("SPGCCLP Index");
    let mut p = period(2015, 1);
    for _ in 0..40 {
        // Intra-month noise must not leak into the month-end level.
        raw.push(mid_month(p.year(), p.month()), Some(level * rng.gen_range(0.5..1.5)));
        level *= 1.0 + rng.gen_range(-0.08..0.08);
        raw.push(month_end(p.year(), p.month()), Some(level));
        levels.push(level);
        p = p.succ();
    }

    let series = normalize_returns(&raw, &config(24)).expect("normalized");
    assert_eq!(series.len(), 40);
    assert_eq!(series.first_period(), Some(period(2015, 1)));
    assert_eq!(series.values()[0], None);
    assert_eq!(series.defined_count(), 39);
    for (idx, value) in series.values().iter().enumerate().skip(1) {
        let expected = levels[idx] / levels[idx - 1] - 1.0;
        let actual = value.expect("defined return");
        assert!((actual - expected).abs() < 1e-12);
    }
}

#[test]
fn test_log_convention_uses_log_ratio() {
    let raw = RawSeries::from_pairs(
        "x",
        vec![
            (month_end(2020, 1), Some(100.0)),
            (month_end(2020, 2), Some(110.0)),
            (month_end(2020, 3), Some(99.0)),
        ],
    );
    let cfg = NormalizerConfig { convention: ReturnConvention::Log, ..config(2) };
    let series = normalize_returns(&raw, &cfg).expect("normalized");
    assert!((series.get(period(2020, 2)).expect("feb") - (1.1f64).ln()).abs() < 1e-12);
    assert!((series.get(period(2020, 3)).expect("mar") - (0.9f64).ln()).abs() < 1e-12);
}

#[test]
fn test_missing_month_yields_two_missing_returns() {
    let raw = RawSeries::from_pairs(
        "x",
        vec![
            (month_end(2020, 1), Some(100.0)),
            (month_end(2020, 2), Some(102.0)),
            (month_end(2020, 4), Some(130.0)),
            (month_end(2020, 5), Some(143.0)),
        ],
    );
    let series = normalize_returns(&raw, &config(2)).expect("normalized");
    assert_eq!(series.len(), 5);
    assert!((series.get(period(2020, 2)).expect("feb") - 0.02).abs() < 1e-12);
    assert_eq!(series.get(period(2020, 3)), None);
    assert_eq!(series.get(period(2020, 4)), None);
    assert!((series.get(period(2020, 5)).expect("may") - 0.1).abs() < 1e-12);
    assert_eq!(series.defined_count(), 2);
}

#[test]
fn test_unsorted_and_duplicate_timestamps() {
    let raw = RawSeries::from_pairs(
        "x",
        vec![
            (month_end(2020, 3), Some(121.0)),
            (month_end(2020, 1), Some(90.0)),
            (month_end(2020, 2), Some(110.0)),
            (month_end(2020, 1), Some(100.0)),
            (month_end(2020, 2), None),
        ],
    );
    let series = normalize_returns(&raw, &config(2)).expect("normalized");
    assert!((series.get(period(2020, 2)).expect("feb") - 0.1).abs() < 1e-12);
    assert!((series.get(period(2020, 3)).expect("mar") - 0.1).abs() < 1e-12);
}

#[test]
fn test_non_positive_level_breaks_adjacent_returns() {
    let raw = RawSeries::from_pairs(
        "x",
        vec![
            (month_end(2020, 1), Some(100.0)),
            (month_end(2020, 2), Some(-5.0)),
            (month_end(2020, 3), Some(100.0)),
            (month_end(2020, 4), Some(105.0)),
        ],
    );
    let series = normalize_returns(&raw, &config(1)).expect("normalized");
    assert_eq!(series.get(period(2020, 2)), None);
    assert_eq!(series.get(period(2020, 3)), None);
    assert!((series.get(period(2020, 4)).expect("apr") - 0.05).abs() < 1e-12);
}

#[test]
fn test_short_history_is_rejected() {
    let raw = RawSeries::from_pairs(
        "short",
        (1..=6).map(|m| (month_end(2021, m), Some(100.0 + m as f64))),
    );
    let err = normalize_returns(&raw, &config(24)).expect_err("too short");
    assert_eq!(
        err,
        NormalizeError::InsufficientData { label: "short".to_string(), valid: 5, required: 24 }
    );

    let empty = RawSeries::from_pairs("empty", vec![(month_end(2021, 1), None)]);
    let err = normalize_returns(&empty, &config(2)).expect_err("no levels");
    assert!(matches!(err, NormalizeError::InsufficientData { valid: 0, .. }));
}

#[test]
fn test_normalize_all_records_exclusions() {
    let long = RawSeries::from_pairs("b", (1..=12).map(|m| (month_end(2021, m), Some(50.0 + m as f64))));
    let short = RawSeries::from_pairs("a", (1..=3).map(|m| (month_end(2021, m), Some(10.0))));
    let duplicate = RawSeries::from_pairs("b", vec![(month_end(2022, 1), Some(1.0))]);

    let out = normalize_all(&[long, short, duplicate], &config(6));
    assert_eq!(out.series.keys().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(out.series["b"].defined_count(), 11);
    assert_eq!(out.excluded.len(), 2);
    assert_eq!(out.excluded[0].label, "a");
    assert_eq!(out.excluded[0].reason, ExclusionReason::InsufficientData { valid: 2, required: 6 });
    assert_eq!(out.excluded[1].label, "b");
    assert_eq!(out.excluded[1].reason, ExclusionReason::DuplicateLabel);
}

#[test]
fn test_semantics_tag_is_carried() {
    let raw = RawSeries::from_pairs("tr", (1..=4).map(|m| (month_end(2021, m), Some(10.0 * m as f64))));
    let cfg = NormalizerConfig { semantics: IndexSemantics::Total, ..config(2) };
    let series = normalize_returns(&raw, &cfg).expect("normalized");
    assert_eq!(series.semantics(), IndexSemantics::Total);
    assert_eq!(series.label(), "tr");
}

#[test]
fn test_filter_min_history_and_coverage() {
    let full = ReturnSeries::from_dense("full", IndexSemantics::Excess, period(2020, 1), vec![Some(0.01); 10]);
    let sparse = ReturnSeries::from_returns(
        "sparse",
        IndexSemantics::Excess,
        vec![(period(2020, 1), Some(0.01)), (period(2020, 10), Some(0.02))],
    );
    assert_eq!(sparse.len(), 10);
    assert!((coverage(&full) - 1.0).abs() < 1e-12);
    assert!((coverage(&sparse) - 0.2).abs() < 1e-12);
    assert_eq!(coverage(&ReturnSeries::empty("e", IndexSemantics::Excess)), 0.0);

    let mut set = SeriesSet::new();
    set.insert("full".to_string(), full);
    set.insert("sparse".to_string(), sparse);
    let out = filter_min_history(set, 5);
    assert_eq!(out.series.len(), 1);
    assert!(out.series.contains_key("full"));
    assert_eq!(out.excluded[0].label, "sparse");
}
