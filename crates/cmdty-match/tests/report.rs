use cmdty_match::matcher::{match_series, MatcherConfig};
use cmdty_match::report::{MatchReport, Side};
use cmdty_match::returns::{ExcludedSeries, ExclusionReason};
use cmdty_match::series::{IndexSemantics, Period, ReturnSeries, SeriesSet};
use cmdty_match::similarity::SimilarityMatrix;

fn period(y: i32, m: u32) -> Period {
    Period::new(y, m).expect("valid period")
}

fn sample_report() -> MatchReport {
    let matrix = SimilarityMatrix::from_rows(
        &["SPGCCLP Index", "SPGCGCP Index", "mystery"],
        &["Commod_01", "Commod_02"],
        &[
            vec![Some(0.97), Some(0.2)],
            vec![Some(0.1), Some(0.4)],
            vec![None, Some(0.35)],
        ],
    )
    .expect("matrix");
    let assignment = match_series(&matrix, &MatcherConfig::default()).expect("feasible");
    MatchReport::build(&matrix, &assignment, 0.5)
}

#[test]
fn report_lists_accepted_and_unmatched_with_descriptions() {
    let report = sample_report();
    assert_eq!(report.candidates_scored, 3);
    assert_eq!(report.references_scored, 2);
    assert_eq!(report.defined_cells, 5);

    assert_eq!(report.accepted.len(), 1);
    let accepted = &report.accepted[0];
    assert_eq!(accepted.candidate, "SPGCCLP Index");
    assert_eq!(accepted.reference, "Commod_01");
    assert_eq!(accepted.candidate_description.as_deref(), Some("WTI Crude Oil (Energy)"));

    let gold = report
        .unmatched_candidates
        .iter()
        .find(|u| u.label == "SPGCGCP Index")
        .expect("gold unmatched");
    assert_eq!(gold.best_match.as_deref(), Some("Commod_02"));
    assert_eq!(gold.best_similarity, Some(0.4));
    assert!(gold.description.as_deref().is_some_and(|d| d.starts_with("Gold")));

    let mystery = report.unmatched_candidates.iter().find(|u| u.label == "mystery").expect("mystery");
    assert_eq!(mystery.description, None);
    assert_eq!(report.unmatched_references[0].label, "Commod_02");
    assert!(!report.is_complete());
}

#[test]
fn report_records_exclusions_and_low_coverage() {
    let mut report = sample_report();
    report.record_exclusions(
        Side::Reference,
        &[ExcludedSeries {
            label: "Commod_09".into(),
            reason: ExclusionReason::InsufficientData { valid: 3, required: 24 },
        }],
    );

    let mut set = SeriesSet::new();
    set.insert(
        "sparse".into(),
        ReturnSeries::from_returns(
            "sparse",
            IndexSemantics::Excess,
            vec![(period(2020, 1), Some(0.1)), (period(2020, 4), Some(0.2))],
        ),
    );
    set.insert(
        "dense".into(),
        ReturnSeries::from_dense("dense", IndexSemantics::Excess, period(2020, 1), vec![Some(0.1); 4]),
    );
    report.record_coverage(Side::Candidate, &set, 0.7);
    assert_eq!(report.low_coverage.len(), 1);
    assert_eq!(report.low_coverage[0].label, "sparse");
    assert!((report.low_coverage[0].coverage - 0.5).abs() < 1e-12);

    let json = report.to_json_pretty().expect("json");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(value["excluded"][0]["side"], "reference");
    assert_eq!(value["excluded"][0]["label"], "Commod_09");
    assert_eq!(value["excluded"][0]["reason"], "insufficient_data");
    assert_eq!(value["excluded"][0]["required"], 24);
    assert_eq!(value["accepted"][0]["reference"], "Commod_01");

    let parsed: MatchReport = serde_json::from_str(&json).expect("round trip");
    assert_eq!(parsed, report);
}
