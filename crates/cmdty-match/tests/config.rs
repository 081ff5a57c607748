use cmdty_match::config::{ConfigError, MatchingConfig};
use cmdty_match::matcher::MatchObjective;
use cmdty_match::parallel::ExecutionMode;
use cmdty_match::returns::ReturnConvention;
use cmdty_match::series::IndexSemantics;

#[test]
fn defaults_match_documented_values() {
    let config = MatchingConfig::default();
    assert_eq!(config.normalizer.min_valid_periods, 24);
    assert_eq!(config.normalizer.convention, ReturnConvention::Simple);
    assert_eq!(config.normalizer.semantics, IndexSemantics::Excess);
    assert_eq!(config.scoring.min_overlap, 24);
    assert_eq!(config.matcher.acceptance_threshold, 0.5);
    assert_eq!(config.matcher.objective, MatchObjective::AboveThreshold);
    assert_eq!(config.coverage_warning_threshold, 0.7);
    assert!(matches!(config.scoring.execution, ExecutionMode::Threaded { .. }));
    config.validate().expect("defaults are valid");
}

#[test]
fn partial_json_fills_defaults() {
    let config = MatchingConfig::from_json_str(
        r#"{
            "normalizer": { "convention": "log", "min_valid_periods": 36 },
            "scoring": { "execution": { "mode": "serial" } },
            "matcher": { "acceptance_threshold": 0.6, "objective": "all_defined" }
        }"#,
    )
    .expect("valid config");
    assert_eq!(config.normalizer.convention, ReturnConvention::Log);
    assert_eq!(config.normalizer.min_valid_periods, 36);
    assert_eq!(config.normalizer.semantics, IndexSemantics::Excess);
    assert_eq!(config.scoring.execution, ExecutionMode::Serial);
    assert_eq!(config.scoring.min_overlap, 24);
    assert_eq!(config.matcher.acceptance_threshold, 0.6);
    assert_eq!(config.matcher.objective, MatchObjective::AllDefined);
    assert_eq!(config.coverage_warning_threshold, 0.7);

    let from_reader = MatchingConfig::from_json_reader("{}".as_bytes()).expect("empty object");
    assert_eq!(from_reader.scoring.min_overlap, 24);
}

#[test]
fn config_round_trips_through_json() {
    let mut config = MatchingConfig::default();
    config.scoring.execution = ExecutionMode::Threaded { num_threads: 3 };
    config.matcher.acceptance_threshold = 0.25;
    let json = serde_json::to_string(&config).expect("serialize");
    assert_eq!(MatchingConfig::from_json_str(&json).expect("parse"), config);
}

#[test]
fn invalid_values_are_rejected() {
    for json in [
        r#"{"matcher": {"acceptance_threshold": 1.0}}"#,
        r#"{"matcher": {"acceptance_threshold": -1.5}}"#,
        r#"{"normalizer": {"min_valid_periods": 1}}"#,
        r#"{"scoring": {"min_overlap": 2}}"#,
        r#"{"scoring": {"chunks_per_worker": 0}}"#,
        r#"{"scoring": {"execution": {"mode": "threaded", "num_threads": 0}}}"#,
        r#"{"coverage_warning_threshold": 1.5}"#,
    ] {
        let err = MatchingConfig::from_json_str(json).expect_err(json);
        assert!(matches!(err, ConfigError::InvalidParameter(_)), "{json}: {err}");
    }

    let err = MatchingConfig::from_json_str(r#"{"matcher": {"objective": "greedy"}}"#)
        .expect_err("unknown objective");
    assert!(matches!(err, ConfigError::Parse(_)));
}
