use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use cmdty_match::config::MatchingConfig;
use cmdty_match::io::{read_hkm_commodity_factors, write_panel};
use cmdty_match::pipeline::{run_matching_pipeline, MatchingPipelineInput};
use cmdty_match::series::RawSeries;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let fixture = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures/hkm/he_kelly_manela_factors_monthly.csv");
    let references =
        read_hkm_commodity_factors(File::open(fixture).expect("hkm fixture"), false).expect("hkm table");

    // Rebuild vendor-style levels from each factor under an opaque label.
    let candidates: Vec<RawSeries> = references
        .values()
        .enumerate()
        .map(|(i, factor)| {
            let mut raw = RawSeries::new(format!("IDX{}", 90 - i));
            let first = factor.first_period().expect("non-empty factor");
            let base = NaiveDate::from_ymd_opt(first.year() - 1, 12, 31).expect("valid date");
            raw.push(base, Some(100.0));
            let mut level = 100.0;
            for (period, value) in factor.iter() {
                let date = NaiveDate::from_ymd_opt(period.year(), period.month(), period.last_day())
                    .expect("valid date");
                match value {
                    Some(r) => {
                        level *= 1.0 + r;
                        raw.push(date, Some(level));
                    }
                    None => raw.push(date, None),
                }
            }
            raw
        })
        .collect();

    let mut config = MatchingConfig::default();
    config.normalizer.min_valid_periods = 3;
    config.scoring.min_overlap = 3;

    let output = run_matching_pipeline(
        MatchingPipelineInput { candidates: &candidates, references: &references },
        &config,
    )
    .expect("matching pipeline");
    assert_eq!(output.assignment.pairs.len(), references.len());

    write_panel(std::io::stdout(), &output.panel).expect("panel csv");
    println!("{}", output.report.to_json_pretty().expect("report json"));
}
