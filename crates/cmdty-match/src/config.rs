use std::io::Read;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matcher::MatcherConfig;
use crate::parallel::ExecutionMode;
use crate::returns::NormalizerConfig;
use crate::similarity::ScoringConfig;

/// Every tunable of a matching run. Missing JSON fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub normalizer: NormalizerConfig,
    pub scoring: ScoringConfig,
    pub matcher: MatcherConfig,
    /// Series whose share of defined months falls below this are flagged.
    pub coverage_warning_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            normalizer: NormalizerConfig::default(),
            scoring: ScoringConfig::default(),
            matcher: MatcherConfig::default(),
            coverage_warning_threshold: 0.7,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl MatchingConfig {
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.matcher.acceptance_threshold;
        if !threshold.is_finite() || !(-1.0..1.0).contains(&threshold) {
            return Err(ConfigError::InvalidParameter("acceptance_threshold must be in [-1, 1)"));
        }
        if self.normalizer.min_valid_periods < 2 {
            return Err(ConfigError::InvalidParameter("min_valid_periods must be >= 2"));
        }
        if self.scoring.min_overlap < 3 {
            return Err(ConfigError::InvalidParameter("min_overlap must be >= 3"));
        }
        if self.scoring.chunks_per_worker == 0 {
            return Err(ConfigError::InvalidParameter("chunks_per_worker must be > 0"));
        }
        if let ExecutionMode::Threaded { num_threads: 0 } = self.scoring.execution {
            return Err(ConfigError::InvalidParameter("num_threads must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.coverage_warning_threshold) {
            return Err(ConfigError::InvalidParameter(
                "coverage_warning_threshold must be in [0, 1]",
            ));
        }
        Ok(())
    }
}
