//! Resolver configuration
//!
//! Loaded from YAML:
//!
//! ```yaml
//! min_relevant_gain: 0.15
//! model_parallelism: 4
//! collaborator_timeout_ms: 30000
//! ranking_strategy: "lexical-scope 1 priority 2 evidence 3"
//! ```
//!
//! Missing keys take their defaults.

use crate::error::ResolverError;
use kres_knowledge::{CoveragePolicy, DEFAULT_COMPLETENESS_EPSILON, DEFAULT_MIN_RELEVANT_GAIN};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default ordering of ranking criteria
pub const DEFAULT_RANKING_STRATEGY: &str =
    "lexical-scope 1 priority 2 semantic-concordance 3 evidence 4 scale-coverage 5 scale-specificity 6";

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum coverage gain for a contribution to be merged
    pub min_relevant_gain: f64,
    /// Tolerance under 1.0 at which coverage counts as complete
    pub completeness_epsilon: f64,
    /// Strategies evaluated concurrently for one observable
    pub strategy_parallelism: usize,
    /// Models (and model dependencies) evaluated concurrently
    pub model_parallelism: usize,
    /// Timeout for each collaborator call, in milliseconds
    pub collaborator_timeout_ms: u64,
    /// Maximum nesting of resolution steps
    pub max_resolution_depth: usize,
    /// Ranking criteria and their order
    pub ranking_strategy: String,
}

impl ResolverConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_min_relevant_gain(mut self, gain: f64) -> Self {
        self.min_relevant_gain = gain;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_completeness_epsilon(mut self, epsilon: f64) -> Self {
        self.completeness_epsilon = epsilon;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_strategy_parallelism(mut self, n: usize) -> Self {
        self.strategy_parallelism = n;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_model_parallelism(mut self, n: usize) -> Self {
        self.model_parallelism = n;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_ranking_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.ranking_strategy = strategy.into();
        self
    }

    /// Coverage thresholds derived from this configuration
    #[must_use]
    pub fn coverage_policy(&self) -> CoveragePolicy {
        CoveragePolicy {
            min_relevant_gain: self.min_relevant_gain,
            completeness_epsilon: self.completeness_epsilon,
        }
    }

    #[inline]
    #[must_use]
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }

    /// Parse YAML configuration
    ///
    /// # Errors
    /// Returns [`ResolverError::Config`] on malformed YAML or invalid values.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ResolverError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| ResolverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns [`ResolverError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ResolverError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ResolverError::Config(format!("{}: {e}", path.display())))?;
        tracing::debug!("Loading resolver configuration from {}", path.display());
        Self::from_yaml_str(&yaml)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ResolverError::Config`] naming the first invalid value.
    pub fn validate(&self) -> Result<(), ResolverError> {
        if !(0.0..=1.0).contains(&self.min_relevant_gain) {
            return Err(ResolverError::Config(format!(
                "min_relevant_gain must be in [0, 1], got {}",
                self.min_relevant_gain
            )));
        }
        if !(0.0..0.5).contains(&self.completeness_epsilon) {
            return Err(ResolverError::Config(format!(
                "completeness_epsilon must be in [0, 0.5), got {}",
                self.completeness_epsilon
            )));
        }
        if self.strategy_parallelism == 0 || self.model_parallelism == 0 {
            return Err(ResolverError::Config("parallelism must be at least 1".into()));
        }
        if self.collaborator_timeout_ms == 0 {
            return Err(ResolverError::Config("collaborator_timeout_ms must be positive".into()));
        }
        if self.max_resolution_depth == 0 {
            return Err(ResolverError::Config("max_resolution_depth must be positive".into()));
        }
        Ok(())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_relevant_gain: DEFAULT_MIN_RELEVANT_GAIN,
            completeness_epsilon: DEFAULT_COMPLETENESS_EPSILON,
            strategy_parallelism: 1,
            model_parallelism: 4,
            collaborator_timeout_ms: 30_000,
            max_resolution_depth: 64,
            ranking_strategy: DEFAULT_RANKING_STRATEGY.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ResolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.coverage_policy(), CoveragePolicy::default());
        assert_eq!(config.collaborator_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ResolverConfig::from_yaml_str("model_parallelism: 2\nmin_relevant_gain: 0.2\n").unwrap();
        assert_eq!(config.model_parallelism, 2);
        assert!((config.min_relevant_gain - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.max_resolution_depth, 64);
        assert_eq!(config.ranking_strategy, DEFAULT_RANKING_STRATEGY);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(ResolverConfig::from_yaml_str("min_relevant_gain: 1.5").is_err());
        assert!(ResolverConfig::from_yaml_str("strategy_parallelism: 0").is_err());
        assert!(ResolverConfig::from_yaml_str("max_resolution_depth: [").is_err());
        assert!(ResolverConfig::new().with_max_resolution_depth(0).validate().is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "collaborator_timeout_ms: 250").unwrap();
        writeln!(file, "ranking_strategy: \"priority 1\"").unwrap();

        let config = ResolverConfig::load(file.path()).unwrap();
        assert_eq!(config.collaborator_timeout(), Duration::from_millis(250));
        assert_eq!(config.ranking_strategy, "priority 1");
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ResolverConfig::load("/nonexistent/resolver.yaml").unwrap_err();
        assert!(matches!(err, ResolverError::Config(_)));
    }
}
