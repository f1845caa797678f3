use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::FlowError;

/// Tunable parameters of the localized multicommodity flow solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Initial step coefficient (beta).
    pub initial_beta: f64,
    /// Growth threshold: beta grows by 1.5 when the stability ratio is at most `mu`.
    pub mu: f64,
    /// Shrink threshold: beta shrinks while the stability ratio exceeds `nu`.
    pub nu: f64,
    /// Convergence holds once every potential difference is at most `tolerance`.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Cap on step shrinks within a single iteration.
    pub max_shrink_attempts: usize,
    /// Compute potential differences and candidate flows on the rayon pool.
    pub parallel: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            initial_beta: 1.0,
            mu: 0.5,
            nu: 0.9,
            tolerance: 0.01,
            max_iterations: 100,
            max_shrink_attempts: 50,
            parallel: false,
        }
    }
}

impl SolverConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open solver config {}", path.display()))?;
        let config: SolverConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse solver config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        if !self.initial_beta.is_finite() || self.initial_beta <= 0.0 {
            return Err(FlowError::InvalidConfig(format!(
                "initial_beta must be positive and finite, got {}",
                self.initial_beta
            )));
        }
        if !self.nu.is_finite() || self.nu <= 0.0 {
            return Err(FlowError::InvalidConfig(format!(
                "nu must be positive and finite, got {}",
                self.nu
            )));
        }
        if !self.mu.is_finite() || self.mu < 0.0 || self.mu > self.nu {
            return Err(FlowError::InvalidConfig(format!(
                "mu must lie in [0, nu = {}], got {}",
                self.nu, self.mu
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(FlowError::InvalidConfig(format!(
                "tolerance must be nonnegative and finite, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: SolverConfig =
            serde_json::from_str(r#"{"max_iterations": 250, "parallel": true}"#).unwrap();
        assert_eq!(config.max_iterations, 250);
        assert!(config.parallel);
        assert_eq!(config.initial_beta, 1.0);
        assert_eq!(config.nu, 0.9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let bad = [
            SolverConfig {
                initial_beta: 0.0,
                ..SolverConfig::default()
            },
            SolverConfig {
                nu: -1.0,
                ..SolverConfig::default()
            },
            SolverConfig {
                mu: 0.95,
                ..SolverConfig::default()
            },
            SolverConfig {
                tolerance: f64::NAN,
                ..SolverConfig::default()
            },
        ];
        for config in &bad {
            assert!(matches!(config.validate(), Err(FlowError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = SolverConfig::from_json_file("does/not/exist.json").unwrap_err();
        assert!(err.to_string().contains("does/not/exist.json"));
    }
}
