//! Configuration file support for the solver.
//!
//! A config file is TOML with a single `[gnm]` table:
//!
//! ```toml
//! [gnm]
//! steps = 100
//! lambda_end = -10.0
//! threshold = 0.01
//! ```
//!
//! Missing keys fall back to the defaults below.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::errors::GambitError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Global Newton Method settings
    pub gnm: GnmConfig,
}

/// Tuning parameters for the Global Newton Method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GnmConfig {
    /// Sets the initial predictor step to `1 / steps`
    pub steps: usize,

    /// Probabilities below this are treated as zero in reported profiles;
    /// also the residual target of a full Newton correction
    pub fuzz: f64,

    /// Run a full Newton correction every this many accepted steps
    pub lnm_frequency: usize,

    /// Maximum Newton iterations in a full correction
    pub lnm_max: usize,

    /// Stop following the path once lambda drops below this
    pub lambda_end: f64,

    /// Retry a path from a nudged perturbation when it stalls
    pub wobble: bool,

    /// Maximum regret (in normalised payoff units) for a reported equilibrium
    pub threshold: f64,
}

impl Default for GnmConfig {
    fn default() -> Self {
        GnmConfig {
            steps: 100,
            fuzz: 1e-12,
            lnm_frequency: 3,
            lnm_max: 10,
            lambda_end: -10.0,
            wobble: false,
            threshold: 1e-2,
        }
    }
}

impl GnmConfig {
    /// Reject settings the path follower cannot run with.
    pub fn validate(&self) -> std::result::Result<(), GambitError> {
        if self.steps == 0 {
            return Err(GambitError::InvalidConfig("steps must be positive".into()));
        }
        if self.lnm_frequency == 0 {
            return Err(GambitError::InvalidConfig(
                "lnm_frequency must be positive".into(),
            ));
        }
        if self.lnm_max == 0 {
            return Err(GambitError::InvalidConfig("lnm_max must be positive".into()));
        }
        if !(self.lambda_end < 0.0) {
            return Err(GambitError::InvalidConfig(
                "lambda_end must be negative".into(),
            ));
        }
        if !(self.threshold > 0.0) {
            return Err(GambitError::InvalidConfig(
                "threshold must be positive".into(),
            ));
        }
        if !(self.fuzz >= 0.0) {
            return Err(GambitError::InvalidConfig(
                "fuzz must not be negative".into(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        config
            .gnm
            .validate()
            .with_context(|| format!("invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory: {}", parent.display())
            })?;
        }

        let contents =
            toml::to_string_pretty(self).with_context(|| "failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.gnm.steps, 100);
        assert_eq!(config.gnm.lnm_frequency, 3);
        assert_eq!(config.gnm.lnm_max, 10);
        assert_eq!(config.gnm.lambda_end, -10.0);
        assert!(!config.gnm.wobble);
        assert!(config.gnm.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[gnm]\nsteps = 50\n").unwrap();
        assert_eq!(config.gnm.steps, 50);
        assert_eq!(config.gnm.threshold, 1e-2);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.gnm.lambda_end = -5.0;
        config.gnm.wobble = true;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.gnm, config.gnm);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[gnm]\nlambda_end = 3.0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("lambda_end"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_or_default(&tmp.path().join("absent.toml"));
        assert_eq!(config.gnm, GnmConfig::default());
    }
}
