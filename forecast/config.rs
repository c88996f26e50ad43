//! Run configuration: anchor years, forecast horizon, clip range and model hyperparameters.
//!
//! Every field has a default, so a configuration file only needs the keys it overrides:
//!
//! ```toml
//! anchor_years = [2000, 2008, 2016, 2024]
//! target_years = [2025, 2026, 2027]
//! ridge_alpha = 5.0
//! ```

use crate::construction::POLYNOMIAL_DEGREE;
use crate::model::ModelConfig;
use crate::predict::ClipBounds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use thiserror::Error;

pub const DEFAULT_ANCHOR_YEARS: [i32; 9] = [2000, 2007, 2008, 2014, 2015, 2016, 2022, 2023, 2024];
pub const DEFAULT_TARGET_START: i32 = 2025;
pub const DEFAULT_TARGET_END: i32 = 2030;
pub const DEFAULT_CLIP_MIN: f64 = 0.0;
pub const DEFAULT_CLIP_MAX: f64 = 100.0;
pub const DEFAULT_RIDGE_ALPHA: f64 = 10.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    pub anchor_years: BTreeSet<i32>,
    /// Years to forecast, in output order.
    pub target_years: Vec<i32>,
    pub clip_min: f64,
    pub clip_max: f64,
    pub ridge_alpha: f64,
    pub polynomial_degree: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            anchor_years: DEFAULT_ANCHOR_YEARS.into_iter().collect(),
            target_years: (DEFAULT_TARGET_START..=DEFAULT_TARGET_END).collect(),
            clip_min: DEFAULT_CLIP_MIN,
            clip_max: DEFAULT_CLIP_MAX,
            ridge_alpha: DEFAULT_RIDGE_ALPHA,
            polynomial_degree: POLYNOMIAL_DEGREE,
        }
    }
}

impl ForecastConfig {
    /// Reads a TOML file and validates it.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ForecastConfig = toml::from_str(&content)?;
        config.validate()?;
        log::info!("Loaded configuration from '{path}'");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.anchor_years.is_empty() {
            return Err(ConfigError::Invalid("anchor_years must not be empty".to_string()));
        }
        if self.target_years.is_empty() {
            return Err(ConfigError::Invalid("target_years must not be empty".to_string()));
        }
        self.model_config().validate().map_err(ConfigError::Invalid)?;
        self.clip_bounds()?;
        Ok(())
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            ridge_alpha: self.ridge_alpha,
            polynomial_degree: self.polynomial_degree,
        }
    }

    pub fn clip_bounds(&self) -> Result<ClipBounds, ConfigError> {
        ClipBounds::new(self.clip_min, self.clip_max)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Replaces the target years with the inclusive range `start..=end`.
    pub fn set_target_range(&mut self, start: i32, end: i32) -> Result<(), ConfigError> {
        if start > end {
            return Err(ConfigError::Invalid(format!(
                "target start year {start} is after end year {end}"
            )));
        }
        self.target_years = (start..=end).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_documented_values() {
        let config = ForecastConfig::default();
        assert_eq!(
            config.anchor_years.iter().copied().collect::<Vec<_>>(),
            vec![2000, 2007, 2008, 2014, 2015, 2016, 2022, 2023, 2024]
        );
        assert_eq!(config.target_years, vec![2025, 2026, 2027, 2028, 2029, 2030]);
        assert_eq!(config.clip_min, 0.0);
        assert_eq!(config.clip_max, 100.0);
        assert_eq!(config.ridge_alpha, 10.0);
        assert_eq!(config.polynomial_degree, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "anchor_years = [2016, 2000]\nridge_alpha = 2.5").unwrap();

        let config = ForecastConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.anchor_years.iter().copied().collect::<Vec<_>>(), vec![2000, 2016]);
        assert_eq!(config.ridge_alpha, 2.5);
        assert_eq!(config.target_years, ForecastConfig::default().target_years);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ridge = 2.5").unwrap();
        assert!(matches!(
            ForecastConfig::load(file.path().to_str().unwrap()),
            Err(ConfigError::TomlParseError(_))
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let inverted = ForecastConfig {
            clip_min: 50.0,
            clip_max: 10.0,
            ..ForecastConfig::default()
        };
        assert!(matches!(inverted.validate(), Err(ConfigError::Invalid(_))));

        let no_anchors = ForecastConfig {
            anchor_years: BTreeSet::new(),
            ..ForecastConfig::default()
        };
        assert!(matches!(no_anchors.validate(), Err(ConfigError::Invalid(_))));

        let zero_alpha = ForecastConfig {
            ridge_alpha: 0.0,
            ..ForecastConfig::default()
        };
        assert!(matches!(zero_alpha.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn target_range_is_inclusive() {
        let mut config = ForecastConfig::default();
        config.set_target_range(2031, 2033).unwrap();
        assert_eq!(config.target_years, vec![2031, 2032, 2033]);
        assert!(config.set_target_range(2040, 2030).is_err());
    }
}
