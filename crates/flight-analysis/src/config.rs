use crate::error::{FlightError, Result};
use flight_core::DEFAULT_DATABASE_FILE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    pub seed: u64,
    pub test_ratio: f64,
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            test_ratio: 0.3,
            learning_rate: 0.5,
            epochs: 200,
            l2: 1e-4,
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(FlightError::Config(format!(
                "pipeline.test_ratio must be between 0 and 1 (exclusive), got {}",
                self.test_ratio
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(FlightError::Config(format!(
                "pipeline.learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(FlightError::Config(
                "pipeline.epochs must be at least 1".to_string(),
            ));
        }
        if !(self.l2.is_finite() && self.l2 >= 0.0) {
            return Err(FlightError::Config(format!(
                "pipeline.l2 must be non-negative, got {}",
                self.l2
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: PathBuf,
    pub data_dir: PathBuf,
    pub pipeline: PipelineSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE_FILE),
            data_dir: PathBuf::from("."),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            FlightError::Config(format!("failed to read {}: {}", path.display(), err))
        })?;
        Self::from_yaml(&raw)
            .map_err(|err| FlightError::Config(format!("{} ({})", err, path.display())))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: AppConfig = if raw.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(raw)
                .map_err(|err| FlightError::Config(format!("invalid config YAML: {}", err)))?
        };
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_fields() {
        let config = AppConfig::from_yaml(
            "database: /tmp/flights.sqlite
pipeline:
  seed: 7
",
        )
        .expect("valid config");
        assert_eq!(config.database, PathBuf::from("/tmp/flights.sqlite"));
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert_eq!(config.pipeline.seed, 7);
        assert_eq!(config.pipeline.test_ratio, 0.3);
        assert_eq!(config.pipeline.epochs, 200);
    }

    #[test]
    fn empty_yaml_is_default_config() {
        assert_eq!(
            AppConfig::from_yaml("  \n").expect("empty config"),
            AppConfig::default()
        );
    }

    #[test]
    fn rejects_out_of_range_pipeline_settings() {
        let err = AppConfig::from_yaml("pipeline:\n  test_ratio: 1.5\n").expect_err("bad ratio");
        assert!(err.to_string().contains("test_ratio"));

        let err = AppConfig::from_yaml("pipeline:\n  epochs: 0\n").expect_err("bad epochs");
        assert!(err.to_string().contains("epochs"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = AppConfig::from_yaml("host: localhost\n").expect_err("unknown key");
        assert!(matches!(err, FlightError::Config(_)));
    }
}
