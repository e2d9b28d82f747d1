//! Configuration management for the fraud scoring pipeline

use crate::models::forest::ForestConfig;
use crate::models::scorer::ScorerSettings;
use crate::models::state::DEFAULT_MODEL_PATH;
use crate::models::synthetic::DEFAULT_SAMPLE_COUNT;
use crate::types::alert::TierThresholds;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Prefix for environment overrides, e.g. `FRAUD__NATS__URL`
pub const ENV_PREFIX: &str = "FRAUD";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub model: ModelConfig,
    pub detection: DetectionConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transactions
    pub transaction_subject: String,
    /// Subject for outgoing assessments
    pub score_subject: String,
    /// Subject for outgoing fraud alerts
    pub alert_subject: String,
}

/// Model persistence and bootstrap training
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model file, created by bootstrap when missing
    pub path: PathBuf,
    /// Seed for synthetic data and forest training
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_estimators")]
    pub n_estimators: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Synthetic records used to bootstrap a model
    #[serde(default = "default_bootstrap_samples")]
    pub bootstrap_samples: usize,
}

fn default_seed() -> u64 {
    42
}

fn default_estimators() -> usize {
    100
}

fn default_max_depth() -> usize {
    10
}

fn default_bootstrap_samples() -> usize {
    DEFAULT_SAMPLE_COUNT
}

/// Detection configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectionConfig {
    /// Probability above which a transaction is flagged as fraud
    pub fraud_threshold: f64,
    /// Probability above which an alert is raised
    pub alert_threshold: f64,
    /// Risk tier classification thresholds
    #[serde(default)]
    pub tiers: TierThresholds,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            fraud_threshold: 0.5,
            alert_threshold: 0.7,
            tiers: TierThresholds::default(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrently processed transactions
    pub workers: usize,
    /// Seconds between metrics summaries
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file plus environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path plus environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let detection = &self.detection;
        for (name, value) in [
            ("fraud_threshold", detection.fraud_threshold),
            ("alert_threshold", detection.alert_threshold),
            ("tiers.medium", detection.tiers.medium),
            ("tiers.high", detection.tiers.high),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("detection.{} must be within [0, 1], got {}", name, value);
            }
        }
        if detection.tiers.medium > detection.tiers.high {
            anyhow::bail!(
                "detection.tiers.medium ({}) exceeds detection.tiers.high ({})",
                detection.tiers.medium,
                detection.tiers.high
            );
        }
        if self.pipeline.workers == 0 {
            anyhow::bail!("pipeline.workers must be at least 1");
        }
        if self.model.n_estimators == 0 || self.model.bootstrap_samples == 0 {
            anyhow::bail!("model.n_estimators and model.bootstrap_samples must be positive");
        }
        Ok(())
    }

    /// Scorer settings derived from the model and detection sections
    pub fn scorer_settings(&self) -> ScorerSettings {
        ScorerSettings {
            model_path: self.model.path.clone(),
            forest: ForestConfig {
                n_estimators: self.model.n_estimators,
                max_depth: self.model.max_depth,
                seed: self.model.seed,
                ..ForestConfig::default()
            },
            bootstrap_samples: self.model.bootstrap_samples,
            tiers: self.detection.tiers.clone(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                transaction_subject: "transactions".to_string(),
                score_subject: "fraud.scores".to_string(),
                alert_subject: "fraud.alerts".to_string(),
            },
            model: ModelConfig {
                path: PathBuf::from(DEFAULT_MODEL_PATH),
                seed: default_seed(),
                n_estimators: default_estimators(),
                max_depth: default_max_depth(),
                bootstrap_samples: default_bootstrap_samples(),
            },
            detection: DetectionConfig::default(),
            pipeline: PipelineConfig {
                workers: 4,
                metrics_interval_secs: default_metrics_interval(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.score_subject, "fraud.scores");
        assert_eq!(config.detection.fraud_threshold, 0.5);
        assert_eq!(config.detection.alert_threshold, 0.7);
        assert_eq!(config.model.path, PathBuf::from("fraud_model.bin"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scorer_settings_match_defaults() {
        let settings = AppConfig::default().scorer_settings();
        assert_eq!(settings, ScorerSettings::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[nats]
url = "nats://nats:4222"
transaction_subject = "tx.in"
score_subject = "tx.scores"
alert_subject = "tx.alerts"

[model]
path = "/var/lib/fraud/model.bin"
n_estimators = 25

[detection]
fraud_threshold = 0.6
alert_threshold = 0.75

[detection.tiers]
medium = 0.4
high = 0.9

[pipeline]
workers = 8

[logging]
level = "debug"
format = "pretty"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.nats.transaction_subject, "tx.in");
        assert_eq!(config.model.n_estimators, 25);
        assert_eq!(config.model.max_depth, 10);
        assert_eq!(config.model.seed, 42);
        assert_eq!(config.detection.tiers.high, 0.9);
        assert_eq!(config.pipeline.workers, 8);
        assert_eq!(config.pipeline.metrics_interval_secs, 30);

        let settings = config.scorer_settings();
        assert_eq!(settings.forest.n_estimators, 25);
        assert_eq!(settings.tiers.medium, 0.4);
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut config = AppConfig::default();
        config.detection.alert_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.detection.tiers = TierThresholds {
            medium: 0.9,
            high: 0.6,
        };
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pipeline.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let config = AppConfig::load_from_path(path).unwrap();
        assert_eq!(config.detection, DetectionConfig::default());
        assert_eq!(config.scorer_settings(), ScorerSettings::default());
    }
}
