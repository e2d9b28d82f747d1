//! Fraud scorer
//!
//! Owns the trained model for the lifetime of the process. Initialization loads
//! the persisted state or bootstraps a new model from synthetic data; after
//! that the scorer is read-only and can be shared between workers behind an
//! `Arc`.
//!
//! Scoring never fails from the caller's point of view: when no model is
//! available, or the record cannot be transformed, the outcome is a neutral
//! degraded score carrying the reason.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::feature_extractor::{FeatureError, FeatureExtractor};
use crate::models::forest::{ForestConfig, ForestError, RandomForestClassifier};
use crate::models::state::{ModelState, ModelStore, PersistenceError, DEFAULT_MODEL_PATH};
use crate::models::synthetic::{self, SyntheticError, DEFAULT_SAMPLE_COUNT};
use crate::types::alert::{RiskTier, TierThresholds};
use crate::types::transaction::TransactionRecord;

/// Probability reported when no real prediction could be made
pub const NEUTRAL_PROBABILITY: f64 = 0.5;

/// Why a score was degraded
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringError {
    #[error("model not trained")]
    ModelUnavailable,

    #[error("feature transform failed: {0}")]
    FeatureTransform(String),
}

/// Errors raised while training the bootstrap model
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("feature extraction failed: {0}")]
    Features(#[from] FeatureError),

    #[error("forest training failed: {0}")]
    Forest(#[from] ForestError),

    #[error("synthetic data generation failed: {0}")]
    Synthetic(#[from] SyntheticError),
}

/// Result of scoring one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScoreOutcome {
    Scored { probability: f64, tier: RiskTier },
    Degraded { error: ScoringError },
}

impl ScoreOutcome {
    /// Fraud probability; neutral for degraded outcomes
    pub fn probability(&self) -> f64 {
        match self {
            ScoreOutcome::Scored { probability, .. } => *probability,
            ScoreOutcome::Degraded { .. } => NEUTRAL_PROBABILITY,
        }
    }

    /// Risk tier; `Untrained` or `Unknown` for degraded outcomes
    pub fn tier(&self) -> RiskTier {
        match self {
            ScoreOutcome::Scored { tier, .. } => *tier,
            ScoreOutcome::Degraded {
                error: ScoringError::ModelUnavailable,
            } => RiskTier::Untrained,
            ScoreOutcome::Degraded { .. } => RiskTier::Unknown,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ScoreOutcome::Degraded { .. })
    }

    pub fn error(&self) -> Option<&ScoringError> {
        match self {
            ScoreOutcome::Degraded { error } => Some(error),
            ScoreOutcome::Scored { .. } => None,
        }
    }
}

/// Where the active model came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelOrigin {
    Loaded,
    Bootstrapped,
}

/// Settings for loading or bootstrapping the model
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerSettings {
    pub model_path: PathBuf,
    pub forest: ForestConfig,
    /// Synthetic records generated when no model file exists
    pub bootstrap_samples: usize,
    pub tiers: TierThresholds,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            forest: ForestConfig::default(),
            bootstrap_samples: DEFAULT_SAMPLE_COUNT,
            tiers: TierThresholds::default(),
        }
    }
}

enum ScorerState {
    Untrained,
    Trained {
        model: Box<ModelState>,
        origin: ModelOrigin,
    },
}

/// Scores transactions with the trained random forest
pub struct FraudScorer {
    state: ScorerState,
    tiers: TierThresholds,
}

impl FraudScorer {
    /// Scorer without a model; every prediction is degraded
    pub fn untrained(tiers: TierThresholds) -> Self {
        Self {
            state: ScorerState::Untrained,
            tiers,
        }
    }

    /// Scorer over an already trained state
    pub fn from_state(model: ModelState, origin: ModelOrigin, tiers: TierThresholds) -> Self {
        Self {
            state: ScorerState::Trained {
                model: Box::new(model),
                origin,
            },
            tiers,
        }
    }

    /// Load the persisted model, or bootstrap and persist a new one.
    ///
    /// Blocking: reads and writes the model file.
    pub fn initialize(settings: &ScorerSettings) -> Self {
        let store = ModelStore::new(&settings.model_path);

        match store.load() {
            Ok(model) => {
                info!(
                    path = %store.path().display(),
                    trained_at = %model.trained_at,
                    trees = model.classifier.n_trees(),
                    "Loaded persisted fraud model"
                );
                return Self::from_state(model, ModelOrigin::Loaded, settings.tiers.clone());
            }
            Err(PersistenceError::NotFound(path)) => {
                info!(path = %path.display(), "No persisted model, bootstrapping");
            }
            Err(e) => {
                warn!(
                    path = %store.path().display(),
                    error = %e,
                    "Persisted model unusable, bootstrapping"
                );
            }
        }

        let model = match bootstrap_model(settings) {
            Ok(model) => model,
            Err(e) => {
                error!(error = %e, "Bootstrap training failed, scorer stays untrained");
                return Self::untrained(settings.tiers.clone());
            }
        };

        if let Err(e) = store.save(&model) {
            error!(
                path = %store.path().display(),
                error = %e,
                "Failed to persist bootstrapped model"
            );
        }

        Self::from_state(model, ModelOrigin::Bootstrapped, settings.tiers.clone())
    }

    /// Score a record, using the current time for missing timestamps
    pub fn predict(&self, record: &TransactionRecord) -> ScoreOutcome {
        self.predict_at(record, Utc::now())
    }

    /// Score a record, using `now` for missing timestamps
    pub fn predict_at(&self, record: &TransactionRecord, now: DateTime<Utc>) -> ScoreOutcome {
        let ScorerState::Trained { model, .. } = &self.state else {
            return ScoreOutcome::Degraded {
                error: ScoringError::ModelUnavailable,
            };
        };

        let probability = model
            .features
            .transform_one(record, now)
            .map_err(|e| e.to_string())
            .and_then(|row| model.classifier.predict_proba(&row).map_err(|e| e.to_string()));

        match probability {
            Ok(probability) => ScoreOutcome::Scored {
                probability,
                tier: RiskTier::from_probability(probability, &self.tiers),
            },
            Err(reason) => {
                warn!(
                    transaction_id = %record.transaction_id,
                    error = %reason,
                    "Scoring degraded"
                );
                ScoreOutcome::Degraded {
                    error: ScoringError::FeatureTransform(reason),
                }
            }
        }
    }

    pub fn is_trained(&self) -> bool {
        matches!(self.state, ScorerState::Trained { .. })
    }

    pub fn origin(&self) -> Option<ModelOrigin> {
        match &self.state {
            ScorerState::Trained { origin, .. } => Some(*origin),
            ScorerState::Untrained => None,
        }
    }

    pub fn model(&self) -> Option<&ModelState> {
        match &self.state {
            ScorerState::Trained { model, .. } => Some(model.as_ref()),
            ScorerState::Untrained => None,
        }
    }

    pub fn tiers(&self) -> &TierThresholds {
        &self.tiers
    }
}

/// Train a fresh model on synthetic data
pub fn bootstrap_model(settings: &ScorerSettings) -> Result<ModelState, BootstrapError> {
    let started = Instant::now();

    let data = synthetic::generate(settings.bootstrap_samples, settings.forest.seed)?;
    let (features, matrix) = FeatureExtractor::fit_transform(&data.records, Utc::now())?;

    let mut classifier = RandomForestClassifier::new(settings.forest.clone());
    classifier.fit(&matrix, &data.labels)?;

    info!(
        samples = data.len(),
        fraud_samples = data.fraud_count(),
        trees = classifier.n_trees(),
        max_depth = classifier.max_tree_depth(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Bootstrap model trained"
    );
    debug!(feature_names = ?features.feature_names(), "Feature columns");

    Ok(ModelState::trained(classifier, features))
}
