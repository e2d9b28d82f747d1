//! Persisted model state
//!
//! The whole state is stored as one bincode blob. Writes go to a sibling
//! temporary file that is renamed into place, so a crash mid-save never leaves
//! a truncated model behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::feature_extractor::{
    FeatureExtractor, FEATURE_COLUMNS, MERCHANT_CATEGORY_COLUMN, TRANSACTION_TYPE_COLUMN,
};
use crate::models::forest::RandomForestClassifier;

/// Bumped whenever the blob layout changes
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Default location of the model file
pub const DEFAULT_MODEL_PATH: &str = "fraud_model.bin";

/// Upper bound on bytes read when decoding a model file
const MAX_MODEL_BYTES: usize = 64 * 1024 * 1024;

/// Errors raised while saving or loading the model file
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),

    #[error("model file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode model state: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("failed to decode model state: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("invalid model state: {0}")]
    Invalid(String),
}

/// Everything needed to score records after a restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub format_version: u32,
    pub trained_at: DateTime<Utc>,
    pub classifier: RandomForestClassifier,
    pub features: FeatureExtractor,
    pub feature_columns: Vec<String>,
    pub is_trained: bool,
}

impl ModelState {
    /// Wrap a fitted classifier and feature builder
    pub fn trained(classifier: RandomForestClassifier, features: FeatureExtractor) -> Self {
        Self {
            format_version: MODEL_FORMAT_VERSION,
            trained_at: Utc::now(),
            classifier,
            features,
            feature_columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            is_trained: true,
        }
    }

    /// Check that a state is usable by this build
    pub fn validate(&self) -> Result<(), PersistenceError> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(PersistenceError::Invalid(format!(
                "format version {} (expected {})",
                self.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if !self.is_trained || !self.classifier.is_fitted() {
            return Err(PersistenceError::Invalid("model is not trained".to_string()));
        }
        if self.feature_columns.iter().map(String::as_str).ne(FEATURE_COLUMNS.iter().copied()) {
            return Err(PersistenceError::Invalid(format!(
                "feature columns {:?} do not match {:?}",
                self.feature_columns, FEATURE_COLUMNS
            )));
        }
        if self.classifier.n_features() != FEATURE_COLUMNS.len()
            || self.features.scaler().n_features() != FEATURE_COLUMNS.len()
        {
            return Err(PersistenceError::Invalid(format!(
                "classifier expects {} features, scaler {}, extractor produces {}",
                self.classifier.n_features(),
                self.features.scaler().n_features(),
                FEATURE_COLUMNS.len()
            )));
        }
        let scaler = self.features.scaler();
        if scaler.scale().len() != scaler.mean().len() {
            return Err(PersistenceError::Invalid(format!(
                "scaler has {} means but {} scales",
                scaler.mean().len(),
                scaler.scale().len()
            )));
        }
        for column in [TRANSACTION_TYPE_COLUMN, MERCHANT_CATEGORY_COLUMN] {
            if !self.features.encoders().contains(column) {
                return Err(PersistenceError::Invalid(format!(
                    "no fitted encoder for column '{}'",
                    column
                )));
            }
        }
        Ok(())
    }
}

fn blob_config() -> impl bincode::config::Config {
    bincode::config::standard().with_limit::<MAX_MODEL_BYTES>()
}

fn write_blob(path: &Path, state: &ModelState) -> Result<(), PersistenceError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    bincode::serde::encode_into_std_write(state, &mut writer, blob_config())?;
    writer.flush()?;
    Ok(())
}

/// Reads and writes [`ModelState`] at a fixed path
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the state, replacing any existing file
    pub fn save(&self, state: &ModelState) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("bin.tmp");
        let written = write_blob(&tmp_path, state)
            .and_then(|()| fs::rename(&tmp_path, &self.path).map_err(PersistenceError::from));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        info!(
            path = %self.path.display(),
            trees = state.classifier.n_trees(),
            "Model state saved"
        );
        Ok(())
    }

    /// Read and validate the state
    pub fn load(&self) -> Result<ModelState, PersistenceError> {
        if !self.exists() {
            return Err(PersistenceError::NotFound(self.path.clone()));
        }

        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let state: ModelState = bincode::serde::decode_from_std_read(&mut reader, blob_config())?;
        state.validate()?;

        debug!(
            path = %self.path.display(),
            trained_at = %state.trained_at,
            "Model state decoded"
        );
        Ok(state)
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_PATH)
    }
}
