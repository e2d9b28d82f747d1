//! Fraud model: forest, persisted state, bootstrap data and the scorer

pub mod forest;
pub mod scorer;
pub mod state;
pub mod synthetic;

pub use forest::{ForestConfig, RandomForestClassifier};
pub use scorer::{FraudScorer, ModelOrigin, ScoreOutcome, ScorerSettings, ScoringError};
pub use state::{ModelState, ModelStore, PersistenceError};
