//! Fraud Scoring Pipeline Library
//!
//! Scores UPI-style payment transactions for fraud risk with a random forest
//! trained on synthetic data, explains each score with rule-based reasons, and
//! runs as a NATS worker that publishes assessments and alerts.

pub mod assessment;
pub mod config;
pub mod consumer;
pub mod explain;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod preprocessing;
pub mod producer;
pub mod types;

pub use assessment::Assessment;
pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use feature_extractor::FeatureExtractor;
pub use models::{FraudScorer, ScoreOutcome};
pub use producer::AssessmentProducer;
pub use types::{alert::FraudAlert, transaction::TransactionRecord};
