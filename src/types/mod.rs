//! Type definitions for the fraud scoring pipeline

pub mod alert;
pub mod transaction;

pub use alert::{FraudAlert, RiskTier, TierThresholds};
pub use transaction::{MerchantCategory, TransactionRecord, TransactionType, ValidationError};
