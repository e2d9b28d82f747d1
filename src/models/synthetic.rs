//! Synthetic bootstrap data for the initial model
//!
//! Used only when no persisted model exists. Labels follow a fixed rule so the
//! bootstrapped forest learns the same risk patterns the reason rules report.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal};
use thiserror::Error;

use crate::explain::{is_unusual_hour, HIGH_AMOUNT_THRESHOLD, LOW_AMOUNT_THRESHOLD};
use crate::types::transaction::{MerchantCategory, TransactionRecord, TransactionType};

/// Default number of synthetic transactions
pub const DEFAULT_SAMPLE_COUNT: usize = 1000;

/// Location and scale of ln(amount)
const AMOUNT_LOG_MEAN: f64 = 3.0;
const AMOUNT_LOG_STD: f64 = 1.5;

/// Share of transactions labelled fraudulent at random
const RANDOM_FRAUD_RATE: f64 = 0.05;

/// 2024-01-01T00:00:00Z, a Monday
const MONDAY_EPOCH_SECS: i64 = 1_704_067_200;

/// Errors raised while generating synthetic data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntheticError {
    #[error("requested zero synthetic samples")]
    NoSamples,

    #[error("invalid amount distribution: {0}")]
    AmountDistribution(String),

    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(i64),
}

/// Synthetic records with their fraud labels
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub records: Vec<TransactionRecord>,
    pub labels: Vec<u8>,
}

impl SyntheticDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn fraud_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }
}

/// Fixed labelling rule applied before the random flag
pub fn is_suspicious(amount: f64, hour: u32) -> bool {
    amount > HIGH_AMOUNT_THRESHOLD || is_unusual_hour(hour) || amount < LOW_AMOUNT_THRESHOLD
}

/// Generate `n_samples` labelled transactions from a seeded RNG
pub fn generate(n_samples: usize, seed: u64) -> Result<SyntheticDataset, SyntheticError> {
    if n_samples == 0 {
        return Err(SyntheticError::NoSamples);
    }

    let amounts = LogNormal::new(AMOUNT_LOG_MEAN, AMOUNT_LOG_STD)
        .map_err(|e| SyntheticError::AmountDistribution(e.to_string()))?;
    let week_start = DateTime::<Utc>::from_timestamp(MONDAY_EPOCH_SECS, 0)
        .ok_or(SyntheticError::TimestampOutOfRange(MONDAY_EPOCH_SECS))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut records = Vec::with_capacity(n_samples);
    let mut hours = Vec::with_capacity(n_samples);

    for i in 0..n_samples {
        let amount = amounts.sample(&mut rng);
        let hour: u32 = rng.gen_range(0..24);
        let day: i64 = rng.gen_range(0..7);
        let transaction_type = TransactionType::ALL[rng.gen_range(0..TransactionType::ALL.len())];
        let category = MerchantCategory::ALL[rng.gen_range(0..MerchantCategory::ALL.len())];

        let timestamp = week_start + Duration::days(day) + Duration::hours(i64::from(hour));

        let mut record = TransactionRecord::new(
            amount,
            format!("sender_{:04}@upi", i),
            format!("receiver_{:04}@upi", i),
            transaction_type,
        )
        .with_merchant_category(category)
        .with_timestamp(timestamp);
        record.transaction_id = format!("synthetic_{:04}", i);

        records.push(record);
        hours.push(hour);
    }

    let labels = records
        .iter()
        .zip(&hours)
        .map(|(record, &hour)| {
            let random_flag = rng.gen::<f64>() < RANDOM_FRAUD_RATE;
            u8::from(is_suspicious(record.amount, hour) || random_flag)
        })
        .collect();

    Ok(SyntheticDataset { records, labels })
}
