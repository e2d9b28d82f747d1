//! Feature extraction for fraud scoring.
//!
//! Turns transaction records into the fixed-width matrix the classifier was
//! trained on. Fitting and transforming are separate operations: encoders and
//! the scaler are learned once from the training batch and only applied
//! afterwards, so inference can never shift feature semantics.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::preprocessing::{CategoricalEncoders, LabelEncoder, StandardScaler};
use crate::types::transaction::TransactionRecord;

/// Canonical feature order shared by training and inference
pub const FEATURE_COLUMNS: [&str; 6] = [
    "amount",
    "hour",
    "day_of_week",
    "transaction_type_encoded",
    "amount_percentile",
    "merchant_category_encoded",
];

/// Number of features produced per record
pub const FEATURE_COUNT: usize = FEATURE_COLUMNS.len();

/// Categorical source columns with a fitted encoder
pub const TRANSACTION_TYPE_COLUMN: &str = "transaction_type";
pub const MERCHANT_CATEGORY_COLUMN: &str = "merchant_category";

/// Quantile bins used for the amount percentile feature
pub const AMOUNT_BINS: usize = 10;

/// Row-major feature matrix, one row per record
pub type FeatureMatrix = Vec<Vec<f64>>;

/// Errors raised while building features
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("cannot fit on an empty batch")]
    EmptyBatch,

    #[error("no fitted encoder for column '{0}'")]
    MissingEncoder(String),

    #[error("row {row} has {found} features, expected {expected}")]
    WidthMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("feature '{column}' is not finite after scaling")]
    NonFinite { column: &'static str },
}

/// Fitted feature pipeline: categorical encoders followed by standard scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureExtractor {
    encoders: CategoricalEncoders,
    scaler: StandardScaler,
}

impl FeatureExtractor {
    /// Fit encoders and scaler on a training batch
    pub fn fit(records: &[TransactionRecord], now: DateTime<Utc>) -> Result<Self, FeatureError> {
        Self::fit_transform(records, now).map(|(extractor, _)| extractor)
    }

    /// Fit on a training batch and return its scaled feature matrix
    pub fn fit_transform(
        records: &[TransactionRecord],
        now: DateTime<Utc>,
    ) -> Result<(Self, FeatureMatrix), FeatureError> {
        if records.is_empty() {
            return Err(FeatureError::EmptyBatch);
        }

        let mut encoders = CategoricalEncoders::new();
        encoders.insert(
            TRANSACTION_TYPE_COLUMN,
            LabelEncoder::fit(records.iter().map(|r| r.transaction_type.as_str())),
        );
        encoders.insert(
            MERCHANT_CATEGORY_COLUMN,
            LabelEncoder::fit(records.iter().map(|r| r.merchant_category.as_str())),
        );

        let raw = raw_features(records, &encoders, now)?;
        let scaler = StandardScaler::fit(&raw)?;

        let extractor = Self { encoders, scaler };
        let matrix = extractor.scale(raw)?;
        Ok((extractor, matrix))
    }

    /// Transform a batch with the fitted encoders and scaler.
    ///
    /// The amount percentile is computed relative to `records`, so a single
    /// record always lands in percentile 0.
    pub fn transform(
        &self,
        records: &[TransactionRecord],
        now: DateTime<Utc>,
    ) -> Result<FeatureMatrix, FeatureError> {
        let raw = raw_features(records, &self.encoders, now)?;
        self.scale(raw)
    }

    /// Transform a single record
    pub fn transform_one(
        &self,
        record: &TransactionRecord,
        now: DateTime<Utc>,
    ) -> Result<Vec<f64>, FeatureError> {
        self.transform(std::slice::from_ref(record), now)?
            .pop()
            .ok_or(FeatureError::EmptyBatch)
    }

    fn scale(&self, raw: FeatureMatrix) -> Result<FeatureMatrix, FeatureError> {
        raw.iter()
            .map(|row| -> Result<Vec<f64>, FeatureError> {
                let scaled = self.scaler.transform_row(row)?;
                if let Some(idx) = scaled.iter().position(|v| !v.is_finite()) {
                    return Err(FeatureError::NonFinite {
                        column: FEATURE_COLUMNS[idx],
                    });
                }
                Ok(scaled)
            })
            .collect()
    }

    pub fn encoders(&self) -> &CategoricalEncoders {
        &self.encoders
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in matrix order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        FEATURE_COLUMNS.to_vec()
    }
}

/// Unscaled features in canonical order; missing (NaN) values become 0
fn raw_features(
    records: &[TransactionRecord],
    encoders: &CategoricalEncoders,
    now: DateTime<Utc>,
) -> Result<FeatureMatrix, FeatureError> {
    let amounts: Vec<f64> = records.iter().map(|r| r.amount).collect();
    let percentiles = amount_percentiles(&amounts);

    records
        .iter()
        .zip(percentiles)
        .map(|(record, percentile)| -> Result<Vec<f64>, FeatureError> {
            let timestamp = record.effective_timestamp(now);

            let row = [
                record.amount,
                timestamp.hour() as f64,
                timestamp.weekday().num_days_from_monday() as f64,
                encoders.encode(TRANSACTION_TYPE_COLUMN, record.transaction_type.as_str())?,
                percentile as f64,
                encoders.encode(MERCHANT_CATEGORY_COLUMN, record.merchant_category.as_str())?,
            ];

            Ok(row
                .into_iter()
                .map(|v| if v.is_nan() { 0.0 } else { v })
                .collect())
        })
        .collect()
}

/// Quantile bin (0..AMOUNT_BINS) of each amount within its own batch.
///
/// Bin edges are linearly interpolated quantiles of the batch; duplicate edges
/// collapse, the lowest edge is inclusive. Batches without two distinct edges
/// (including single records) put everything in bin 0.
pub fn amount_percentiles(amounts: &[f64]) -> Vec<usize> {
    let mut sorted: Vec<f64> = amounts.iter().copied().filter(|a| a.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    if sorted.is_empty() {
        return vec![0; amounts.len()];
    }

    let mut edges: Vec<f64> = (0..=AMOUNT_BINS)
        .map(|i| quantile(&sorted, i as f64 / AMOUNT_BINS as f64))
        .collect();
    edges.dedup();

    if edges.len() < 2 {
        return vec![0; amounts.len()];
    }

    let last_bin = edges.len() - 2;
    amounts
        .iter()
        .map(|&amount| {
            if !amount.is_finite() {
                return 0;
            }
            edges[1..]
                .iter()
                .position(|&edge| amount <= edge)
                .unwrap_or(last_bin)
        })
        .collect()
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::{MerchantCategory, TransactionType};
    use chrono::TimeZone;

    fn record(amount: f64, tx_type: TransactionType, category: MerchantCategory) -> TransactionRecord {
        TransactionRecord::new(amount, "sender@upi", "receiver@upi", tx_type)
            .with_merchant_category(category)
            .with_timestamp(Utc.with_ymd_and_hms(2024, 3, 14, 15, 30, 0).unwrap())
    }

    fn training_batch() -> Vec<TransactionRecord> {
        (1..=20)
            .map(|i| {
                let tx_type = TransactionType::ALL[i % 2];
                let category = MerchantCategory::ALL[i % 3];
                record(i as f64 * 10.0, tx_type, category)
            })
            .collect()
    }

    #[test]
    fn test_feature_count() {
        let (extractor, matrix) = FeatureExtractor::fit_transform(&training_batch(), Utc::now()).unwrap();

        assert_eq!(extractor.feature_count(), 6);
        assert_eq!(extractor.feature_names().len(), 6);
        assert_eq!(matrix.len(), 20);
        assert!(matrix.iter().all(|row| row.len() == FEATURE_COUNT));
    }

    #[test]
    fn test_time_features_from_timestamp() {
        let encoders = {
            let mut e = CategoricalEncoders::new();
            e.insert(TRANSACTION_TYPE_COLUMN, LabelEncoder::fit(["P2P"]));
            e.insert(MERCHANT_CATEGORY_COLUMN, LabelEncoder::fit(["OTHER"]));
            e
        };
        // 2024-03-14 is a Thursday
        let rows = raw_features(
            &[record(42.0, TransactionType::P2P, MerchantCategory::Other)],
            &encoders,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(rows[0][0], 42.0);
        assert_eq!(rows[0][1], 15.0);
        assert_eq!(rows[0][2], 3.0);
    }

    #[test]
    fn test_missing_timestamp_uses_evaluation_time() {
        let mut encoders = CategoricalEncoders::new();
        encoders.insert(TRANSACTION_TYPE_COLUMN, LabelEncoder::fit(["P2P"]));
        encoders.insert(MERCHANT_CATEGORY_COLUMN, LabelEncoder::fit(["OTHER"]));

        let now = Utc.with_ymd_and_hms(2024, 3, 17, 2, 0, 0).unwrap();
        let record = TransactionRecord::new(5.0, "sender@upi", "receiver@upi", TransactionType::P2P);
        let rows = raw_features(&[record], &encoders, now).unwrap();

        assert_eq!(rows[0][1], 2.0);
        // Sunday
        assert_eq!(rows[0][2], 6.0);
    }

    #[test]
    fn test_amount_percentiles_within_batch() {
        let amounts: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        assert_eq!(amount_percentiles(&amounts), (0..10).collect::<Vec<_>>());

        assert_eq!(amount_percentiles(&[500.0]), vec![0]);
        assert_eq!(amount_percentiles(&[7.0, 7.0, 7.0]), vec![0, 0, 0]);
        assert_eq!(amount_percentiles(&[1.0, 100.0]), vec![0, 9]);
    }

    #[test]
    fn test_unseen_categories_map_to_fallback() {
        let batch = vec![
            record(10.0, TransactionType::P2P, MerchantCategory::Food),
            record(20.0, TransactionType::P2M, MerchantCategory::Retail),
        ];
        let extractor = FeatureExtractor::fit(&batch, Utc::now()).unwrap();

        let unseen = record(15.0, TransactionType::P2B, MerchantCategory::Travel);
        let raw = raw_features(&[unseen.clone()], extractor.encoders(), Utc::now()).unwrap();
        assert_eq!(raw[0][3], 0.0);
        assert_eq!(raw[0][5], 0.0);

        // and the scaled row is still produced
        let row = extractor.transform_one(&unseen, Utc::now()).unwrap();
        assert_eq!(row.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_transform_does_not_refit() {
        let batch = training_batch();
        let extractor = FeatureExtractor::fit(&batch, Utc::now()).unwrap();
        let before = extractor.clone();

        let other = vec![record(1_000_000.0, TransactionType::P2B, MerchantCategory::Fuel)];
        extractor.transform(&other, Utc::now()).unwrap();

        assert_eq!(extractor, before);
        let mean_amount = extractor.scaler().mean()[0];
        assert!((mean_amount - 105.0).abs() < 1e-9);
    }

    #[test]
    fn test_nan_filled_and_infinite_rejected() {
        let extractor = FeatureExtractor::fit(&training_batch(), Utc::now()).unwrap();

        let nan = record(f64::NAN, TransactionType::P2P, MerchantCategory::Food);
        let row = extractor.transform_one(&nan, Utc::now()).unwrap();
        let expected = (0.0 - extractor.scaler().mean()[0]) / extractor.scaler().scale()[0];
        assert!((row[0] - expected).abs() < 1e-12);

        let inf = record(f64::INFINITY, TransactionType::P2P, MerchantCategory::Food);
        assert_eq!(
            extractor.transform_one(&inf, Utc::now()),
            Err(FeatureError::NonFinite { column: "amount" })
        );
    }

    #[test]
    fn test_fit_rejects_empty_batch() {
        assert_eq!(
            FeatureExtractor::fit(&[], Utc::now()),
            Err(FeatureError::EmptyBatch)
        );
    }
}
