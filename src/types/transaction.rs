//! Transaction record scored by the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Smallest amount a caller may submit
pub const MIN_AMOUNT: f64 = 0.01;
/// Largest amount a caller may submit
pub const MAX_AMOUNT: f64 = 1_000_000.0;

/// Transfer direction of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Person to person
    P2P,
    /// Person to merchant
    P2M,
    /// Person to business
    P2B,
}

impl TransactionType {
    pub const ALL: [TransactionType; 3] =
        [TransactionType::P2P, TransactionType::P2M, TransactionType::P2B];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::P2P => "P2P",
            TransactionType::P2M => "P2M",
            TransactionType::P2B => "P2B",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merchant category reported with the payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MerchantCategory {
    Food,
    Retail,
    Fuel,
    Healthcare,
    Education,
    Entertainment,
    Travel,
    Utilities,
    #[default]
    Other,
}

impl MerchantCategory {
    pub const ALL: [MerchantCategory; 9] = [
        MerchantCategory::Food,
        MerchantCategory::Retail,
        MerchantCategory::Fuel,
        MerchantCategory::Healthcare,
        MerchantCategory::Education,
        MerchantCategory::Entertainment,
        MerchantCategory::Travel,
        MerchantCategory::Utilities,
        MerchantCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MerchantCategory::Food => "FOOD",
            MerchantCategory::Retail => "RETAIL",
            MerchantCategory::Fuel => "FUEL",
            MerchantCategory::Healthcare => "HEALTHCARE",
            MerchantCategory::Education => "EDUCATION",
            MerchantCategory::Entertainment => "ENTERTAINMENT",
            MerchantCategory::Travel => "TRAVEL",
            MerchantCategory::Utilities => "UTILITIES",
            MerchantCategory::Other => "OTHER",
        }
    }
}

impl fmt::Display for MerchantCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a record is rejected before scoring
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("amount {0} is outside [0.01, 1000000]")]
    AmountOutOfRange(f64),

    #[error("{field} must be between {min} and {max} characters, got {len}")]
    FieldLength {
        field: &'static str,
        min: usize,
        max: usize,
        len: usize,
    },
}

/// A payment to be scored for fraud risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Caller-side identifier, generated when the producer omits it
    #[serde(default = "new_transaction_id")]
    pub transaction_id: String,

    /// Payment amount (positive)
    pub amount: f64,

    /// Payer identifier (UPI id)
    pub sender_id: String,

    /// Payee identifier (UPI id)
    pub receiver_id: String,

    pub transaction_type: TransactionType,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(default)]
    pub merchant_category: MerchantCategory,

    /// Event time; scoring falls back to the evaluation time when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

fn new_transaction_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl TransactionRecord {
    /// Create a record with the required fields; optional fields stay empty
    pub fn new(
        amount: f64,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        transaction_type: TransactionType,
    ) -> Self {
        Self {
            transaction_id: new_transaction_id(),
            amount,
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            transaction_type,
            location: None,
            device_id: None,
            merchant_category: MerchantCategory::default(),
            timestamp: None,
        }
    }

    pub fn with_merchant_category(mut self, category: MerchantCategory) -> Self {
        self.merchant_category = category;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Timestamp used for time-derived features
    pub fn effective_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.timestamp.unwrap_or(now)
    }

    /// Check the bounds the submission form enforces
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(MIN_AMOUNT..=MAX_AMOUNT).contains(&self.amount) {
            return Err(ValidationError::AmountOutOfRange(self.amount));
        }

        check_length("sender_id", &self.sender_id, 5, 50)?;
        check_length("receiver_id", &self.receiver_id, 5, 50)?;
        if let Some(location) = &self.location {
            check_length("location", location, 0, 100)?;
        }
        if let Some(device_id) = &self.device_id {
            check_length("device_id", device_id, 0, 100)?;
        }

        Ok(())
    }
}

fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::FieldLength {
            field,
            min,
            max,
            len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserialization_defaults() {
        let json = r#"{
            "amount": 250.0,
            "sender_id": "alice@upi",
            "receiver_id": "store@upi",
            "transaction_type": "P2M"
        }"#;

        let record: TransactionRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.transaction_type, TransactionType::P2M);
        assert_eq!(record.merchant_category, MerchantCategory::Other);
        assert!(record.timestamp.is_none());
        assert!(record.location.is_none());
        assert!(!record.transaction_id.is_empty());
    }

    #[test]
    fn test_category_wire_names() {
        let json = serde_json::to_string(&MerchantCategory::Healthcare).unwrap();
        assert_eq!(json, "\"HEALTHCARE\"");
        assert_eq!(MerchantCategory::Healthcare.as_str(), "HEALTHCARE");
        assert_eq!(TransactionType::P2B.to_string(), "P2B");
    }

    #[test]
    fn test_validate_bounds() {
        let record = TransactionRecord::new(500.0, "alice@upi", "bobby@upi", TransactionType::P2P);
        assert!(record.validate().is_ok());

        let too_small = TransactionRecord { amount: 0.0, ..record.clone() };
        assert_eq!(
            too_small.validate(),
            Err(ValidationError::AmountOutOfRange(0.0))
        );

        let short_sender = TransactionRecord {
            sender_id: "al".to_string(),
            ..record.clone()
        };
        assert!(matches!(
            short_sender.validate(),
            Err(ValidationError::FieldLength { field: "sender_id", .. })
        ));

        let long_device = record.with_device_id("d".repeat(101));
        assert!(long_device.validate().is_err());
    }

    #[test]
    fn test_effective_timestamp_falls_back_to_now() {
        let now = Utc::now();
        let record = TransactionRecord::new(10.0, "alice@upi", "bobby@upi", TransactionType::P2P);
        assert_eq!(record.effective_timestamp(now), now);

        let earlier = now - chrono::Duration::hours(3);
        let record = record.with_timestamp(earlier);
        assert_eq!(record.effective_timestamp(now), earlier);
    }
}
