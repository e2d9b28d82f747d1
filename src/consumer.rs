//! NATS message consumer for incoming transactions

use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

use crate::types::transaction::TransactionRecord;

/// Consumer for receiving transactions from NATS
pub struct TransactionConsumer {
    client: Client,
    subject: String,
}

impl TransactionConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the transaction subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self
            .client
            .subscribe(self.subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", self.subject))?;
        info!(subject = %self.subject, "Subscribed to transaction subject");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Decode and validate a JSON transaction payload
pub fn decode_transaction(payload: &[u8]) -> Result<TransactionRecord> {
    let record: TransactionRecord =
        serde_json::from_slice(payload).context("Malformed transaction payload")?;
    record
        .validate()
        .with_context(|| format!("Invalid transaction {}", record.transaction_id))?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::{MerchantCategory, TransactionType};

    #[test]
    fn test_decode_minimal_payload() {
        let payload = br#"{
            "amount": 250.0,
            "sender_id": "alice@upi",
            "receiver_id": "store@upi",
            "transaction_type": "P2M"
        }"#;

        let record = decode_transaction(payload).unwrap();
        assert_eq!(record.transaction_type, TransactionType::P2M);
        assert_eq!(record.merchant_category, MerchantCategory::Other);
        assert!(record.timestamp.is_none());
        assert!(!record.transaction_id.is_empty());
    }

    #[test]
    fn test_decode_full_payload() {
        let payload = br#"{
            "transaction_id": "tx-42",
            "amount": 99.5,
            "sender_id": "alice@upi",
            "receiver_id": "cafe@upi",
            "transaction_type": "P2B",
            "location": "Pune",
            "device_id": "android-7f3a",
            "merchant_category": "FOOD",
            "timestamp": "2024-02-10T08:15:00Z"
        }"#;

        let record = decode_transaction(payload).unwrap();
        assert_eq!(record.transaction_id, "tx-42");
        assert_eq!(record.merchant_category, MerchantCategory::Food);
        assert_eq!(record.location.as_deref(), Some("Pune"));
        assert!(record.timestamp.is_some());
    }

    #[test]
    fn test_rejects_malformed_and_invalid() {
        assert!(decode_transaction(b"not json").is_err());

        let unknown_type = br#"{"amount": 10.0, "sender_id": "alice@upi",
            "receiver_id": "bob@upi", "transaction_type": "WIRE"}"#;
        assert!(decode_transaction(unknown_type).is_err());

        let too_large = br#"{"amount": 2000000.0, "sender_id": "alice@upi",
            "receiver_id": "bob@upi", "transaction_type": "P2P"}"#;
        assert!(decode_transaction(too_large).is_err());
    }
}
