//! Assessment of a single transaction: score, reasons, fraud flag and alert

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DetectionConfig;
use crate::explain;
use crate::models::scorer::{FraudScorer, ScoreOutcome};
use crate::types::alert::FraudAlert;
use crate::types::transaction::TransactionRecord;

/// Everything the caller needs to persist or publish for one transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub transaction_id: String,
    pub outcome: ScoreOutcome,
    pub reasons: Vec<String>,
    /// Probability above the fraud threshold
    pub is_fraud: bool,
    /// Raised when probability exceeds the alert threshold
    pub alert: Option<FraudAlert>,
    pub assessed_at: DateTime<Utc>,
}

impl Assessment {
    pub fn probability(&self) -> f64 {
        self.outcome.probability()
    }

    pub fn has_alert(&self) -> bool {
        self.alert.is_some()
    }
}

impl FraudScorer {
    /// Score, explain and flag a record at the current time
    pub fn assess(&self, record: &TransactionRecord, detection: &DetectionConfig) -> Assessment {
        self.assess_at(record, detection, Utc::now())
    }

    /// Score, explain and flag a record, using `now` for a missing timestamp
    pub fn assess_at(
        &self,
        record: &TransactionRecord,
        detection: &DetectionConfig,
        now: DateTime<Utc>,
    ) -> Assessment {
        let outcome = self.predict_at(record, now);
        let probability = outcome.probability();
        let reasons = explain::explain_at(record, probability, now);

        let alert = (probability > detection.alert_threshold).then(|| {
            FraudAlert::high_risk(
                record.transaction_id.clone(),
                probability,
                outcome.tier(),
                reasons.clone(),
            )
        });

        Assessment {
            transaction_id: record.transaction_id.clone(),
            is_fraud: probability > detection.fraud_threshold,
            outcome,
            reasons,
            alert,
            assessed_at: now,
        }
    }
}
