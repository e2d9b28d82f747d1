//! Risk tiers and fraud alert data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert type recorded for transactions above the alert threshold
pub const HIGH_RISK_ALERT_TYPE: &str = "HIGH_RISK_TRANSACTION";

/// Risk tier derived from a fraud probability
///
/// `Unknown` and `Untrained` are only produced by degraded scoring and let
/// callers tell a neutral fallback apart from a genuine low-risk prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Unknown,
    Untrained,
}

impl RiskTier {
    /// Determine risk tier from probability and thresholds
    pub fn from_probability(probability: f64, thresholds: &TierThresholds) -> Self {
        if probability > thresholds.high {
            RiskTier::High
        } else if probability > thresholds.medium {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    /// Whether the tier came from a usable model prediction
    pub fn is_scored(&self) -> bool {
        matches!(self, RiskTier::Low | RiskTier::Medium | RiskTier::High)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
            RiskTier::Unknown => "UNKNOWN",
            RiskTier::Untrained => "UNTRAINED",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability cut-offs for the scored tiers (strictly greater than)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            medium: 0.5,
            high: 0.8,
        }
    }
}

/// Alert raised when a transaction's fraud probability exceeds the alert threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    /// Unique alert identifier
    pub alert_id: String,

    /// Associated transaction ID
    pub transaction_id: String,

    pub alert_type: String,

    /// Tier of the prediction that raised the alert
    pub severity: RiskTier,

    /// Fraud probability (0.0 - 1.0)
    pub risk_score: f64,

    pub message: String,

    pub reasons: Vec<String>,

    /// Alert generation timestamp
    pub timestamp: DateTime<Utc>,

    pub is_resolved: bool,
}

impl FraudAlert {
    /// Create a high-risk alert; the message lists the reasons in order
    pub fn high_risk(
        transaction_id: String,
        risk_score: f64,
        severity: RiskTier,
        reasons: Vec<String>,
    ) -> Self {
        let message = format!(
            "High-risk transaction detected. Reasons: {}",
            reasons.join(", ")
        );

        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            transaction_id,
            alert_type: HIGH_RISK_ALERT_TYPE.to_string(),
            severity,
            risk_score,
            message,
            reasons,
            timestamp: Utc::now(),
            is_resolved: false,
        }
    }

    /// Mark the alert as handled by an analyst
    pub fn resolve(&mut self) {
        self.is_resolved = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_tier_from_probability() {
        let thresholds = TierThresholds::default();

        assert_eq!(RiskTier::from_probability(0.1, &thresholds), RiskTier::Low);
        assert_eq!(RiskTier::from_probability(0.5, &thresholds), RiskTier::Low);
        assert_eq!(RiskTier::from_probability(0.51, &thresholds), RiskTier::Medium);
        assert_eq!(RiskTier::from_probability(0.8, &thresholds), RiskTier::Medium);
        assert_eq!(RiskTier::from_probability(0.81, &thresholds), RiskTier::High);
        assert_eq!(RiskTier::from_probability(1.0, &thresholds), RiskTier::High);
    }

    #[test]
    fn test_degraded_tiers_are_not_scored() {
        assert!(RiskTier::Low.is_scored());
        assert!(!RiskTier::Unknown.is_scored());
        assert!(!RiskTier::Untrained.is_scored());
    }

    #[test]
    fn test_fraud_alert_message_and_serialization() {
        let mut alert = FraudAlert::high_risk(
            "tx_123".to_string(),
            0.91,
            RiskTier::High,
            vec![
                "very high transaction amount".to_string(),
                "multiple risk factors detected".to_string(),
            ],
        );

        assert_eq!(alert.alert_type, HIGH_RISK_ALERT_TYPE);
        assert_eq!(
            alert.message,
            "High-risk transaction detected. Reasons: very high transaction amount, multiple risk factors detected"
        );
        assert!(!alert.is_resolved);

        alert.resolve();
        let json = serde_json::to_string(&alert).unwrap();
        assert!(json.contains("\"severity\":\"HIGH\""));

        let deserialized: FraudAlert = serde_json::from_str(&json).unwrap();
        assert_eq!(alert.transaction_id, deserialized.transaction_id);
        assert_eq!(alert.severity, deserialized.severity);
        assert!(deserialized.is_resolved);
    }
}
