//! NATS message producer for assessments and fraud alerts

use crate::assessment::Assessment;
use crate::types::alert::FraudAlert;
use anyhow::{Context, Result};
use async_nats::Client;
use tracing::debug;

/// Publishes assessments and alerts to their subjects
#[derive(Clone)]
pub struct AssessmentProducer {
    client: Client,
    score_subject: String,
    alert_subject: String,
}

impl AssessmentProducer {
    pub fn new(client: Client, score_subject: &str, alert_subject: &str) -> Self {
        Self {
            client,
            score_subject: score_subject.to_string(),
            alert_subject: alert_subject.to_string(),
        }
    }

    /// Publish an assessment, followed by its alert if one was raised
    pub async fn publish(&self, assessment: &Assessment) -> Result<()> {
        let payload = serde_json::to_vec(assessment)?;
        self.client
            .publish(self.score_subject.clone(), payload.into())
            .await
            .with_context(|| format!("Failed to publish to {}", self.score_subject))?;

        debug!(
            transaction_id = %assessment.transaction_id,
            risk_score = assessment.probability(),
            is_fraud = assessment.is_fraud,
            "Published assessment"
        );

        if let Some(alert) = &assessment.alert {
            self.publish_alert(alert).await?;
        }
        Ok(())
    }

    /// Publish a fraud alert
    pub async fn publish_alert(&self, alert: &FraudAlert) -> Result<()> {
        let payload = serde_json::to_vec(alert)?;
        self.client
            .publish(self.alert_subject.clone(), payload.into())
            .await
            .with_context(|| format!("Failed to publish to {}", self.alert_subject))?;

        debug!(
            alert_id = %alert.alert_id,
            transaction_id = %alert.transaction_id,
            severity = %alert.severity,
            risk_score = alert.risk_score,
            "Published fraud alert"
        );
        Ok(())
    }

    pub fn score_subject(&self) -> &str {
        &self.score_subject
    }

    pub fn alert_subject(&self) -> &str {
        &self.alert_subject
    }
}

#[cfg(test)]
mod tests {
    // Publishing requires a running NATS server
}
