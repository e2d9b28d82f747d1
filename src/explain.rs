//! Rule-based reasons attached to a fraud score.
//!
//! These rules are a post-hoc summary of the record, not an explanation of the
//! forest's decision path.

use chrono::{DateTime, Timelike, Utc};
use std::fmt;
use std::ops::RangeInclusive;

use crate::types::transaction::TransactionRecord;

/// Amounts above this are flagged as very high
pub const HIGH_AMOUNT_THRESHOLD: f64 = 50_000.0;

/// Amounts below this are flagged as unusually low (card testing)
pub const LOW_AMOUNT_THRESHOLD: f64 = 1.0;

/// Hours of the day considered normal activity
pub const USUAL_HOURS: RangeInclusive<u32> = 6..=22;

/// Probabilities above this report multiple risk factors
pub const MULTIPLE_FACTORS_PROBABILITY: f64 = 0.8;

/// A single explanation rule that fired for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    VeryHighAmount,
    UnusuallyLowAmount,
    UnusualHours,
    MultipleRiskFactors,
    StandardAssessment,
}

impl Reason {
    pub fn description(&self) -> &'static str {
        match self {
            Reason::VeryHighAmount => "very high transaction amount",
            Reason::UnusuallyLowAmount => "unusually low transaction amount",
            Reason::UnusualHours => "transaction at unusual hours",
            Reason::MultipleRiskFactors => "multiple risk factors detected",
            Reason::StandardAssessment => "standard risk assessment completed",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Whether an hour of day falls outside normal activity
pub fn is_unusual_hour(hour: u32) -> bool {
    !USUAL_HOURS.contains(&hour)
}

/// Rules that fire for a record, in fixed check order
pub fn reasons_at(record: &TransactionRecord, probability: f64, now: DateTime<Utc>) -> Vec<Reason> {
    let mut reasons = Vec::new();

    if record.amount > HIGH_AMOUNT_THRESHOLD {
        reasons.push(Reason::VeryHighAmount);
    }
    if record.amount < LOW_AMOUNT_THRESHOLD {
        reasons.push(Reason::UnusuallyLowAmount);
    }
    if is_unusual_hour(record.effective_timestamp(now).hour()) {
        reasons.push(Reason::UnusualHours);
    }
    if probability > MULTIPLE_FACTORS_PROBABILITY {
        reasons.push(Reason::MultipleRiskFactors);
    }

    if reasons.is_empty() {
        reasons.push(Reason::StandardAssessment);
    }
    reasons
}

/// Human-readable reasons for a score, evaluated at the current time
pub fn explain(record: &TransactionRecord, probability: f64) -> Vec<String> {
    explain_at(record, probability, Utc::now())
}

/// Human-readable reasons, using `now` when the record has no timestamp
pub fn explain_at(record: &TransactionRecord, probability: f64, now: DateTime<Utc>) -> Vec<String> {
    reasons_at(record, probability, now)
        .into_iter()
        .map(|reason| reason.description().to_string())
        .collect()
}
