//! Throughput, latency and score distribution tracking for the pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

use crate::assessment::Assessment;
use crate::types::alert::RiskTier;

/// Processing times kept for percentile calculation
const MAX_TIMING_SAMPLES: usize = 10_000;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Transactions scored (including degraded outcomes)
    pub transactions_processed: AtomicU64,
    /// Outcomes produced without a usable prediction
    pub degraded_outcomes: AtomicU64,
    /// Messages dropped before scoring (undecodable or invalid)
    pub rejected_messages: AtomicU64,
    /// Total alerts generated
    pub alerts_generated: AtomicU64,
    /// Assessments by risk tier
    tiers: RwLock<HashMap<RiskTier, u64>>,
    /// Alerts by severity
    alerts_by_tier: RwLock<HashMap<RiskTier, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Risk score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            transactions_processed: AtomicU64::new(0),
            degraded_outcomes: AtomicU64::new(0),
            rejected_messages: AtomicU64::new(0),
            alerts_generated: AtomicU64::new(0),
            tiers: RwLock::new(HashMap::new()),
            alerts_by_tier: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a completed assessment
    pub fn record_assessment(&self, assessment: &Assessment, processing_time: Duration) {
        self.transactions_processed.fetch_add(1, Ordering::Relaxed);

        {
            let mut times = self
                .processing_times
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_TIMING_SAMPLES {
                times.drain(0..MAX_TIMING_SAMPLES / 2);
            }
        }

        let tier = assessment.outcome.tier();
        *self
            .tiers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(tier)
            .or_insert(0) += 1;

        if assessment.outcome.is_degraded() {
            self.degraded_outcomes.fetch_add(1, Ordering::Relaxed);
        } else {
            let bucket = score_bucket(assessment.probability());
            self.score_buckets
                .write()
                .unwrap_or_else(PoisonError::into_inner)[bucket] += 1;
        }

        if let Some(alert) = &assessment.alert {
            self.alerts_generated.fetch_add(1, Ordering::Relaxed);
            *self
                .alerts_by_tier
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(alert.severity)
                .or_insert(0) += 1;
        }
    }

    /// Record a message dropped before scoring
    pub fn record_rejected(&self) {
        self.rejected_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = self
            .processing_times
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Histogram of scored probabilities in tenths
    pub fn get_score_distribution(&self) -> [u64; 10] {
        *self
            .score_buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_tier_counts(&self) -> HashMap<RiskTier, u64> {
        self.tiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_alerts_by_tier(&self) -> HashMap<RiskTier, u64> {
        self.alerts_by_tier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let tx_count = self.transactions_processed.load(Ordering::Relaxed);
        let alert_count = self.alerts_generated.load(Ordering::Relaxed);
        let degraded = self.degraded_outcomes.load(Ordering::Relaxed);
        let rejected = self.rejected_messages.load(Ordering::Relaxed);
        let alert_rate = percentage(alert_count, tx_count);

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let tiers = self.get_tier_counts();
        let score_dist = self.get_score_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            FRAUD SCORING PIPELINE - METRICS SUMMARY          ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Scored: {:>8}  │  Throughput: {:>6.1} tx/s    ║",
            tx_count, throughput
        );
        info!(
            "║ Alerts Generated:    {:>8}  │  Alert Rate: {:>6.1}%        ║",
            alert_count, alert_rate
        );
        info!(
            "║ Degraded Outcomes:   {:>8}  │  Rejected:   {:>8}        ║",
            degraded, rejected
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Assessments by Tier:                                         ║");
        for tier in [
            RiskTier::Low,
            RiskTier::Medium,
            RiskTier::High,
            RiskTier::Unknown,
            RiskTier::Untrained,
        ] {
            let count = tiers.get(&tier).copied().unwrap_or(0);
            if count > 0 {
                info!(
                    "║   {:10}: {:>6} ({:>5.1}%)                                ║",
                    tier.as_str(),
                    count,
                    percentage(count, tx_count)
                );
            }
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Score Distribution:                                     ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = percentage(count, total);
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn score_bucket(probability: f64) -> usize {
    (probability.clamp(0.0, 1.0) * 10.0).min(9.0) as usize
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Prints a metrics summary on a fixed interval
pub struct MetricsReporter {
    metrics: std::sync::Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scorer::{ScoreOutcome, ScoringError};
    use crate::types::alert::FraudAlert;
    use chrono::Utc;

    fn assessment(outcome: ScoreOutcome, alert: bool) -> Assessment {
        let alert = alert.then(|| {
            FraudAlert::high_risk("tx".to_string(), outcome.probability(), outcome.tier(), vec![])
        });
        Assessment {
            transaction_id: "tx".to_string(),
            reasons: vec![],
            is_fraud: outcome.probability() > 0.5,
            outcome,
            alert,
            assessed_at: Utc::now(),
        }
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_assessment(
            &assessment(
                ScoreOutcome::Scored {
                    probability: 0.2,
                    tier: RiskTier::Low,
                },
                false,
            ),
            Duration::from_micros(100),
        );
        metrics.record_assessment(
            &assessment(
                ScoreOutcome::Scored {
                    probability: 0.95,
                    tier: RiskTier::High,
                },
                true,
            ),
            Duration::from_micros(300),
        );
        metrics.record_assessment(
            &assessment(
                ScoreOutcome::Degraded {
                    error: ScoringError::ModelUnavailable,
                },
                false,
            ),
            Duration::from_micros(50),
        );
        metrics.record_rejected();

        assert_eq!(metrics.transactions_processed.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.alerts_generated.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.degraded_outcomes.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.rejected_messages.load(Ordering::Relaxed), 1);

        let dist = metrics.get_score_distribution();
        assert_eq!(dist[2], 1);
        assert_eq!(dist[9], 1);
        assert_eq!(dist.iter().sum::<u64>(), 2);

        assert_eq!(metrics.get_tier_counts().get(&RiskTier::Untrained), Some(&1));
        assert_eq!(metrics.get_alerts_by_tier().get(&RiskTier::High), Some(&1));
    }

    #[test]
    fn test_processing_stats() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);

        let outcome = ScoreOutcome::Scored {
            probability: 0.1,
            tier: RiskTier::Low,
        };
        for us in 1..=100 {
            metrics.record_assessment(&assessment(outcome.clone(), false), Duration::from_micros(us));
        }

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.max_us, 100);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.p99_us, 100);
    }

    #[test]
    fn test_score_bucket_edges() {
        assert_eq!(score_bucket(0.0), 0);
        assert_eq!(score_bucket(0.55), 5);
        assert_eq!(score_bucket(1.0), 9);
    }
}
