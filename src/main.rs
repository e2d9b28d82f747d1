//! Fraud Scoring Pipeline - Main Entry Point
//!
//! Consumes transactions from NATS, scores them with the random forest model,
//! and publishes assessments and fraud alerts.

use anyhow::{Context, Result};
use fraud_scoring_pipeline::{
    config::{AppConfig, LoggingConfig},
    consumer::{decode_transaction, TransactionConsumer},
    metrics::{MetricsReporter, PipelineMetrics},
    models::{FraudScorer, ModelOrigin},
    producer::AssessmentProducer,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Shared, read-only state handed to every worker task
struct AppContext {
    config: AppConfig,
    scorer: FraudScorer,
    producer: AssessmentProducer,
    metrics: Arc<PipelineMetrics>,
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("fraud_scoring_pipeline={}", logging.level))
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match logging.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.pretty().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Fraud Scoring Pipeline");
    info!(
        fraud_threshold = config.detection.fraud_threshold,
        alert_threshold = config.detection.alert_threshold,
        tier_medium = config.detection.tiers.medium,
        tier_high = config.detection.tiers.high,
        "Configuration loaded"
    );

    // Model load/bootstrap is blocking file I/O and CPU-bound training
    let settings = config.scorer_settings();
    let scorer = tokio::task::spawn_blocking(move || FraudScorer::initialize(&settings))
        .await
        .context("Scorer initialization task failed")?;

    match scorer.origin() {
        Some(ModelOrigin::Loaded) => info!(path = %config.model.path.display(), "Using persisted model"),
        Some(ModelOrigin::Bootstrapped) => info!("Using freshly bootstrapped model"),
        None => warn!("No model available, all scores will be degraded"),
    }

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!(url = %config.nats.url, "Connected to NATS");

    let consumer = TransactionConsumer::new(client.clone(), &config.nats.transaction_subject);
    let producer = AssessmentProducer::new(
        client.clone(),
        &config.nats.score_subject,
        &config.nats.alert_subject,
    );
    let metrics = Arc::new(PipelineMetrics::new());

    let num_workers = config.pipeline.workers;
    info!(
        workers = num_workers,
        transactions = %config.nats.transaction_subject,
        scores = %producer.score_subject(),
        alerts = %producer.alert_subject(),
        "Starting transaction processing loop"
    );

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let ctx = Arc::new(AppContext {
        config,
        scorer,
        producer,
        metrics: metrics.clone(),
    });

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let ctx = ctx.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let record = match decode_transaction(&message.payload) {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = format!("{:#}", e), "Dropping transaction message");
                    ctx.metrics.record_rejected();
                    drop(permit);
                    return;
                }
            };

            let assessment = ctx.scorer.assess(&record, &ctx.config.detection);
            let processing_time = start_time.elapsed();
            ctx.metrics.record_assessment(&assessment, processing_time);

            if let Err(e) = ctx.producer.publish(&assessment).await {
                error!(
                    transaction_id = %assessment.transaction_id,
                    error = format!("{:#}", e),
                    "Failed to publish assessment"
                );
            } else if let Some(alert) = &assessment.alert {
                info!(
                    transaction_id = %assessment.transaction_id,
                    alert_id = %alert.alert_id,
                    risk_score = alert.risk_score,
                    severity = %alert.severity,
                    processing_time_us = processing_time.as_micros() as u64,
                    "Fraud alert published"
                );
            } else {
                debug!(
                    transaction_id = %assessment.transaction_id,
                    risk_score = assessment.probability(),
                    tier = %assessment.outcome.tier(),
                    processing_time_us = processing_time.as_micros() as u64,
                    "Transaction assessed"
                );
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                let stats = ctx.metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} tx/s", ctx.metrics.get_throughput()),
                    avg_latency_us = stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
