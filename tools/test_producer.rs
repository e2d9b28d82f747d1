//! Test Transaction Producer
//!
//! Generates UPI-style transactions and publishes them to NATS for pipeline
//! testing. Suspicious transactions use night hours and extreme amounts.

use chrono::{DateTime, TimeZone, Utc};
use fraud_scoring_pipeline::types::{MerchantCategory, TransactionRecord, TransactionType};
use rand::rngs::ThreadRng;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Transaction generator for testing
struct TransactionGenerator {
    rng: ThreadRng,
    transaction_counter: u64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
        }
    }

    /// Generate a daytime transaction with an ordinary amount
    fn generate_legitimate(&mut self) -> TransactionRecord {
        let amount = self.rng.gen_range(10.0..5_000.0);
        let hour = self.rng.gen_range(8..21);
        self.build(amount, hour)
    }

    /// Generate a night-time transaction with a micro or very large amount
    fn generate_suspicious(&mut self) -> TransactionRecord {
        let amount = if self.rng.gen_bool(0.5) {
            self.rng.gen_range(0.01..1.0)
        } else {
            self.rng.gen_range(50_000.0..200_000.0)
        };
        let hour = if self.rng.gen_bool(0.5) {
            self.rng.gen_range(0..6)
        } else {
            23
        };
        self.build(amount, hour)
    }

    fn build(&mut self, amount: f64, hour: u32) -> TransactionRecord {
        self.transaction_counter += 1;

        let transaction_type =
            TransactionType::ALL[self.rng.gen_range(0..TransactionType::ALL.len())];
        let category = MerchantCategory::ALL[self.rng.gen_range(0..MerchantCategory::ALL.len())];

        let mut record = TransactionRecord::new(
            (amount * 100.0).round() / 100.0,
            format!("user{:04}@upi", self.rng.gen_range(1..10_000)),
            format!("payee{:04}@upi", self.rng.gen_range(1..10_000)),
            transaction_type,
        )
        .with_merchant_category(category)
        .with_timestamp(self.today_at(hour))
        .with_device_id(format!("device_{:08x}", self.rng.gen::<u32>()));
        record.transaction_id = format!("tx_{:012}", self.transaction_counter);

        if self.rng.gen_bool(0.7) {
            record = record.with_location(self.random_choice(&[
                "Mumbai", "Delhi", "Bengaluru", "Chennai", "Kolkata", "Pune",
            ]));
        }
        record
    }

    fn today_at(&mut self, hour: u32) -> DateTime<Utc> {
        let minute = self.rng.gen_range(0..60);
        let now = Utc::now();
        now.date_naive()
            .and_hms_opt(hour, minute, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(now)
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Transaction Producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args
        .get(4)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.1_f64)
        .clamp(0.0, 1.0);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fraud_rate, delay_ms).await;
        }
    };

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    let mut legitimate_count = 0;
    let mut suspicious_count = 0;

    for i in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            legitimate_count += 1;
            generator.generate_legitimate()
        };

        let payload = serde_json::to_vec(&transaction)?;
        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                published = i + 1,
                total = count,
                legitimate = legitimate_count,
                suspicious = suspicious_count,
                "Progress"
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    // flush buffered publishes before exiting
    client.flush().await?;

    info!(
        published = count,
        legitimate = legitimate_count,
        suspicious = suspicious_count,
        "Completed"
    );

    Ok(())
}

async fn run_dry_mode(count: u64, fraud_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        if (i + 1) % 10 == 0 || i == 0 {
            let json = serde_json::to_string_pretty(&transaction)?;
            info!("Sample transaction {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
