//! PulseDB CLI
//!
//! Driver binary for the PulseDB vitals engine: generates a synthetic
//! monitoring session, exercises the query surface, and runs the pattern
//! detection pipeline over it.

use anyhow::Context;
use clap::Parser;
use pulsedb::detect::{ChangepointMethod, PatternDetector};
use pulsedb::storage::{KeySelector, Record, StorageEngine, TimeRange, Waveform};
use pulsedb::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HR: &str = "demo|8867-4|bpm";
const SPO2: &str = "demo|2708-6|%";
const SYS: &str = "demo|8480-6|mmHg";
const DIA: &str = "demo|8462-4|mmHg";
const ECG: &str = "demo|131328|mV";

#[derive(Parser, Debug)]
#[command(name = "pulsedb", about = "Time-series vitals engine demo")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hours of synthetic monitoring data to generate
    #[arg(long, default_value_t = 24)]
    hours: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
    );
    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("PulseDB Vitals Engine v{}", env!("CARGO_PKG_VERSION"));

    let engine = Arc::new(StorageEngine::new(config.storage.clone())?);
    let demotion = engine.start_background_demotion();

    let now = chrono::Utc::now().timestamp();
    let start = now - args.hours * 3600;
    let range = TimeRange::new(start, now);

    ingest_session(&engine, start, args.hours).await?;

    let stats = engine.stats_snapshot().await;
    tracing::info!("ingested synthetic session: {}", stats);

    // Query surface
    let summary = engine.stats(HR, range).await?;
    tracing::info!(
        min = summary.min,
        max = summary.max,
        mean = %format!("{:.1}", summary.mean()),
        count = summary.count,
        "heart rate stats"
    );

    let trends = engine
        .trend(&KeySelector::Filter("8867-4".to_string()), range, 3600)
        .await?;
    for series in &trends {
        tracing::info!(key = %series.key, buckets = series.points.len(), "hourly trend");
    }

    let desaturations = engine.outliers(SPO2, range, 1.5).await?;
    tracing::info!(flagged = desaturations.len(), "saturation outliers");

    let rates = engine.rate_of_change(HR, range, 60).await?;
    let steepest = rates
        .iter()
        .map(|r| r.rate.abs())
        .fold(0.0f64, f64::max);
    tracing::info!(
        points = rates.len(),
        steepest_per_min = %format!("{:.2}", steepest),
        "heart rate of change"
    );

    // Age out everything but the most recent hour, then prove cold reads
    let demoted = engine.demote_before(now - 3600).await;
    let reread = engine.query_range(HR, range).await?;
    tracing::info!(
        demoted,
        records = reread.len(),
        "cold chunks still serve queries"
    );

    // Detection pipeline
    let detector = PatternDetector::new(engine.clone(), config.detection.clone());
    let keys = engine.keys().await?;

    let events = detector.run(&keys, range).await;
    tracing::info!(events = events.len(), "pattern detection complete");
    for event in &events {
        let json = serde_json::to_string(event)?;
        tracing::info!(event = %json, "detection");
    }

    // PELT is the expensive analyzer; callers time-box it
    if config.detection.changepoint.method == ChangepointMethod::Pelt {
        let pelt = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            detector.changepoints(HR, range),
        )
        .await;
        match pelt {
            Ok(Ok(report)) => {
                tracing::info!(points = report.points.len(), "PELT segmentation")
            }
            Ok(Err(e)) => tracing::warn!(error = %e, "PELT failed"),
            Err(_) => tracing::warn!("PELT timed out"),
        }
    }

    tracing::info!("shutting down");
    engine.shutdown().await;
    demotion.abort();

    Ok(())
}

/// Generate a deterministic synthetic monitoring session
///
/// One subject: per-minute heart rate with a daily rhythm and a
/// tachycardia burst, five-minutely saturation with one desaturation,
/// quarter-hourly correlated blood pressure, and a short ECG strip.
async fn ingest_session(
    engine: &Arc<StorageEngine>,
    start: i64,
    hours: i64,
) -> anyhow::Result<()> {
    let minutes = hours * 60;

    let mut batch = Vec::new();
    for m in 0..minutes {
        let ts = start + m * 60;
        let phase = (m % 1440) as f64 / 1440.0 * std::f64::consts::TAU;
        let jitter = if m % 2 == 0 { 1.0 } else { -1.0 };

        // Tachycardia burst in the third quarter of the session
        let burst = if m > minutes * 2 / 4 && m < minutes * 2 / 4 + 30 {
            40.0
        } else {
            0.0
        };
        batch.push(Record::scalar(HR, ts, 72.0 + 8.0 * phase.sin() + jitter + burst));

        if m % 5 == 0 {
            // A single desaturation near the end of the burst
            let spo2 = if m == minutes * 2 / 4 + 25 { 88.0 } else { 98.0 };
            batch.push(Record::scalar(SPO2, ts, spo2));
        }

        if m % 15 == 0 {
            let swing = 6.0 * phase.cos();
            batch.push(Record::scalar(SYS, ts, 120.0 + swing + jitter));
            batch.push(Record::scalar(DIA, ts, 80.0 + swing * 0.6 + jitter));
        }
    }

    // A two-second ECG strip at 250 Hz
    let ecg = Waveform {
        origin: 0.0,
        period: 0.004,
        factor: 0.001,
        samples: (0..500)
            .map(|i| ((i % 250) as f64 / 250.0 * std::f64::consts::TAU).sin() * 1200.0)
            .collect(),
    };
    batch.push(Record::waveform(ECG, start + 600, ecg));

    let written = engine.ingest_batch(batch).await?;
    tracing::debug!(written, "synthetic session written");
    Ok(())
}
