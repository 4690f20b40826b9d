//! # PulseDB
//!
//! Time-Series Vitals Engine - storage and pattern detection for
//! continuous physiological monitoring streams (heart rate, blood
//! pressure, oxygen saturation, sampled waveforms such as ECG).
//!
//! ## Features
//!
//! - **Windowed storage**: hourly chunks with sorted per-series sequences
//! - **Hot/cold lifecycle**: aged chunks compress to LZ4 and serve reads
//!   transparently
//! - **Fixed query shapes**: range, trend, stats, outliers, rate of change
//! - **Pattern detection**: seasonal decomposition, multivariate anomaly
//!   scoring, change-point detection, moving-window analysis
//!
//! ## Modules
//!
//! - [`storage`]: Core time-series storage engine
//! - [`detect`]: Pattern detection pipeline
//! - [`config`]: TOML configuration loading
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pulsedb::detect::{DetectionConfig, PatternDetector};
//! use pulsedb::storage::{EngineConfig, Record, StorageEngine, TimeRange};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Initialize storage
//!     let engine = Arc::new(StorageEngine::new(EngineConfig::default())?);
//!
//!     // Start the hot→cold lifecycle
//!     let demotion = engine.start_background_demotion();
//!
//!     // Ingest heart-rate readings for one subject
//!     for minute in 0..60 {
//!         engine
//!             .ingest(Record::scalar(
//!                 "p1|8867-4|bpm",
//!                 1_700_000_000 + minute * 60,
//!                 72.0,
//!             ))
//!             .await?;
//!     }
//!
//!     // Query and analyze
//!     let range = TimeRange::new(1_700_000_000, 1_700_003_600);
//!     let summary = engine.stats("p1|8867-4|bpm", range).await?;
//!     println!("mean heart rate: {:.1}", summary.mean());
//!
//!     let detector = PatternDetector::new(engine.clone(), DetectionConfig::default());
//!     let events = detector.run(&["p1|8867-4|bpm".to_string()], range).await;
//!     println!("{} detections", events.len());
//!
//!     engine.shutdown().await;
//!     demotion.abort();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod detect;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    ChunkMetadata, ChunkSummary, EngineConfig, EngineStats, KeySelector, RatePoint, Record,
    StorageEngine, StorageError, StorageResult, TimeChunk, TimeRange, TrendPoint, TrendSeries,
    Value, Waveform,
};

pub use detect::{
    ChangePoint, ChangepointMethod, ChangepointReport, DetectError, DetectResult, DetectionConfig,
    DetectionEvent, EventKind, EventSpan, GroupAnomaly, GroupReport, MultivariateMethod,
    PatternDetector, SeasonalDecomposition, SeasonalMethod, WindowMethod, WindowReport,
};

pub use config::{Config, ConfigError, LoggingConfig};
