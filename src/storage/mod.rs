//! PulseDB Storage Engine
//!
//! This module provides the core time-series storage functionality:
//!
//! - **types**: Core data structures (Record, Value, TimeRange, selectors)
//! - **compression**: Delta encoding + LZ4 compression for cold chunks
//! - **chunk**: Time-windowed chunk with hot/cold representations
//! - **engine**: Main storage engine orchestrating all chunks
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   Record → Window lookup → TimeChunk (hot) → sorted per-key sequence
//!
//! Read Path:
//!   Query → Overlapping chunks → Binary search (decode cold transiently)
//!         → Concatenate in window order → Results
//!
//! Lifecycle:
//!   hot chunk ──(age)──▶ cold chunk ──(rehydrate)──▶ hot chunk
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use pulsedb::storage::{EngineConfig, Record, StorageEngine, TimeRange};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = StorageEngine::new(EngineConfig::default())?;
//!
//!     // Ingest a heart-rate reading
//!     engine
//!         .ingest(Record::scalar("p1|8867-4|bpm", 1_700_000_000, 72.0))
//!         .await?;
//!
//!     // Query the last 24 hours
//!     let range = TimeRange::last_hours(24);
//!     let records = engine.query_range("p1|8867-4|bpm", range).await?;
//!     println!("{} readings", records.len());
//!
//!     Ok(())
//! }
//! ```

pub mod chunk;
pub mod compression;
pub mod engine;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use chunk::{ChunkMetadata, ChunkSummary, TimeChunk};
pub use compression::{compress_series, decompress_series, CompressedBlock};
pub use engine::{EngineConfig, EngineStats, StorageEngine};
pub use error::{StorageError, StorageResult};
pub use types::{
    KeySelector, RatePoint, Record, TimeRange, TrendPoint, TrendSeries, Value, Waveform,
};
