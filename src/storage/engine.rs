//! PulseDB Storage Engine
//!
//! The engine owns an ordered index of `TimeChunk`s keyed by window start:
//! - Write path: Record → window lookup (or idempotent creation) → chunk append
//! - Read path: Query → overlapping chunks → per-chunk binary search → concat
//!
//! Chunks are time-disjoint, so concatenating per-chunk results in window
//! order yields a globally sorted sequence without a re-sort. Hot chunks
//! accept writes; a background task demotes aged chunks to the compressed
//! cold form. Reads of cold chunks decode transiently and never
//! re-promote.
//!
//! Thread-safe via Tokio's async RwLock: the chunk map serializes
//! structural changes, each chunk serializes its own mutations, and
//! ingests into different windows proceed independently.

use crate::storage::chunk::{ChunkSummary, TimeChunk};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{KeySelector, RatePoint, Record, TimeRange, TrendPoint, TrendSeries};
use chrono::Utc;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};

/// Configuration for the storage engine
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Width of each chunk window in seconds (default: one hour)
    #[serde(default = "default_chunk_width")]
    pub chunk_width_secs: i64,

    /// Age after which chunks are compressed and marked cold
    #[serde(default = "default_demote_after")]
    pub demote_after_secs: i64,

    /// How often the background demotion task runs
    #[serde(default = "default_demote_interval")]
    pub demote_interval_secs: u64,

    /// Passthrough flag for the surrounding runtime: when false, the
    /// embedding service skips write-ahead persistence entirely (useful
    /// for benchmarking). The in-memory core keeps no durability state
    /// either way.
    #[serde(default)]
    pub durable_writes: bool,
}

fn default_chunk_width() -> i64 {
    3600
}

fn default_demote_after() -> i64 {
    86400
}

fn default_demote_interval() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_width_secs: default_chunk_width(),
            demote_after_secs: default_demote_after(),
            demote_interval_secs: default_demote_interval(),
            durable_writes: false,
        }
    }
}

/// The main PulseDB storage engine
pub struct StorageEngine {
    /// Configuration
    config: EngineConfig,
    /// Chunks indexed by window start
    chunks: RwLock<BTreeMap<i64, Arc<RwLock<TimeChunk>>>>,
    /// Shutdown signal for background tasks
    shutdown: RwLock<bool>,
}

impl StorageEngine {
    /// Create a new storage engine
    pub fn new(config: EngineConfig) -> StorageResult<Self> {
        if config.chunk_width_secs <= 0 {
            return Err(StorageError::InvalidRange(format!(
                "chunk width must be positive, got {}",
                config.chunk_width_secs
            )));
        }

        if !config.durable_writes {
            tracing::info!("durable writes disabled; running fully in-memory");
        }

        Ok(Self {
            config,
            chunks: RwLock::new(BTreeMap::new()),
            shutdown: RwLock::new(false),
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start of the window covering `timestamp`
    fn window_start(&self, timestamp: i64) -> i64 {
        timestamp.div_euclid(self.config.chunk_width_secs) * self.config.chunk_width_secs
    }

    /// Look up or create the chunk for a window start
    ///
    /// Creation is idempotent under concurrent attempts: the map write
    /// lock re-checks before inserting, so racing ingests into a new
    /// window end up sharing one chunk.
    async fn chunk_for(&self, window_start: i64) -> StorageResult<Arc<RwLock<TimeChunk>>> {
        {
            let map = self.chunks.read().await;
            if let Some(chunk) = map.get(&window_start) {
                return Ok(chunk.clone());
            }
        }

        let mut map = self.chunks.write().await;
        if let Some(chunk) = map.get(&window_start) {
            return Ok(chunk.clone());
        }

        let chunk = TimeChunk::new(window_start, window_start + self.config.chunk_width_secs)?;
        let chunk = Arc::new(RwLock::new(chunk));
        map.insert(window_start, chunk.clone());
        tracing::debug!(window_start, "created chunk");
        Ok(chunk)
    }

    /// Chunks whose windows intersect `range`, in ascending window order
    async fn chunks_overlapping(&self, range: TimeRange) -> Vec<Arc<RwLock<TimeChunk>>> {
        let width = self.config.chunk_width_secs;
        let map = self.chunks.read().await;
        map.range(..range.end)
            .filter(|(start, _)| *start + width > range.start)
            .map(|(_, chunk)| chunk.clone())
            .collect()
    }

    /// Ingest a single record
    ///
    /// Fails with `ColdWriteRejected` if the covering window has already
    /// been demoted; use `rehydrate` (or `ingest_rehydrating`) to write
    /// late data into a cold window explicitly.
    pub async fn ingest(&self, record: Record) -> StorageResult<()> {
        let chunk = self.chunk_for(self.window_start(record.timestamp)).await?;
        let mut guard = chunk.write().await;
        guard.append(record)
    }

    /// Ingest a batch of records
    ///
    /// Records are appended one by one (each atomic at chunk
    /// granularity); the batch stops at the first failure and reports it,
    /// leaving earlier appends in place.
    pub async fn ingest_batch(&self, records: Vec<Record>) -> StorageResult<usize> {
        let mut written = 0;
        for record in records {
            self.ingest(record).await?;
            written += 1;
        }
        Ok(written)
    }

    /// Ingest, rehydrating the target window first if it is cold
    pub async fn ingest_rehydrating(&self, record: Record) -> StorageResult<()> {
        let chunk = self.chunk_for(self.window_start(record.timestamp)).await?;
        let mut guard = chunk.write().await;
        if guard.is_cold() {
            guard.decompress()?;
            tracing::debug!(
                window_start = guard.start_time(),
                "rehydrated chunk for late write"
            );
        }
        guard.append(record)
    }

    /// Explicitly promote the chunk covering `timestamp` back to hot
    ///
    /// Returns true if a cold chunk was rehydrated, false if the window
    /// has no chunk or is already hot.
    pub async fn rehydrate(&self, timestamp: i64) -> StorageResult<bool> {
        let window_start = self.window_start(timestamp);
        let chunk = {
            let map = self.chunks.read().await;
            map.get(&window_start).cloned()
        };

        match chunk {
            None => Ok(false),
            Some(chunk) => {
                let mut guard = chunk.write().await;
                if guard.is_hot() {
                    return Ok(false);
                }
                guard.decompress()?;
                tracing::info!(window_start, "rehydrated chunk");
                Ok(true)
            }
        }
    }

    /// All records for `key` within `range`, in ascending timestamp order
    ///
    /// Fans out across every intersecting chunk; cold chunks are decoded
    /// transiently and stay cold.
    pub async fn query_range(&self, key: &str, range: TimeRange) -> StorageResult<Vec<Record>> {
        let mut results = Vec::new();
        for chunk in self.chunks_overlapping(range).await {
            let guard = chunk.read().await;
            results.extend(guard.get_range(key, range.start, range.end)?);
        }
        Ok(results)
    }

    /// The most recent record for `key` across all chunks
    pub async fn latest(&self, key: &str) -> StorageResult<Option<Record>> {
        let chunks: Vec<Arc<RwLock<TimeChunk>>> = {
            let map = self.chunks.read().await;
            map.values().rev().cloned().collect()
        };

        for chunk in chunks {
            let guard = chunk.read().await;
            if let Some(record) = guard.get_latest(key)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// All series keys known to the engine
    pub async fn keys(&self) -> StorageResult<Vec<String>> {
        let chunks: Vec<Arc<RwLock<TimeChunk>>> = {
            let map = self.chunks.read().await;
            map.values().cloned().collect()
        };

        let mut keys = BTreeSet::new();
        for chunk in chunks {
            let guard = chunk.read().await;
            keys.extend(guard.keys()?);
        }
        Ok(keys.into_iter().collect())
    }

    /// Bucketed mean trend for every series matching `selector`
    ///
    /// Buckets are fixed-width and aligned to `range.start`; buckets with
    /// no data are omitted, never interpolated.
    pub async fn trend(
        &self,
        selector: &KeySelector,
        range: TimeRange,
        bucket_width: i64,
    ) -> StorageResult<Vec<TrendSeries>> {
        if bucket_width <= 0 {
            return Err(StorageError::InvalidRange(format!(
                "bucket width must be positive, got {}",
                bucket_width
            )));
        }

        let keys: Vec<String> = self
            .keys()
            .await?
            .into_iter()
            .filter(|k| selector.matches(k))
            .collect();

        let mut series = Vec::with_capacity(keys.len());
        for key in keys {
            let records = self.query_range(&key, range).await?;

            let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
            for record in &records {
                if let Some(value) = record.scalar_value() {
                    let bucket = range.start
                        + (record.timestamp - range.start).div_euclid(bucket_width) * bucket_width;
                    let entry = buckets.entry(bucket).or_insert((0.0, 0));
                    entry.0 += value;
                    entry.1 += 1;
                }
            }

            let points = buckets
                .into_iter()
                .map(|(timestamp, (sum, count))| TrendPoint {
                    timestamp,
                    value: sum / count as f64,
                })
                .collect();

            series.push(TrendSeries { key, points });
        }

        Ok(series)
    }

    /// Min/max/mean/count over `key` within `range`
    ///
    /// Combines per-chunk partial summaries (min of mins, max of maxes,
    /// summed totals), which is equivalent to summarizing the flattened
    /// sequence. Fails with `IndexError` when the range holds no scalar
    /// data for the key.
    pub async fn stats(&self, key: &str, range: TimeRange) -> StorageResult<ChunkSummary> {
        let mut combined = ChunkSummary {
            min: 0.0,
            max: 0.0,
            sum: 0.0,
            count: 0,
        };

        for chunk in self.chunks_overlapping(range).await {
            let guard = chunk.read().await;
            if let Some(partial) = guard.summarize_range(key, range.start, range.end)? {
                combined.merge(&partial);
            }
        }

        if combined.count == 0 {
            return Err(StorageError::IndexError(key.to_string()));
        }
        Ok(combined)
    }

    /// Records whose z-score against the range's mean exceeds the
    /// threshold
    ///
    /// Uses the population standard deviation; a constant series
    /// (stddev 0) flags nothing rather than dividing by zero.
    pub async fn outliers(
        &self,
        key: &str,
        range: TimeRange,
        z_threshold: f64,
    ) -> StorageResult<Vec<Record>> {
        let records = self.query_range(key, range).await?;
        let values: Vec<f64> = records.iter().filter_map(|r| r.scalar_value()).collect();
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let stddev = variance.sqrt();

        if stddev == 0.0 {
            return Ok(Vec::new());
        }

        Ok(records
            .into_iter()
            .filter(|r| match r.scalar_value() {
                Some(v) => (v - mean).abs() / stddev > z_threshold,
                None => false,
            })
            .collect())
    }

    /// Pairwise rate of change scaled to `period` seconds
    ///
    /// For each consecutive pair of scalar samples, emits
    /// `(v2 - v1) / (t2 - t1) * period` at the later timestamp. Pairs
    /// with a zero or negative time delta are skipped, not divided by.
    pub async fn rate_of_change(
        &self,
        key: &str,
        range: TimeRange,
        period: i64,
    ) -> StorageResult<Vec<RatePoint>> {
        let records = self.query_range(key, range).await?;
        let samples: Vec<(i64, f64)> = records
            .iter()
            .filter_map(|r| r.scalar_value().map(|v| (r.timestamp, v)))
            .collect();

        let mut rates = Vec::new();
        for pair in samples.windows(2) {
            let (t1, v1) = pair[0];
            let (t2, v2) = pair[1];
            let dt = t2 - t1;
            if dt <= 0 {
                continue;
            }
            rates.push(RatePoint {
                timestamp: t2,
                rate: (v2 - v1) / dt as f64 * period as f64,
            });
        }
        Ok(rates)
    }

    /// Compress every hot chunk whose window ends at or before `cutoff`
    ///
    /// The encode runs against a snapshot taken under a read lock so
    /// concurrent readers are never blocked on compression; the swap
    /// happens under a short write lock and is skipped if the chunk
    /// mutated in between. Per-chunk failures are logged and do not abort
    /// the sweep. Returns the number of chunks demoted.
    pub async fn demote_before(&self, cutoff: i64) -> usize {
        let width = self.config.chunk_width_secs;
        let targets: Vec<(i64, Arc<RwLock<TimeChunk>>)> = {
            let map = self.chunks.read().await;
            map.iter()
                .filter(|(start, _)| *start + width <= cutoff)
                .map(|(start, chunk)| (*start, chunk.clone()))
                .collect()
        };

        let mut demoted = 0;
        for (window_start, chunk) in targets {
            let prepared = {
                let guard = chunk.read().await;
                match guard.prepare_compressed() {
                    Ok(Some(prepared)) => prepared,
                    Ok(None) => continue, // already cold
                    Err(e) => {
                        tracing::warn!(window_start, error = %e, "chunk compression failed");
                        continue;
                    }
                }
            };

            let mut guard = chunk.write().await;
            if guard.install_compressed(prepared.0, prepared.1) {
                tracing::debug!(
                    window_start,
                    ratio = guard.metadata().compression_ratio,
                    "demoted chunk to cold"
                );
                demoted += 1;
            }
        }
        demoted
    }

    /// Start the background hot→cold demotion task
    pub fn start_background_demotion(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        let tick = Duration::from_secs(engine.config.demote_interval_secs.max(1));

        tokio::spawn(async move {
            let mut ticker = interval(tick);

            loop {
                ticker.tick().await;

                if *engine.shutdown.read().await {
                    break;
                }

                let cutoff = Utc::now().timestamp() - engine.config.demote_after_secs;
                let demoted = engine.demote_before(cutoff).await;
                if demoted > 0 {
                    tracing::info!(demoted, "background demotion pass complete");
                }
            }
        })
    }

    /// Drop data older than `retain_after`
    ///
    /// Chunks entirely before the cutoff are removed; the chunk straddling
    /// it is trimmed in place when hot. Returns the number of records
    /// removed.
    pub async fn enforce_retention(&self, retain_after: i64) -> StorageResult<usize> {
        let width = self.config.chunk_width_secs;
        let mut removed = 0;

        {
            let mut map = self.chunks.write().await;
            let expired: Vec<i64> = map
                .range(..retain_after)
                .filter(|(start, _)| *start + width <= retain_after)
                .map(|(start, _)| *start)
                .collect();

            for window_start in expired {
                if let Some(chunk) = map.remove(&window_start) {
                    let guard = chunk.read().await;
                    removed += guard.metadata().record_count;
                    tracing::debug!(window_start, "dropped expired chunk");
                }
            }
        }

        let boundary = {
            let map = self.chunks.read().await;
            map.get(&self.window_start(retain_after)).cloned()
        };
        if let Some(chunk) = boundary {
            let mut guard = chunk.write().await;
            if guard.is_hot() {
                removed += guard.cleanup(retain_after)?;
            } else {
                tracing::debug!(
                    window_start = guard.start_time(),
                    "skipping retention trim of cold chunk"
                );
            }
        }

        Ok(removed)
    }

    /// Engine-wide counters
    pub async fn stats_snapshot(&self) -> EngineStats {
        let chunks: Vec<Arc<RwLock<TimeChunk>>> = {
            let map = self.chunks.read().await;
            map.values().cloned().collect()
        };

        let mut stats = EngineStats::default();
        for chunk in chunks {
            let guard = chunk.read().await;
            stats.chunk_count += 1;
            if guard.is_hot() {
                stats.hot_chunks += 1;
            } else {
                stats.cold_chunks += 1;
            }
            stats.record_count += guard.metadata().record_count;
            stats.size_bytes += guard.metadata().size_bytes;
        }
        stats
    }

    /// Signal background tasks to stop
    pub async fn shutdown(&self) {
        *self.shutdown.write().await = true;
        tracing::info!("storage engine shutdown requested");
    }
}

/// Engine-wide statistics
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub chunk_count: usize,
    pub hot_chunks: usize,
    pub cold_chunks: usize,
    pub record_count: usize,
    pub size_bytes: usize,
}

impl std::fmt::Display for EngineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {} ({} hot, {} cold), Records: {}, Size: {:.2} MB",
            self.chunk_count,
            self.hot_chunks,
            self.cold_chunks,
            self.record_count,
            self.size_bytes as f64 / (1024.0 * 1024.0)
        )
    }
}
