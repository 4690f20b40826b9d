//! Time-windowed chunk storage
//!
//! A `TimeChunk` owns every record whose timestamp falls inside its
//! half-open window `[start_time, end_time)`, grouped by series key with
//! each sequence kept sorted ascending by timestamp. The representation is
//! a tagged variant: hot chunks hold the live series map and accept
//! writes, cold chunks hold a checksummed LZ4 block and are read-only.
//! Transition logic (`compress` / `decompress`) is the only code path that
//! moves a chunk between variants.

use crate::storage::compression::{compress_series, decompress_series, CompressedBlock};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::Record;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;

/// Record-count threshold used by `is_full`
const FULL_RECORD_COUNT: usize = 100_000;

/// Byte-size threshold used by `is_full`
const FULL_SIZE_BYTES: usize = 8 * 1024 * 1024;

/// Bookkeeping recomputed on every structural mutation
#[derive(Debug, Clone)]
pub struct ChunkMetadata {
    /// Creation time (Unix seconds)
    pub created_at: i64,
    /// Last structural mutation (Unix seconds)
    pub last_access: i64,
    /// Total records across all series
    pub record_count: usize,
    /// Estimated in-memory bytes (hot) or compressed bytes (cold)
    pub size_bytes: usize,
    /// Pre/post byte ratio of the last compression, 1.0 while hot
    pub compression_ratio: f64,
    /// Mutation counter; lets background compression detect races
    pub version: u64,
}

/// Chunk payload representation
#[derive(Debug)]
enum ChunkData {
    /// Writable series map
    Hot {
        series: HashMap<String, Vec<Record>>,
    },
    /// Compressed, read-only block
    Cold { block: CompressedBlock },
}

/// Single-pass summary of a series (or a sub-range of one)
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ChunkSummary {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: usize,
}

impl ChunkSummary {
    /// Mean of the summarized values
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Fold another partial summary into this one
    pub fn merge(&mut self, other: &ChunkSummary) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    fn from_values(values: impl Iterator<Item = f64>) -> Option<ChunkSummary> {
        let mut summary: Option<ChunkSummary> = None;
        for v in values {
            match summary.as_mut() {
                None => {
                    summary = Some(ChunkSummary {
                        min: v,
                        max: v,
                        sum: v,
                        count: 1,
                    })
                }
                Some(s) => {
                    s.min = s.min.min(v);
                    s.max = s.max.max(v);
                    s.sum += v;
                    s.count += 1;
                }
            }
        }
        summary
    }
}

/// A bounded time window of records
#[derive(Debug)]
pub struct TimeChunk {
    start_time: i64,
    end_time: i64,
    data: ChunkData,
    metadata: ChunkMetadata,
}

impl TimeChunk {
    /// Create an empty hot chunk covering `[start_time, end_time)`
    pub fn new(start_time: i64, end_time: i64) -> StorageResult<Self> {
        if end_time <= start_time {
            return Err(StorageError::InvalidRange(format!(
                "chunk window [{}, {}) is empty or inverted",
                start_time, end_time
            )));
        }

        let now = Utc::now().timestamp();
        Ok(Self {
            start_time,
            end_time,
            data: ChunkData::Hot {
                series: HashMap::new(),
            },
            metadata: ChunkMetadata {
                created_at: now,
                last_access: now,
                record_count: 0,
                size_bytes: 0,
                compression_ratio: 1.0,
                version: 0,
            },
        })
    }

    /// Window start (inclusive)
    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    /// Window end (exclusive)
    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    /// Chunk bookkeeping
    pub fn metadata(&self) -> &ChunkMetadata {
        &self.metadata
    }

    /// True while the chunk is writable
    pub fn is_hot(&self) -> bool {
        matches!(self.data, ChunkData::Hot { .. })
    }

    /// True once the chunk has been compressed
    pub fn is_cold(&self) -> bool {
        !self.is_hot()
    }

    /// Check whether a timestamp falls inside this chunk's window
    pub fn can_accept(&self, timestamp: i64) -> bool {
        timestamp >= self.start_time && timestamp < self.end_time
    }

    /// Capacity hint for the engine's lifecycle policy
    pub fn is_full(&self) -> bool {
        self.metadata.record_count > FULL_RECORD_COUNT
            || self.metadata.size_bytes > FULL_SIZE_BYTES
    }

    fn touch(&mut self) {
        self.metadata.last_access = Utc::now().timestamp();
        self.metadata.version += 1;
    }

    /// Append a record, keeping the series sorted by timestamp
    ///
    /// The tail insert is the fast path since ingestion is
    /// near-chronological; out-of-order records land via binary search.
    /// Fails without mutating anything if the timestamp is outside the
    /// window or the chunk is cold.
    pub fn append(&mut self, record: Record) -> StorageResult<()> {
        if !self.can_accept(record.timestamp) {
            return Err(StorageError::OutOfTimeRange {
                timestamp: record.timestamp,
                start: self.start_time,
                end: self.end_time,
            });
        }

        let series = match &mut self.data {
            ChunkData::Hot { series } => series,
            ChunkData::Cold { .. } => {
                return Err(StorageError::ColdWriteRejected {
                    start: self.start_time,
                    end: self.end_time,
                })
            }
        };

        let size = record.estimated_size();
        let records = series.entry(record.key.clone()).or_default();

        match records.last() {
            Some(last) if last.timestamp > record.timestamp => {
                let idx = records.partition_point(|r| r.timestamp <= record.timestamp);
                records.insert(idx, record);
            }
            _ => records.push(record),
        }

        self.metadata.record_count += 1;
        self.metadata.size_bytes += size;
        self.touch();
        Ok(())
    }

    /// Run a closure over the series map, decoding cold data transiently
    ///
    /// The decoded form of a cold chunk is dropped when the closure
    /// returns; reads never re-materialize a hot representation.
    fn read_series<R>(
        &self,
        f: impl FnOnce(&HashMap<String, Vec<Record>>) -> R,
    ) -> StorageResult<R> {
        match &self.data {
            ChunkData::Hot { series } => Ok(f(series)),
            ChunkData::Cold { block } => {
                let series = decompress_series(block)?;
                Ok(f(&series))
            }
        }
    }

    /// Records for `key` with `from <= timestamp < to`, in order
    ///
    /// Missing keys and empty ranges produce an empty vector, not an
    /// error.
    pub fn get_range(&self, key: &str, from: i64, to: i64) -> StorageResult<Vec<Record>> {
        self.read_series(|series| {
            let records = match series.get(key) {
                Some(r) => r,
                None => return Vec::new(),
            };
            let lo = records.partition_point(|r| r.timestamp < from);
            let hi = records.partition_point(|r| r.timestamp < to);
            records[lo..hi].to_vec()
        })
    }

    /// The full ordered sequence for `key` (empty if absent)
    pub fn get_metric(&self, key: &str) -> StorageResult<Vec<Record>> {
        self.read_series(|series| series.get(key).cloned().unwrap_or_default())
    }

    /// The most recent record for `key`
    pub fn get_latest(&self, key: &str) -> StorageResult<Option<Record>> {
        self.read_series(|series| series.get(key).and_then(|r| r.last().cloned()))
    }

    /// All series keys present in this chunk
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        self.read_series(|series| series.keys().cloned().collect())
    }

    /// Single-pass min/max/mean/count over the scalar values of `key`
    ///
    /// Fails with `IndexError` when the key is absent or carries no
    /// scalar samples (waveform-only series have nothing to summarize).
    pub fn summarize(&self, key: &str) -> StorageResult<ChunkSummary> {
        self.read_series(|series| {
            series
                .get(key)
                .and_then(|records| {
                    ChunkSummary::from_values(records.iter().filter_map(|r| r.scalar_value()))
                })
                .ok_or_else(|| StorageError::IndexError(key.to_string()))
        })?
    }

    /// Like `summarize`, restricted to `from <= timestamp < to`
    ///
    /// Returns `None` (not an error) when the key or sub-range holds no
    /// scalar data, so callers can fold partial summaries across chunks.
    pub fn summarize_range(
        &self,
        key: &str,
        from: i64,
        to: i64,
    ) -> StorageResult<Option<ChunkSummary>> {
        self.read_series(|series| {
            series.get(key).and_then(|records| {
                let lo = records.partition_point(|r| r.timestamp < from);
                let hi = records.partition_point(|r| r.timestamp < to);
                ChunkSummary::from_values(
                    records[lo..hi].iter().filter_map(|r| r.scalar_value()),
                )
            })
        })
    }

    /// Transition to the compressed, read-only representation
    ///
    /// Idempotent on cold chunks. On failure the hot form is untouched
    /// and remains fully readable.
    pub fn compress(&mut self) -> StorageResult<()> {
        let series = match &self.data {
            ChunkData::Cold { .. } => return Ok(()),
            ChunkData::Hot { series } => series,
        };

        let pre_bytes = self.metadata.size_bytes.max(1);
        let block = compress_series(series)?;

        self.metadata.compression_ratio = pre_bytes as f64 / block.len().max(1) as f64;
        self.metadata.size_bytes = block.len();
        self.data = ChunkData::Cold { block };
        self.touch();
        Ok(())
    }

    /// Transition back to the writable representation (rehydration)
    pub fn decompress(&mut self) -> StorageResult<()> {
        let block = match &self.data {
            ChunkData::Hot { .. } => return Ok(()),
            ChunkData::Cold { block } => block,
        };

        let series = decompress_series(block)?;
        self.metadata.size_bytes = series
            .values()
            .flat_map(|records| records.iter())
            .map(|r| r.estimated_size())
            .sum();
        self.metadata.compression_ratio = 1.0;
        self.data = ChunkData::Hot { series };
        self.touch();
        Ok(())
    }

    /// Encode the hot payload without changing the chunk
    ///
    /// Used by background demotion: the expensive encode runs under a
    /// read lock, and the returned version is checked by
    /// `install_compressed` before swapping. Returns `None` if the chunk
    /// is already cold.
    pub fn prepare_compressed(&self) -> StorageResult<Option<(CompressedBlock, u64)>> {
        match &self.data {
            ChunkData::Cold { .. } => Ok(None),
            ChunkData::Hot { series } => {
                let block = compress_series(series)?;
                Ok(Some((block, self.metadata.version)))
            }
        }
    }

    /// Swap in a block prepared by `prepare_compressed`
    ///
    /// Refuses the swap (returning false) if the chunk mutated since the
    /// block was prepared or is already cold.
    pub fn install_compressed(&mut self, block: CompressedBlock, prepared_version: u64) -> bool {
        if self.is_cold() || self.metadata.version != prepared_version {
            return false;
        }
        let pre_bytes = self.metadata.size_bytes.max(1);
        self.metadata.compression_ratio = pre_bytes as f64 / block.len().max(1) as f64;
        self.metadata.size_bytes = block.len();
        self.data = ChunkData::Cold { block };
        self.touch();
        true
    }

    /// Re-check the window and ordering invariants
    pub fn validate(&self) -> StorageResult<()> {
        if self.end_time <= self.start_time {
            return Err(StorageError::ValidationFailed(format!(
                "chunk window [{}, {}) is empty or inverted",
                self.start_time, self.end_time
            )));
        }

        self.read_series(|series| {
            for (key, records) in series {
                let mut prev: Option<i64> = None;
                for record in records {
                    if record.timestamp < self.start_time || record.timestamp >= self.end_time {
                        return Err(StorageError::ValidationFailed(format!(
                            "{}: timestamp {} outside window [{}, {})",
                            key, record.timestamp, self.start_time, self.end_time
                        )));
                    }
                    if let Some(p) = prev {
                        if record.timestamp < p {
                            return Err(StorageError::ValidationFailed(format!(
                                "{}: timestamps out of order at {}",
                                key, record.timestamp
                            )));
                        }
                    }
                    prev = Some(record.timestamp);
                }
            }
            Ok(())
        })?
    }

    /// Combine another chunk into this one
    ///
    /// Windows must be adjacent or overlapping; merging disjoint chunks
    /// is ambiguous and rejected. Both chunks must be hot (cold chunks
    /// are read-only; rehydrate first). The result covers the union of
    /// both windows with per-key sequences re-sorted.
    pub fn merge(&mut self, other: TimeChunk) -> StorageResult<()> {
        if other.start_time > self.end_time || other.end_time < self.start_time {
            return Err(StorageError::InvalidRange(format!(
                "cannot merge disjoint windows [{}, {}) and [{}, {})",
                self.start_time, self.end_time, other.start_time, other.end_time
            )));
        }

        let other_series = match other.data {
            ChunkData::Hot { series } => series,
            ChunkData::Cold { .. } => {
                return Err(StorageError::ColdWriteRejected {
                    start: other.start_time,
                    end: other.end_time,
                })
            }
        };
        let series = match &mut self.data {
            ChunkData::Hot { series } => series,
            ChunkData::Cold { .. } => {
                return Err(StorageError::ColdWriteRejected {
                    start: self.start_time,
                    end: self.end_time,
                })
            }
        };

        for (key, records) in other_series {
            let merged = series.entry(key).or_default();
            merged.extend(records);
            merged.sort_by_key(|r| r.timestamp);
        }

        self.start_time = self.start_time.min(other.start_time);
        self.end_time = self.end_time.max(other.end_time);
        self.metadata.record_count += other.metadata.record_count;
        self.metadata.size_bytes += other.metadata.size_bytes;
        self.touch();
        Ok(())
    }

    /// Drop records older than `retain_after`, returning how many went
    pub fn cleanup(&mut self, retain_after: i64) -> StorageResult<usize> {
        let series = match &mut self.data {
            ChunkData::Hot { series } => series,
            ChunkData::Cold { .. } => {
                return Err(StorageError::ColdWriteRejected {
                    start: self.start_time,
                    end: self.end_time,
                })
            }
        };

        let mut removed = 0;
        let mut removed_bytes = 0;
        series.retain(|_, records| {
            let cut = records.partition_point(|r| r.timestamp < retain_after);
            for record in records.drain(..cut) {
                removed += 1;
                removed_bytes += record.estimated_size();
            }
            !records.is_empty()
        });

        if removed > 0 {
            self.metadata.record_count -= removed;
            self.metadata.size_bytes = self.metadata.size_bytes.saturating_sub(removed_bytes);
            self.touch();
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::Waveform;

    fn hr(ts: i64, value: f64) -> Record {
        Record::scalar("p1|8867-4|bpm", ts, value)
    }

    #[test]
    fn test_new_rejects_inverted_window() {
        assert!(matches!(
            TimeChunk::new(100, 100),
            Err(StorageError::InvalidRange(_))
        ));
        assert!(matches!(
            TimeChunk::new(100, 50),
            Err(StorageError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_append_and_read_roundtrip() {
        let mut chunk = TimeChunk::new(0, 3600).unwrap();
        for i in 0..60 {
            chunk.append(hr(i * 60, 70.0 + i as f64)).unwrap();
        }

        let records = chunk.get_range("p1|8867-4|bpm", 0, 3600).unwrap();
        assert_eq!(records.len(), 60);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.timestamp, i as i64 * 60);
        }
    }

    #[test]
    fn test_out_of_order_append_lands_sorted() {
        let mut chunk = TimeChunk::new(0, 3600).unwrap();
        chunk.append(hr(300, 72.0)).unwrap();
        chunk.append(hr(100, 70.0)).unwrap();
        chunk.append(hr(200, 71.0)).unwrap();
        chunk.append(hr(200, 71.5)).unwrap(); // duplicate timestamp tolerated

        let records = chunk.get_metric("p1|8867-4|bpm").unwrap();
        let timestamps: Vec<i64> = records.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200, 200, 300]);
    }

    #[test]
    fn test_append_out_of_range_leaves_metadata_unchanged() {
        let mut chunk = TimeChunk::new(0, 3600).unwrap();
        chunk.append(hr(100, 70.0)).unwrap();
        let before = chunk.metadata().clone();

        let err = chunk.append(hr(3600, 70.0)).unwrap_err();
        assert!(matches!(err, StorageError::OutOfTimeRange { .. }));
        let err = chunk.append(hr(-1, 70.0)).unwrap_err();
        assert!(matches!(err, StorageError::OutOfTimeRange { .. }));

        assert_eq!(chunk.metadata().record_count, before.record_count);
        assert_eq!(chunk.metadata().size_bytes, before.size_bytes);
        assert_eq!(chunk.metadata().version, before.version);
    }

    #[test]
    fn test_get_range_binary_search_bounds() {
        let mut chunk = TimeChunk::new(0, 1000).unwrap();
        for ts in [100, 200, 300, 400, 500] {
            chunk.append(hr(ts, ts as f64)).unwrap();
        }

        let records = chunk.get_range("p1|8867-4|bpm", 200, 400).unwrap();
        let timestamps: Vec<i64> = records.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![200, 300]); // half-open: 400 excluded

        assert!(chunk.get_range("p1|8867-4|bpm", 600, 900).unwrap().is_empty());
        assert!(chunk.get_range("absent", 0, 1000).unwrap().is_empty());
    }

    #[test]
    fn test_get_latest() {
        let mut chunk = TimeChunk::new(0, 1000).unwrap();
        assert_eq!(chunk.get_latest("p1|8867-4|bpm").unwrap(), None);

        chunk.append(hr(100, 70.0)).unwrap();
        chunk.append(hr(500, 75.0)).unwrap();
        chunk.append(hr(300, 72.0)).unwrap();

        let latest = chunk.get_latest("p1|8867-4|bpm").unwrap().unwrap();
        assert_eq!(latest.timestamp, 500);
    }

    #[test]
    fn test_summarize() {
        let mut chunk = TimeChunk::new(0, 1000).unwrap();
        for (ts, v) in [(100, 70.0), (200, 80.0), (300, 90.0)] {
            chunk.append(hr(ts, v)).unwrap();
        }

        let summary = chunk.summarize("p1|8867-4|bpm").unwrap();
        assert_eq!(summary.min, 70.0);
        assert_eq!(summary.max, 90.0);
        assert_eq!(summary.count, 3);
        assert!((summary.mean() - 80.0).abs() < f64::EPSILON);

        assert!(matches!(
            chunk.summarize("absent"),
            Err(StorageError::IndexError(_))
        ));
    }

    #[test]
    fn test_summarize_skips_waveforms() {
        let mut chunk = TimeChunk::new(0, 1000).unwrap();
        chunk.append(hr(100, 70.0)).unwrap();
        chunk
            .append(Record::waveform(
                "p1|8867-4|bpm",
                200,
                Waveform {
                    origin: 0.0,
                    period: 0.004,
                    factor: 1.0,
                    samples: vec![1.0, 2.0],
                },
            ))
            .unwrap();

        let summary = chunk.summarize("p1|8867-4|bpm").unwrap();
        assert_eq!(summary.count, 1);
    }

    #[test]
    fn test_compress_preserves_reads() {
        let mut chunk = TimeChunk::new(0, 3600).unwrap();
        for i in 0..100 {
            chunk.append(hr(i * 30, 70.0 + (i as f64 * 0.1).sin())).unwrap();
        }

        let before_range = chunk.get_range("p1|8867-4|bpm", 600, 1800).unwrap();
        let before_summary = chunk.summarize("p1|8867-4|bpm").unwrap();

        chunk.compress().unwrap();
        assert!(chunk.is_cold());
        assert!(chunk.metadata().compression_ratio > 1.0);

        assert_eq!(chunk.get_range("p1|8867-4|bpm", 600, 1800).unwrap(), before_range);
        assert_eq!(chunk.summarize("p1|8867-4|bpm").unwrap(), before_summary);

        // Idempotent
        chunk.compress().unwrap();
        assert!(chunk.is_cold());
    }

    #[test]
    fn test_compress_failure_keeps_hot_data_readable() {
        let mut chunk = TimeChunk::new(0, 3600).unwrap();
        chunk.append(hr(100, 70.0)).unwrap();
        chunk.append(hr(200, f64::NAN)).unwrap();

        let err = chunk.compress().unwrap_err();
        assert!(matches!(err, StorageError::CompressionFailed(_)));
        assert!(chunk.is_hot());
        assert_eq!(chunk.get_metric("p1|8867-4|bpm").unwrap().len(), 2);
    }

    #[test]
    fn test_cold_rejects_writes() {
        let mut chunk = TimeChunk::new(0, 3600).unwrap();
        chunk.append(hr(100, 70.0)).unwrap();
        chunk.compress().unwrap();

        assert!(matches!(
            chunk.append(hr(200, 71.0)),
            Err(StorageError::ColdWriteRejected { .. })
        ));
        assert!(matches!(
            chunk.cleanup(50),
            Err(StorageError::ColdWriteRejected { .. })
        ));
    }

    #[test]
    fn test_decompress_restores_writes() {
        let mut chunk = TimeChunk::new(0, 3600).unwrap();
        chunk.append(hr(100, 70.0)).unwrap();
        chunk.compress().unwrap();
        chunk.decompress().unwrap();

        assert!(chunk.is_hot());
        chunk.append(hr(200, 71.0)).unwrap();
        assert_eq!(chunk.metadata().record_count, 2);
    }

    #[test]
    fn test_install_compressed_detects_racing_mutation() {
        let mut chunk = TimeChunk::new(0, 3600).unwrap();
        chunk.append(hr(100, 70.0)).unwrap();

        let (block, version) = chunk.prepare_compressed().unwrap().unwrap();

        // A write sneaks in between prepare and install
        chunk.append(hr(200, 71.0)).unwrap();
        assert!(!chunk.install_compressed(block, version));
        assert!(chunk.is_hot());

        // A clean prepare/install cycle succeeds
        let (block, version) = chunk.prepare_compressed().unwrap().unwrap();
        assert!(chunk.install_compressed(block, version));
        assert!(chunk.is_cold());
    }

    #[test]
    fn test_validate() {
        let mut chunk = TimeChunk::new(0, 3600).unwrap();
        chunk.append(hr(100, 70.0)).unwrap();
        chunk.append(hr(50, 69.0)).unwrap();
        chunk.validate().unwrap();

        chunk.compress().unwrap();
        chunk.validate().unwrap();
    }

    #[test]
    fn test_merge_adjacent_windows() {
        let mut first = TimeChunk::new(0, 3600).unwrap();
        let mut second = TimeChunk::new(3600, 7200).unwrap();

        first.append(hr(100, 70.0)).unwrap();
        first.append(hr(3599, 71.0)).unwrap();
        second.append(hr(3600, 72.0)).unwrap();
        second.append(hr(7000, 73.0)).unwrap();

        first.merge(second).unwrap();

        assert_eq!(first.start_time(), 0);
        assert_eq!(first.end_time(), 7200);
        assert_eq!(first.metadata().record_count, 4);

        let records = first.get_metric("p1|8867-4|bpm").unwrap();
        let timestamps: Vec<i64> = records.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![100, 3599, 3600, 7000]);
        first.validate().unwrap();
    }

    #[test]
    fn test_merge_disjoint_rejected() {
        let mut first = TimeChunk::new(0, 3600).unwrap();
        let second = TimeChunk::new(7200, 10800).unwrap();

        assert!(matches!(
            first.merge(second),
            Err(StorageError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_cleanup_drops_old_records() {
        let mut chunk = TimeChunk::new(0, 3600).unwrap();
        for ts in [100, 200, 300, 400] {
            chunk.append(hr(ts, 70.0)).unwrap();
        }

        let removed = chunk.cleanup(250).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(chunk.metadata().record_count, 2);

        let records = chunk.get_metric("p1|8867-4|bpm").unwrap();
        assert_eq!(records[0].timestamp, 300);

        // Nothing left below the cutoff
        assert_eq!(chunk.cleanup(250).unwrap(), 0);
    }
}
