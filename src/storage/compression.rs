//! Compression module for PulseDB chunk payloads
//!
//! Implements delta encoding + LZ4 compression for cold chunk storage.
//!
//! Strategy:
//! 1. Delta-encode timestamps per series (sequences are already sorted)
//! 2. Serialize the series map to a compact binary format
//! 3. LZ4 compress the result
//! 4. Checksum the compressed bytes with CRC32
//!
//! The codec stores only finite numbers; NaN and infinity are rejected
//! before encoding so a failed `compress` leaves the hot form untouched.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{Record, Value, Waveform};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serialized payload of a value, waveform parameters inlined
#[derive(Debug, Serialize, Deserialize)]
enum EncodedValue {
    Scalar(f64),
    Waveform {
        origin: f64,
        period: f64,
        factor: f64,
        samples: Vec<f64>,
    },
}

/// One series: base timestamp plus deltas, values in the same order
#[derive(Debug, Serialize, Deserialize)]
struct EncodedSeries {
    key: String,
    base_timestamp: i64,
    timestamp_deltas: Vec<i64>,
    values: Vec<EncodedValue>,
}

/// Intermediate format for a whole chunk payload
#[derive(Debug, Serialize, Deserialize)]
struct EncodedChunk {
    series: Vec<EncodedSeries>,
}

/// A compressed chunk payload ready for cold storage
#[derive(Debug, Clone)]
pub struct CompressedBlock {
    /// LZ4-compressed bytes
    pub data: Vec<u8>,
    /// CRC32 of `data`, verified on every read
    pub checksum: u32,
    /// Serialized size before LZ4, for compression accounting
    pub uncompressed_len: usize,
}

impl CompressedBlock {
    /// Compressed size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Compress a chunk's series map into a cold block
///
/// Fails with `CompressionFailed` if any record carries a non-finite
/// value; the input is not modified.
pub fn compress_series(series: &HashMap<String, Vec<Record>>) -> StorageResult<CompressedBlock> {
    for (key, records) in series {
        for record in records {
            if !record.value.is_finite() {
                return Err(StorageError::CompressionFailed(format!(
                    "non-finite value for {} at {}",
                    key, record.timestamp
                )));
            }
        }
    }

    let mut encoded = EncodedChunk {
        series: Vec::with_capacity(series.len()),
    };

    // Deterministic series order keeps identical payloads byte-identical
    let mut keys: Vec<&String> = series.keys().collect();
    keys.sort();

    for key in keys {
        let records = &series[key];
        let base_timestamp = records.first().map(|r| r.timestamp).unwrap_or(0);

        let mut timestamp_deltas = Vec::with_capacity(records.len());
        let mut values = Vec::with_capacity(records.len());
        let mut prev_ts = base_timestamp;

        for record in records {
            timestamp_deltas.push(record.timestamp - prev_ts);
            prev_ts = record.timestamp;

            values.push(match &record.value {
                Value::Scalar(v) => EncodedValue::Scalar(*v),
                Value::Waveform(w) => EncodedValue::Waveform {
                    origin: w.origin,
                    period: w.period,
                    factor: w.factor,
                    samples: w.samples.clone(),
                },
            });
        }

        encoded.series.push(EncodedSeries {
            key: key.clone(),
            base_timestamp,
            timestamp_deltas,
            values,
        });
    }

    let serialized = bincode::serialize(&encoded)?;
    let uncompressed_len = serialized.len();
    let data = lz4_flex::compress_prepend_size(&serialized);
    let checksum = crc32fast::hash(&data);

    Ok(CompressedBlock {
        data,
        checksum,
        uncompressed_len,
    })
}

/// Decompress a cold block back into a series map
///
/// Verifies the CRC32 checksum first and fails with `DataCorrupted` on
/// mismatch, so truncated or bit-flipped blocks never decode silently.
pub fn decompress_series(block: &CompressedBlock) -> StorageResult<HashMap<String, Vec<Record>>> {
    let computed = crc32fast::hash(&block.data);
    if computed != block.checksum {
        return Err(StorageError::DataCorrupted(format!(
            "chunk checksum mismatch: stored={}, computed={}",
            block.checksum, computed
        )));
    }

    let serialized = lz4_flex::decompress_size_prepended(&block.data)
        .map_err(|e| StorageError::DataCorrupted(format!("LZ4 decompression failed: {}", e)))?;

    let encoded: EncodedChunk = bincode::deserialize(&serialized)?;

    let mut series = HashMap::with_capacity(encoded.series.len());
    for s in encoded.series {
        let mut records = Vec::with_capacity(s.timestamp_deltas.len());
        let mut timestamp = s.base_timestamp;

        for (delta, value) in s.timestamp_deltas.into_iter().zip(s.values) {
            timestamp += delta;
            let value = match value {
                EncodedValue::Scalar(v) => Value::Scalar(v),
                EncodedValue::Waveform {
                    origin,
                    period,
                    factor,
                    samples,
                } => Value::Waveform(Waveform {
                    origin,
                    period,
                    factor,
                    samples,
                }),
            };
            records.push(Record {
                timestamp,
                key: s.key.clone(),
                value,
            });
        }

        series.insert(s.key, records);
    }

    Ok(series)
}
