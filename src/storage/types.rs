//! Core data types for the PulseDB storage engine
//!
//! This module defines the fundamental types used throughout the storage layer:
//! - `Record`: a single immutable measurement, scalar or waveform
//! - `Value` / `Waveform`: the measurement payload
//! - `TimeRange`: a half-open time interval for queries
//! - `KeySelector`: exact-key or segment-filter series selection

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A sampled waveform segment (e.g. a few seconds of ECG).
///
/// Decoded sample `i` has the value `origin + samples[i] * factor`,
/// taken `i * period` seconds after the record's timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Waveform {
    /// Baseline offset added to every decoded sample
    pub origin: f64,
    /// Sampling interval in seconds
    pub period: f64,
    /// Scale applied to raw sample values
    pub factor: f64,
    /// Raw sample values, in sampling order
    pub samples: Vec<f64>,
}

impl Waveform {
    /// Decode the sample at `index`, if present
    pub fn decode(&self, index: usize) -> Option<f64> {
        self.samples.get(index).map(|s| self.origin + s * self.factor)
    }

    /// Number of raw samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True when origin, period, factor and every sample are finite
    pub fn is_finite(&self) -> bool {
        self.origin.is_finite()
            && self.period.is_finite()
            && self.factor.is_finite()
            && self.samples.iter().all(|s| s.is_finite())
    }
}

/// The measured value of a record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    /// A single numeric measurement (heart rate, SpO2, ...)
    Scalar(f64),
    /// An ordered waveform segment with its sampling parameters
    Waveform(Waveform),
}

impl Value {
    /// The scalar payload, if this value is a scalar
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Waveform(_) => None,
        }
    }

    /// True when every numeric component is finite
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Scalar(v) => v.is_finite(),
            Value::Waveform(w) => w.is_finite(),
        }
    }

    /// Estimated in-memory size in bytes (for buffer accounting)
    pub fn estimated_size(&self) -> usize {
        match self {
            Value::Scalar(_) => 8,
            Value::Waveform(w) => 24 + w.samples.len() * 8 + 24, // header + samples + Vec overhead
        }
    }
}

/// A single time-series record
///
/// The identity key is the composite `"subject|code|unit"` string built by
/// the record-format translation layer. Records are immutable once created;
/// duplicate (key, timestamp) pairs are stored as repeated entries and
/// never merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    /// Composite series identity ("subject|code|unit")
    pub key: String,
    /// Measurement payload
    pub value: Value,
}

impl Record {
    /// Create a scalar record
    pub fn scalar(key: impl Into<String>, timestamp: i64, value: f64) -> Self {
        Self {
            timestamp,
            key: key.into(),
            value: Value::Scalar(value),
        }
    }

    /// Create a waveform record
    pub fn waveform(key: impl Into<String>, timestamp: i64, waveform: Waveform) -> Self {
        Self {
            timestamp,
            key: key.into(),
            value: Value::Waveform(waveform),
        }
    }

    /// The scalar payload, if any; waveform records return `None`
    pub fn scalar_value(&self) -> Option<f64> {
        self.value.as_scalar()
    }

    /// Get estimated size in bytes (for buffer management)
    pub fn estimated_size(&self) -> usize {
        // Base: timestamp(8) + String overhead(24)
        8 + self.key.len() + 24 + self.value.estimated_size()
    }
}

/// Selects which series a query addresses
///
/// `Key` matches exactly one series. `Filter` matches every key that has
/// the given string as one of its `|`-separated segments, so
/// `Filter("8867-4")` selects the heart-rate series of every subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelector {
    /// Exact composite key
    Key(String),
    /// Match any key containing this segment
    Filter(String),
}

impl KeySelector {
    /// Check whether a composite key matches this selector
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeySelector::Key(k) => key == k,
            KeySelector::Filter(segment) => key.split('|').any(|s| s == segment),
        }
    }
}

/// Time range for queries (half-open interval: [start, end))
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Start timestamp (inclusive), in seconds
    pub start: i64,
    /// End timestamp (exclusive), in seconds
    pub end: i64,
}

impl TimeRange {
    /// Create a time range, returning None if invalid
    pub fn try_new(start: i64, end: i64) -> Option<Self> {
        if start < end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Create a new time range
    ///
    /// # Panics
    /// Panics if start >= end
    pub fn new(start: i64, end: i64) -> Self {
        assert!(start < end, "TimeRange: start must be less than end");
        Self { start, end }
    }

    /// Range from `start` until now
    pub fn since(start: i64) -> Self {
        let end = Utc::now().timestamp();
        Self {
            start,
            end: end.max(start + 1),
        }
    }

    /// Create a range for the last N hours from now
    pub fn last_hours(hours: i64) -> Self {
        let end = Utc::now().timestamp();
        Self {
            start: end - hours * 3600,
            end,
        }
    }

    /// Create a range for the last N days from now
    pub fn last_days(days: i64) -> Self {
        Self::last_hours(days * 24)
    }

    /// Check if a timestamp falls within this range
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Check if this range overlaps with another
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> i64 {
        self.end - self.start
    }

    /// Get intersection with another range, if any
    pub fn intersection(&self, other: &TimeRange) -> Option<Self> {
        Self::try_new(self.start.max(other.start), self.end.min(other.end))
    }
}

/// A single aggregated trend bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrendPoint {
    /// Bucket start timestamp
    pub timestamp: i64,
    /// Mean of the scalar values in the bucket
    pub value: f64,
}

/// One trend series per selected key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendSeries {
    pub key: String,
    pub points: Vec<TrendPoint>,
}

/// Rate of change at a point in time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RatePoint {
    /// Timestamp of the later sample of the pair
    pub timestamp: i64,
    /// Value delta per `period` seconds
    pub rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_record() {
        let record = Record::scalar("p1|8867-4|bpm", 1000, 72.0);
        assert_eq!(record.scalar_value(), Some(72.0));
        assert!(record.value.is_finite());
    }

    #[test]
    fn test_waveform_decode() {
        let wave = Waveform {
            origin: 0.5,
            period: 0.004,
            factor: 0.001,
            samples: vec![100.0, -200.0, 300.0],
        };
        assert_eq!(wave.len(), 3);
        assert_eq!(wave.decode(0), Some(0.6));
        assert_eq!(wave.decode(1), Some(0.3));
        assert_eq!(wave.decode(3), None);

        let record = Record::waveform("p1|ecg|mV", 1000, wave);
        assert_eq!(record.scalar_value(), None);
    }

    #[test]
    fn test_non_finite_detection() {
        assert!(!Value::Scalar(f64::NAN).is_finite());
        assert!(!Value::Scalar(f64::INFINITY).is_finite());

        let wave = Waveform {
            origin: 0.0,
            period: 1.0,
            factor: 1.0,
            samples: vec![1.0, f64::NAN],
        };
        assert!(!Value::Waveform(wave).is_finite());
    }

    #[test]
    fn test_record_serialization() {
        let record = Record::scalar("p1|2708-6|%", 1700000000, 97.0);
        let json = serde_json::to_string(&record).unwrap();
        let restored: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(record, restored);
    }

    #[test]
    fn test_key_selector() {
        let selector = KeySelector::Filter("8867-4".to_string());
        assert!(selector.matches("p1|8867-4|bpm"));
        assert!(selector.matches("p2|8867-4|bpm"));
        assert!(!selector.matches("p1|2708-6|%"));
        assert!(!selector.matches("p1|x8867-4|bpm"));

        let exact = KeySelector::Key("p1|8867-4|bpm".to_string());
        assert!(exact.matches("p1|8867-4|bpm"));
        assert!(!exact.matches("p2|8867-4|bpm"));
    }

    #[test]
    fn test_time_range_contains() {
        let range = TimeRange::new(1000, 2000);

        assert!(!range.contains(999));
        assert!(range.contains(1000));
        assert!(range.contains(1500));
        assert!(range.contains(1999));
        assert!(!range.contains(2000));
    }

    #[test]
    fn test_time_range_overlaps() {
        let range1 = TimeRange::new(1000, 2000);
        let range2 = TimeRange::new(1500, 2500);
        let range3 = TimeRange::new(2000, 3000);

        assert!(range1.overlaps(&range2));
        assert!(!range1.overlaps(&range3)); // Adjacent, not overlapping
    }

    #[test]
    fn test_time_range_intersection() {
        let range1 = TimeRange::new(1000, 2000);
        let range2 = TimeRange::new(1500, 2500);
        assert_eq!(
            range1.intersection(&range2),
            Some(TimeRange::new(1500, 2000))
        );

        let disjoint = TimeRange::new(3000, 4000);
        assert_eq!(range1.intersection(&disjoint), None);
    }
}
