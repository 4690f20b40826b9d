//! Change-point detection
//!
//! Detects abrupt level shifts in a single series.
//!
//! CUSUM tracks two-sided cumulative deviations from the running mean of
//! the current segment and flags a change when either sum clears the
//! decision threshold, resetting the segment at each flagged point. A
//! zero-variance segment treats any departure from its level as an
//! immediate shift.
//!
//! PELT performs exact segmentation: dynamic programming over a Gaussian
//! mean-shift cost (sum of squared residuals via prefix sums) with a
//! per-segment penalty and candidate pruning, trading more computation
//! for a globally optimal set of change points.

use crate::detect::stats;
use crate::detect::{ChangepointMethod, DetectionEvent, EventKind, EventSpan};
use serde::Serialize;

/// Minimum points per PELT segment
const MIN_SEGMENT: usize = 5;

/// A detected level shift
#[derive(Debug, Clone, Serialize)]
pub struct ChangePoint {
    /// First timestamp of the new level
    pub timestamp: i64,
    pub before_mean: f64,
    pub after_mean: f64,
    pub magnitude: f64,
    /// Normalized confidence in (0, 1]
    pub score: f64,
}

/// Ordered change points for one series
#[derive(Debug, Clone, Serialize)]
pub struct ChangepointReport {
    pub key: String,
    pub method: ChangepointMethod,
    pub points: Vec<ChangePoint>,
}

impl ChangepointReport {
    /// Just the ordered change-point timestamps
    pub fn timestamps(&self) -> Vec<i64> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    /// Detection events for the flagged shifts
    pub fn events(&self) -> Vec<DetectionEvent> {
        self.points
            .iter()
            .map(|p| DetectionEvent {
                keys: vec![self.key.clone()],
                span: EventSpan::At(p.timestamp),
                kind: EventKind::ChangePoint,
                score: p.score,
            })
            .collect()
    }
}

struct PendingPoint {
    idx: usize,
    before_mean: f64,
    score: f64,
}

/// CUSUM change detection over a sorted (timestamp, value) series
pub fn cusum(samples: &[(i64, f64)], threshold: f64) -> Vec<ChangePoint> {
    let n = samples.len();
    if n < 3 {
        return Vec::new();
    }

    let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();

    // Welford accumulator over the current segment
    let mut count = 0.0f64;
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    let mut s_pos = 0.0f64;
    let mut s_neg = 0.0f64;

    let mut pending: Vec<PendingPoint> = Vec::new();

    for (i, &x) in values.iter().enumerate() {
        let mut flagged_score = None;

        if count >= 2.0 {
            let stddev = (m2 / (count - 1.0)).max(0.0).sqrt();
            let dev = x - mean;

            if stddev > 0.0 {
                let slack = 0.5 * stddev;
                let decision = threshold * stddev;
                s_pos = (s_pos + dev - slack).max(0.0);
                s_neg = (s_neg - dev - slack).max(0.0);
                if s_pos > decision || s_neg > decision {
                    flagged_score = Some((s_pos.max(s_neg) / decision).min(1.0));
                }
            } else if dev != 0.0 {
                // Zero-variance segment: any departure is a shift
                flagged_score = Some(1.0);
            }
        }

        match flagged_score {
            Some(score) => {
                pending.push(PendingPoint {
                    idx: i,
                    before_mean: mean,
                    score,
                });
                // New segment starts at the flagged point
                count = 1.0;
                mean = x;
                m2 = 0.0;
                s_pos = 0.0;
                s_neg = 0.0;
            }
            None => {
                count += 1.0;
                let delta = x - mean;
                mean += delta / count;
                m2 += delta * (x - mean);
            }
        }
    }

    pending
        .iter()
        .enumerate()
        .map(|(j, p)| {
            let seg_end = pending.get(j + 1).map(|q| q.idx).unwrap_or(n);
            let after_mean = stats::mean(&values[p.idx..seg_end]);
            ChangePoint {
                timestamp: samples[p.idx].0,
                before_mean: p.before_mean,
                after_mean,
                magnitude: (after_mean - p.before_mean).abs(),
                score: p.score,
            }
        })
        .collect()
}

/// PELT change detection over a sorted (timestamp, value) series
///
/// Boundaries from the optimal segmentation are reported as change
/// points when the level shift clears `threshold` standard deviations,
/// matching the CUSUM scale.
pub fn pelt(samples: &[(i64, f64)], threshold: f64, penalty: f64) -> Vec<ChangePoint> {
    let n = samples.len();
    if n < 2 * MIN_SEGMENT {
        return Vec::new();
    }

    let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();

    // Prefix sums for O(1) segment cost
    let mut sum = vec![0.0f64; n + 1];
    let mut sum_sq = vec![0.0f64; n + 1];
    for (i, &v) in values.iter().enumerate() {
        sum[i + 1] = sum[i] + v;
        sum_sq[i + 1] = sum_sq[i] + v * v;
    }

    // Sum of squared residuals of the segment [a, b)
    let cost = |a: usize, b: usize| -> f64 {
        let len = (b - a) as f64;
        let s = sum[b] - sum[a];
        (sum_sq[b] - sum_sq[a]) - s * s / len
    };

    let mut best = vec![f64::INFINITY; n + 1];
    best[0] = -penalty;
    let mut prev = vec![0usize; n + 1];
    let mut candidates: Vec<usize> = vec![0];

    for t in MIN_SEGMENT..=n {
        let mut min_cost = f64::INFINITY;
        let mut min_s = 0;
        for &s in &candidates {
            if t < s + MIN_SEGMENT {
                continue;
            }
            let c = best[s] + cost(s, t) + penalty;
            if c < min_cost {
                min_cost = c;
                min_s = s;
            }
        }
        best[t] = min_cost;
        prev[t] = min_s;

        // Prune candidates that can never win again
        candidates.retain(|&s| t < s + MIN_SEGMENT || best[s] + cost(s, t) <= best[t]);
        candidates.push(t);
    }

    // Backtrack the optimal segmentation
    let mut boundaries = Vec::new();
    let mut t = n;
    while t > 0 {
        let s = prev[t];
        if s > 0 {
            boundaries.push(s);
        }
        t = s;
    }
    boundaries.reverse();

    let stddev = stats::sample_stddev(&values);
    if stddev == 0.0 {
        return Vec::new();
    }
    let min_magnitude = threshold * stddev;

    let mut points = Vec::new();
    for (j, &b) in boundaries.iter().enumerate() {
        let seg_start = if j > 0 { boundaries[j - 1] } else { 0 };
        let seg_end = boundaries.get(j + 1).copied().unwrap_or(n);

        let before_mean = stats::mean(&values[seg_start..b]);
        let after_mean = stats::mean(&values[b..seg_end]);
        let magnitude = (after_mean - before_mean).abs();

        if magnitude > min_magnitude {
            points.push(ChangePoint {
                timestamp: samples[b].0,
                before_mean,
                after_mean,
                magnitude,
                score: (magnitude / min_magnitude).min(1.0),
            });
        }
    }

    points
}
