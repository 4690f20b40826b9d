//! Seasonal decomposition
//!
//! Splits a single series into trend + seasonal + residual components
//! over a configured period, using additive or multiplicative
//! composition. The trend is an index-based centered moving average; the
//! seasonal pattern is the per-cycle-position average of the detrended
//! values, normalized to zero sum (additive) or unit mean
//! (multiplicative).

use crate::detect::error::{DetectError, DetectResult};
use crate::detect::stats;
use crate::detect::{DetectionEvent, EventKind, EventSpan, SeasonalConfig, SeasonalMethod};
use serde::Serialize;

/// Residual z-score above which a decomposition emits an event
const RESIDUAL_EVENT_SIGMA: f64 = 3.0;

/// Result of decomposing one series
#[derive(Debug, Clone, Serialize)]
pub struct SeasonalDecomposition {
    pub key: String,
    /// Configured period in seconds
    pub period: i64,
    /// Samples per period as estimated from the series' cadence
    pub period_samples: usize,
    pub method: SeasonalMethod,
    pub trend: Vec<(i64, f64)>,
    pub seasonal: Vec<(i64, f64)>,
    pub residual: Vec<(i64, f64)>,
}

impl SeasonalDecomposition {
    /// Detection events for residuals the composition cannot explain
    pub fn events(&self) -> Vec<DetectionEvent> {
        let values: Vec<f64> = self.residual.iter().map(|(_, v)| *v).collect();
        let mean = stats::mean(&values);
        let stddev = stats::population_stddev(&values);
        if stddev == 0.0 {
            return Vec::new();
        }

        self.residual
            .iter()
            .filter_map(|(ts, v)| {
                let z = (v - mean).abs() / stddev;
                if z > RESIDUAL_EVENT_SIGMA {
                    Some(DetectionEvent {
                        keys: vec![self.key.clone()],
                        span: EventSpan::At(*ts),
                        kind: EventKind::SeasonalResidual,
                        score: z,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Decompose a sorted (timestamp, value) series
pub(crate) fn decompose(
    key: &str,
    samples: &[(i64, f64)],
    config: &SeasonalConfig,
) -> DetectResult<SeasonalDecomposition> {
    let n = samples.len();
    if n < config.min_data_points {
        return Err(DetectError::InsufficientData {
            needed: config.min_data_points,
            got: n,
        });
    }

    let timestamps: Vec<i64> = samples.iter().map(|(ts, _)| *ts).collect();
    let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();

    let period_samples = estimate_period_samples(&timestamps, config.period).clamp(2, n.max(2));

    // Trend: centered moving average, one full period wide
    let half = period_samples / 2;
    let trend_values: Vec<f64> = (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            stats::mean(&values[lo..hi])
        })
        .collect();

    // Average detrended value at each position in the cycle
    let mut pattern = vec![0.0; period_samples];
    let mut counts = vec![0usize; period_samples];
    for i in 0..n {
        let position = i % period_samples;
        match config.method {
            SeasonalMethod::Additive => {
                pattern[position] += values[i] - trend_values[i];
                counts[position] += 1;
            }
            SeasonalMethod::Multiplicative => {
                if trend_values[i] != 0.0 {
                    pattern[position] += values[i] / trend_values[i];
                    counts[position] += 1;
                }
            }
        }
    }
    for (p, c) in pattern.iter_mut().zip(&counts) {
        if *c > 0 {
            *p /= *c as f64;
        } else if matches!(config.method, SeasonalMethod::Multiplicative) {
            *p = 1.0;
        }
    }

    // Normalize: seasonal effects sum to zero (additive) or average to
    // one (multiplicative), so the trend keeps the level
    match config.method {
        SeasonalMethod::Additive => {
            let offset = stats::mean(&pattern);
            for p in pattern.iter_mut() {
                *p -= offset;
            }
        }
        SeasonalMethod::Multiplicative => {
            let scale = stats::mean(&pattern);
            if scale != 0.0 {
                for p in pattern.iter_mut() {
                    *p /= scale;
                }
            }
        }
    }

    let mut trend = Vec::with_capacity(n);
    let mut seasonal = Vec::with_capacity(n);
    let mut residual = Vec::with_capacity(n);

    for i in 0..n {
        let t = trend_values[i];
        let s = pattern[i % period_samples];
        let r = match config.method {
            SeasonalMethod::Additive => values[i] - t - s,
            SeasonalMethod::Multiplicative => {
                let denom = t * s;
                if denom != 0.0 {
                    values[i] / denom
                } else {
                    values[i]
                }
            }
        };

        trend.push((timestamps[i], t));
        seasonal.push((timestamps[i], s));
        residual.push((timestamps[i], r));
    }

    Ok(SeasonalDecomposition {
        key: key.to_string(),
        period: config.period,
        period_samples,
        method: config.method,
        trend,
        seasonal,
        residual,
    })
}

/// Samples per period estimated from the average sampling interval
fn estimate_period_samples(timestamps: &[i64], period: i64) -> usize {
    if timestamps.len() <= 1 {
        return 1;
    }
    let span = (timestamps[timestamps.len() - 1] - timestamps[0]) as f64;
    let avg_interval = span / (timestamps.len() - 1) as f64;
    if avg_interval <= 0.0 {
        return 1;
    }
    (period as f64 / avg_interval).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(method: SeasonalMethod) -> SeasonalConfig {
        SeasonalConfig {
            enabled: true,
            min_data_points: 24,
            period: 86400,
            method,
        }
    }

    /// Four days of hourly values: level 10 plus a daily sine swing
    fn daily_sine(level: f64, amplitude: f64) -> Vec<(i64, f64)> {
        (0..96)
            .map(|i| {
                let phase = (i % 24) as f64 / 24.0 * std::f64::consts::TAU;
                (i * 3600, level + amplitude * phase.sin())
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data() {
        let samples: Vec<(i64, f64)> = (0..5).map(|i| (i * 3600, 10.0)).collect();
        let err = decompose("p1|8867-4|bpm", &samples, &config(SeasonalMethod::Additive))
            .unwrap_err();
        assert!(matches!(err, DetectError::InsufficientData { needed: 24, got: 5 }));
    }

    #[test]
    fn test_period_samples_estimated_from_cadence() {
        let samples = daily_sine(10.0, 2.0);
        let result =
            decompose("p1|8867-4|bpm", &samples, &config(SeasonalMethod::Additive)).unwrap();
        assert_eq!(result.period_samples, 24);
    }

    #[test]
    fn test_additive_components_reconstruct_input() {
        let samples = daily_sine(10.0, 2.0);
        let result =
            decompose("p1|8867-4|bpm", &samples, &config(SeasonalMethod::Additive)).unwrap();

        // residual = value - trend - seasonal, so the sum is exact
        for i in 0..samples.len() {
            let reconstructed = result.trend[i].1 + result.seasonal[i].1 + result.residual[i].1;
            assert!((reconstructed - samples[i].1).abs() < 1e-9);
        }
    }

    #[test]
    fn test_additive_seasonal_sums_to_zero_per_cycle() {
        let samples = daily_sine(10.0, 2.0);
        let result =
            decompose("p1|8867-4|bpm", &samples, &config(SeasonalMethod::Additive)).unwrap();

        let cycle_sum: f64 = result.seasonal[..24].iter().map(|(_, v)| v).sum();
        assert!(cycle_sum.abs() < 1e-9);
    }

    #[test]
    fn test_additive_captures_sine_in_seasonal() {
        let samples = daily_sine(10.0, 2.0);
        let result =
            decompose("p1|8867-4|bpm", &samples, &config(SeasonalMethod::Additive)).unwrap();

        // Interior residuals should be small once trend and season are removed
        let interior = &result.residual[24..72];
        let max_residual = interior.iter().map(|(_, v)| v.abs()).fold(0.0, f64::max);
        assert!(max_residual < 1.0, "residual too large: {}", max_residual);
    }

    #[test]
    fn test_multiplicative_identity() {
        let samples = daily_sine(10.0, 2.0);
        let result = decompose(
            "p1|8867-4|bpm",
            &samples,
            &config(SeasonalMethod::Multiplicative),
        )
        .unwrap();

        // residual = value / (trend * seasonal) wherever the product is nonzero
        for i in 0..samples.len() {
            let product = result.trend[i].1 * result.seasonal[i].1;
            if product != 0.0 {
                let reconstructed = product * result.residual[i].1;
                assert!((reconstructed - samples[i].1).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_spike_produces_event() {
        let mut samples = daily_sine(10.0, 2.0);
        samples[50].1 += 50.0;

        let result =
            decompose("p1|8867-4|bpm", &samples, &config(SeasonalMethod::Additive)).unwrap();
        let events = result.events();

        assert!(!events.is_empty());
        assert!(events.iter().any(|e| e.span == EventSpan::At(samples[50].0)));
        assert!(events.iter().all(|e| e.kind == EventKind::SeasonalResidual));
    }

    #[test]
    fn test_clean_constant_series_emits_no_events() {
        let samples: Vec<(i64, f64)> = (0..48).map(|i| (i * 3600, 10.0)).collect();
        let result =
            decompose("p1|8867-4|bpm", &samples, &config(SeasonalMethod::Additive)).unwrap();
        assert!(result.events().is_empty());
    }
}
