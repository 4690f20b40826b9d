//! Shared statistical helpers for the detection pipeline
//!
//! Small, allocation-free building blocks used by every analyzer:
//! means, deviations, least-squares slope, Pearson correlation. The
//! regression helpers work on centered co-moments, which keeps them
//! stable for vitals series whose raw values sit far from zero
//! (timestamps in the billions, pressures around 120).

/// Arithmetic mean; 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n)
pub fn population_stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Sample standard deviation (divides by n-1); 0.0 below two points
pub fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Centered co-moments of two equal-length series: (Σdx·dy, Σdx², Σdy²)
fn co_moments(x: &[f64], y: &[f64]) -> (f64, f64, f64) {
    let mx = mean(x);
    let my = mean(y);
    x.iter()
        .zip(y)
        .fold((0.0, 0.0, 0.0), |(cross, var_x, var_y), (&xi, &yi)| {
            let dx = xi - mx;
            let dy = yi - my;
            (cross + dx * dy, var_x + dx * dx, var_y + dy * dy)
        })
}

/// Least-squares slope of y over x, Σdx·dy / Σdx²; 0.0 when degenerate
pub fn slope(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }

    let (cross, var_x, _) = co_moments(x, y);
    if var_x == 0.0 {
        0.0
    } else {
        cross / var_x
    }
}

/// Pearson correlation, Σdx·dy / √(Σdx²·Σdy²)
///
/// Returns a value between -1 and 1:
/// - 1: perfect positive correlation
/// - 0: no correlation (or a constant/empty input)
/// - -1: perfect negative correlation
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.is_empty() {
        return 0.0;
    }

    let (cross, var_x, var_y) = co_moments(x, y);
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        cross / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_stddev() {
        // A minute of stable saturation readings with one shallow dip
        let spo2 = vec![98.0, 98.0, 97.0, 98.0, 96.0, 98.0, 98.0, 97.0];
        assert!((mean(&spo2) - 97.5).abs() < 1e-12);
        assert!(population_stddev(&spo2) > 0.0);
        assert!(sample_stddev(&spo2) > population_stddev(&spo2));
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(population_stddev(&[]), 0.0);
        assert_eq!(sample_stddev(&[98.0]), 0.0);
        assert_eq!(slope(&[], &[]), 0.0);
        assert_eq!(pearson_correlation(&[], &[]), 0.0);
    }

    #[test]
    fn test_slope_recovery_ramp() {
        // Heart rate easing down 1.5 bpm per minute after exertion
        let t: Vec<f64> = (0..6).map(|i| (i * 60) as f64).collect();
        let hr: Vec<f64> = (0..6).map(|i| 150.0 - i as f64 * 1.5).collect();
        assert!((slope(&t, &hr) + 1.5 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_slope_repeated_timestamp() {
        // All samples at one instant: no x spread, no slope
        let t = vec![300.0, 300.0, 300.0];
        let spo2 = vec![97.0, 98.0, 99.0];
        assert_eq!(slope(&t, &spo2), 0.0);
    }

    #[test]
    fn test_pearson_systolic_tracks_diastolic() {
        // Quarter-hourly pressures climbing together through the morning
        let sys: Vec<f64> = (0..12).map(|i| 112.0 + i as f64 * 1.5).collect();
        let dia: Vec<f64> = (0..12).map(|i| 74.0 + i as f64 * 0.9).collect();
        let r = pearson_correlation(&sys, &dia);
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pearson_desaturation_against_rising_rate() {
        // Saturation sliding while heart rate compensates upward
        let hr: Vec<f64> = (0..10).map(|i| 70.0 + i as f64 * 2.0).collect();
        let spo2: Vec<f64> = (0..10).map(|i| 99.0 - i as f64 * 0.4).collect();
        let r = pearson_correlation(&hr, &spo2);
        assert!((r + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pearson_jitter_uncorrelated_with_trend() {
        // Cuff jitter shares nothing with a steady climb
        let sys: Vec<f64> = (0..8).map(|i| 110.0 + i as f64).collect();
        let jitter: Vec<f64> = (0..8)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        assert!(pearson_correlation(&sys, &jitter).abs() < 0.3);
    }

    #[test]
    fn test_pearson_constant_series() {
        // A flat saturation trace has no variance to correlate
        let hr: Vec<f64> = (0..8).map(|i| 70.0 + i as f64).collect();
        let flat = vec![98.0; 8];
        assert_eq!(pearson_correlation(&hr, &flat), 0.0);
    }
}
