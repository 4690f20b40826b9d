//! Moving-window analysis
//!
//! Slides a fixed-width window across a series by a configured step,
//! computing one statistic per position: least-squares trend slope,
//! volatility (standard deviation), or max-min range. Positions whose
//! statistic magnitude exceeds the threshold are flagged.

use crate::detect::stats;
use crate::detect::{DetectionEvent, EventKind, EventSpan, MovingWindowConfig, WindowMethod};
use serde::Serialize;

/// Statistic value for one window position
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct WindowPoint {
    pub window_start: i64,
    pub window_end: i64,
    pub value: f64,
}

/// Moving-window result for one series
#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub key: String,
    pub method: WindowMethod,
    pub threshold: f64,
    pub windows: Vec<WindowPoint>,
    pub flagged: Vec<WindowPoint>,
}

impl WindowReport {
    /// Detection events for the flagged window positions
    pub fn events(&self) -> Vec<DetectionEvent> {
        self.flagged
            .iter()
            .map(|w| DetectionEvent {
                keys: vec![self.key.clone()],
                span: EventSpan::Interval {
                    start: w.window_start,
                    end: w.window_end,
                },
                kind: EventKind::WindowAnomaly,
                score: w.value.abs(),
            })
            .collect()
    }
}

/// Slide the configured window over a sorted (timestamp, value) series
pub(crate) fn analyze(
    key: &str,
    samples: &[(i64, f64)],
    config: &MovingWindowConfig,
) -> WindowReport {
    let mut windows = Vec::new();

    if !samples.is_empty() && config.window_size > 0 && config.step_size > 0 {
        let earliest = samples[0].0;
        let latest = samples[samples.len() - 1].0;

        // Two cursors track the window membership; both only move forward
        let mut lo = 0usize;
        let mut hi = 0usize;
        let mut window_start = earliest;

        while window_start + config.window_size <= latest {
            let window_end = window_start + config.window_size;

            while lo < samples.len() && samples[lo].0 < window_start {
                lo += 1;
            }
            if hi < lo {
                hi = lo;
            }
            while hi < samples.len() && samples[hi].0 < window_end {
                hi += 1;
            }

            let members = &samples[lo..hi];
            if !members.is_empty() {
                let values: Vec<f64> = members.iter().map(|(_, v)| *v).collect();
                let value = match config.method {
                    WindowMethod::Trend => {
                        let times: Vec<f64> = members.iter().map(|(ts, _)| *ts as f64).collect();
                        stats::slope(&times, &values)
                    }
                    WindowMethod::Volatility => stats::sample_stddev(&values),
                    WindowMethod::Range => {
                        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
                        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                        max - min
                    }
                };

                windows.push(WindowPoint {
                    window_start,
                    window_end,
                    value,
                });
            }

            // Later windows start no earlier, so the cursors never rewind
            window_start += config.step_size;
        }
    }

    let flagged = windows
        .iter()
        .filter(|w| w.value.abs() > config.threshold)
        .copied()
        .collect();

    WindowReport {
        key: key.to_string(),
        method: config.method,
        threshold: config.threshold,
        windows,
        flagged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(method: WindowMethod, threshold: f64) -> MovingWindowConfig {
        MovingWindowConfig {
            enabled: true,
            window_size: 600,
            step_size: 300,
            method,
            threshold,
        }
    }

    #[test]
    fn test_volatility_flags_unstable_window() {
        // Steady at 72 for 20 minutes, then swinging wildly
        let samples: Vec<(i64, f64)> = (0..20)
            .map(|i| {
                let v = if i < 12 {
                    72.0
                } else if i % 2 == 0 {
                    100.0
                } else {
                    50.0
                };
                (i * 60, v)
            })
            .collect();

        let report = analyze(
            "p1|8867-4|bpm",
            &samples,
            &config(WindowMethod::Volatility, 10.0),
        );

        assert!(!report.windows.is_empty());
        assert!(!report.flagged.is_empty());
        // Early windows are quiet
        assert_eq!(report.windows[0].value, 0.0);
        // Flagged windows overlap the unstable tail
        assert!(report.flagged.iter().all(|w| w.window_end > 12 * 60));
    }

    #[test]
    fn test_trend_slope_per_window() {
        // Rising 1 unit per second everywhere
        let samples: Vec<(i64, f64)> = (0..20).map(|i| (i * 60, i as f64 * 60.0)).collect();

        let report = analyze("p1|8867-4|bpm", &samples, &config(WindowMethod::Trend, 2.0));

        for window in &report.windows {
            assert!((window.value - 1.0).abs() < 1e-9);
        }
        assert!(report.flagged.is_empty());
    }

    #[test]
    fn test_trend_flags_negative_slope() {
        // A steep drop: magnitude is what matters, not direction
        let samples: Vec<(i64, f64)> = (0..20).map(|i| (i * 60, -(i as f64) * 300.0)).collect();

        let report = analyze("p1|8867-4|bpm", &samples, &config(WindowMethod::Trend, 2.0));
        assert_eq!(report.flagged.len(), report.windows.len());
    }

    #[test]
    fn test_range_method() {
        let samples: Vec<(i64, f64)> = (0..20)
            .map(|i| (i * 60, if i == 10 { 90.0 } else { 70.0 }))
            .collect();

        let report = analyze("p1|8867-4|bpm", &samples, &config(WindowMethod::Range, 15.0));

        // Only windows containing the spike have a 20-unit range
        for window in &report.flagged {
            assert!(window.window_start <= 10 * 60 && 10 * 60 < window.window_end);
            assert_eq!(window.value, 20.0);
        }
        assert!(!report.flagged.is_empty());
    }

    #[test]
    fn test_window_positions_step() {
        let samples: Vec<(i64, f64)> = (0..20).map(|i| (i * 60, 1.0)).collect();
        let report = analyze("p1|8867-4|bpm", &samples, &config(WindowMethod::Range, 1.0));

        // Windows start every step_size seconds from the first sample
        for pair in report.windows.windows(2) {
            assert_eq!(pair[1].window_start - pair[0].window_start, 300);
        }
        assert_eq!(
            report.windows[0].window_end - report.windows[0].window_start,
            600
        );
    }

    #[test]
    fn test_empty_and_short_series() {
        let report = analyze("k", &[], &config(WindowMethod::Volatility, 1.0));
        assert!(report.windows.is_empty());

        // Span shorter than one window
        let samples = vec![(0_i64, 1.0), (60, 2.0)];
        let report = analyze("k", &samples, &config(WindowMethod::Volatility, 1.0));
        assert!(report.windows.is_empty());
    }

    #[test]
    fn test_events_carry_interval_span() {
        let samples: Vec<(i64, f64)> = (0..20)
            .map(|i| (i * 60, if i % 2 == 0 { 100.0 } else { 50.0 }))
            .collect();

        let report = analyze(
            "p1|8867-4|bpm",
            &samples,
            &config(WindowMethod::Volatility, 10.0),
        );
        let events = report.events();

        assert_eq!(events.len(), report.flagged.len());
        for event in &events {
            assert_eq!(event.kind, EventKind::WindowAnomaly);
            assert!(matches!(event.span, EventSpan::Interval { .. }));
        }
    }
}
