//! Multivariate anomaly detection
//!
//! Scores jointly-observed points of a correlated metric group — e.g.
//! heart rate with oxygen saturation, or systolic with diastolic
//! pressure. Series are aligned by nearest timestamp within a tolerance
//! using one index cursor per series (a streaming, single-pass join).
//! Scoring is Mahalanobis distance against the window's mean and
//! covariance, or a simplified isolation score (max per-dimension z).

use crate::detect::error::{DetectError, DetectResult};
use crate::detect::stats;
use crate::detect::{DetectionEvent, EventKind, EventSpan, MultivariateConfig, MultivariateMethod};
use serde::Serialize;
use std::collections::HashMap;

/// One jointly-anomalous observation
#[derive(Debug, Clone, Serialize)]
pub struct GroupAnomaly {
    pub timestamp: i64,
    /// Values in the same order as the report's keys
    pub values: Vec<f64>,
    pub score: f64,
}

/// Anomaly report for one metric group
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub keys: Vec<String>,
    pub method: MultivariateMethod,
    pub threshold: f64,
    /// Number of aligned observations that were scored
    pub aligned_points: usize,
    pub anomalies: Vec<GroupAnomaly>,
}

impl GroupReport {
    /// Detection events for the flagged observations
    pub fn events(&self) -> Vec<DetectionEvent> {
        self.anomalies
            .iter()
            .map(|a| DetectionEvent {
                keys: self.keys.clone(),
                span: EventSpan::At(a.timestamp),
                kind: EventKind::MultivariateAnomaly,
                score: a.score,
            })
            .collect()
    }
}

/// Align several sorted series by nearest timestamp within `tolerance`
///
/// Advances one cursor per series; a row is emitted only when every
/// series has a sample within `tolerance` of the pivot (the latest of
/// the current heads). Returns the aligned timestamps and one row of
/// values per emitted point.
pub(crate) fn align_series(
    series: &[Vec<(i64, f64)>],
    tolerance: i64,
) -> (Vec<i64>, Vec<Vec<f64>>) {
    if series.is_empty() || series.iter().any(|s| s.is_empty()) {
        return (Vec::new(), Vec::new());
    }

    let mut cursors = vec![0usize; series.len()];
    let mut timestamps = Vec::new();
    let mut rows = Vec::new();

    loop {
        if series
            .iter()
            .zip(&cursors)
            .any(|(s, &c)| c >= s.len())
        {
            break;
        }

        let pivot = series
            .iter()
            .zip(&cursors)
            .map(|(s, &c)| s[c].0)
            .max()
            .unwrap_or(0);

        // Walk each cursor forward while the next sample is at least as
        // close to the pivot
        for (s, c) in series.iter().zip(cursors.iter_mut()) {
            while *c + 1 < s.len() && (s[*c + 1].0 - pivot).abs() <= (s[*c].0 - pivot).abs() {
                *c += 1;
            }
        }

        let within = series
            .iter()
            .zip(&cursors)
            .all(|(s, &c)| (s[c].0 - pivot).abs() <= tolerance);

        if within {
            timestamps.push(pivot);
            rows.push(series.iter().zip(&cursors).map(|(s, &c)| s[c].1).collect());
            for c in cursors.iter_mut() {
                *c += 1;
            }
        } else {
            // Drop the most lagging sample and retry
            let mut lag_idx = 0;
            let mut lag_ts = i64::MAX;
            for (i, (s, &c)) in series.iter().zip(&cursors).enumerate() {
                if s[c].0 < lag_ts {
                    lag_ts = s[c].0;
                    lag_idx = i;
                }
            }
            cursors[lag_idx] += 1;
        }
    }

    (timestamps, rows)
}

/// Invert a square matrix by Gauss-Jordan elimination with partial
/// pivoting; `None` for singular (or near-singular) inputs
pub(crate) fn invert_matrix(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    if n == 0 || matrix.iter().any(|row| row.len() != n) {
        return None;
    }

    // Augment with the identity
    let mut aug: Vec<Vec<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    for i in 0..n {
        let mut pivot_row = i;
        let mut pivot_val = aug[i][i].abs();
        for k in (i + 1)..n {
            if aug[k][i].abs() > pivot_val {
                pivot_val = aug[k][i].abs();
                pivot_row = k;
            }
        }
        if pivot_val < 1e-10 {
            return None;
        }
        aug.swap(i, pivot_row);

        let pivot = aug[i][i];
        for j in 0..(2 * n) {
            aug[i][j] /= pivot;
        }

        for k in 0..n {
            if k != i {
                let factor = aug[k][i];
                for j in 0..(2 * n) {
                    aug[k][j] -= factor * aug[i][j];
                }
            }
        }
    }

    Some(aug.into_iter().map(|row| row[n..].to_vec()).collect())
}

/// Mahalanobis distance of every row from the sample mean
///
/// `None` when there are too few rows for a stable covariance or the
/// covariance matrix is singular.
pub(crate) fn mahalanobis_scores(rows: &[Vec<f64>]) -> Option<Vec<f64>> {
    let n = rows.len();
    let p = rows.first().map(|r| r.len()).unwrap_or(0);
    if p == 0 || n < p + 2 {
        return None;
    }

    let mut means = vec![0.0; p];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in means.iter_mut() {
        *m /= n as f64;
    }

    let mut cov = vec![vec![0.0; p]; p];
    for row in rows {
        for i in 0..p {
            for j in 0..p {
                cov[i][j] += (row[i] - means[i]) * (row[j] - means[j]);
            }
        }
    }
    for row in cov.iter_mut() {
        for v in row.iter_mut() {
            *v /= (n - 1) as f64;
        }
    }

    let inv = invert_matrix(&cov)?;

    let scores = rows
        .iter()
        .map(|row| {
            let mut d2 = 0.0;
            for i in 0..p {
                for j in 0..p {
                    d2 += (row[i] - means[i]) * inv[i][j] * (row[j] - means[j]);
                }
            }
            d2.max(0.0).sqrt()
        })
        .collect();

    Some(scores)
}

/// Simplified isolation score: the largest per-dimension |z|
pub(crate) fn isolation_scores(rows: &[Vec<f64>]) -> Vec<f64> {
    let p = rows.first().map(|r| r.len()).unwrap_or(0);
    if p == 0 {
        return Vec::new();
    }

    let mut columns = vec![Vec::with_capacity(rows.len()); p];
    for row in rows {
        for (col, v) in columns.iter_mut().zip(row) {
            col.push(*v);
        }
    }

    let col_means: Vec<f64> = columns.iter().map(|c| stats::mean(c)).collect();
    let col_stddevs: Vec<f64> = columns.iter().map(|c| stats::population_stddev(c)).collect();

    rows.iter()
        .map(|row| {
            let mut max_z = 0.0f64;
            for j in 0..p {
                if col_stddevs[j] > 0.0 {
                    max_z = max_z.max((row[j] - col_means[j]).abs() / col_stddevs[j]);
                }
            }
            max_z
        })
        .collect()
}

/// Score one aligned group and flag points above the threshold
pub(crate) fn detect_group(
    keys: &[String],
    series: &[Vec<(i64, f64)>],
    config: &MultivariateConfig,
) -> DetectResult<GroupReport> {
    if keys.len() < 2 || keys.len() != series.len() {
        return Err(DetectError::MismatchedGroup(format!(
            "need at least two series, got {} keys / {} series",
            keys.len(),
            series.len()
        )));
    }

    let (timestamps, rows) = align_series(series, config.align_tolerance_secs);
    if rows.is_empty() {
        return Err(DetectError::MismatchedGroup(format!(
            "no aligned samples within {}s for group [{}]",
            config.align_tolerance_secs,
            keys.join(", ")
        )));
    }

    let scores = match config.method {
        MultivariateMethod::Mahalanobis => mahalanobis_scores(&rows).unwrap_or_default(),
        MultivariateMethod::IsolationForest => isolation_scores(&rows),
    };

    let anomalies = timestamps
        .iter()
        .zip(rows.iter())
        .zip(scores.iter())
        .filter(|&((_, _), score)| *score > config.threshold)
        .map(|((ts, row), score)| GroupAnomaly {
            timestamp: *ts,
            values: row.clone(),
            score: *score,
        })
        .collect();

    Ok(GroupReport {
        keys: keys.to_vec(),
        method: config.method,
        threshold: config.threshold,
        aligned_points: rows.len(),
        anomalies,
    })
}

/// Group keys whose pairwise correlation clears the threshold
///
/// Pearson correlation is computed over timestamp-aligned pairs; keys
/// are folded greedily into the first group they correlate with, and
/// singleton groups are dropped.
pub(crate) fn correlated_groups(
    series_map: &HashMap<String, Vec<(i64, f64)>>,
    tolerance: i64,
    threshold: f64,
) -> Vec<Vec<String>> {
    let mut keys: Vec<&String> = series_map.keys().collect();
    keys.sort();

    let correlation = |a: &str, b: &str| -> f64 {
        let pair = [series_map[a].clone(), series_map[b].clone()];
        let (_, rows) = align_series(&pair, tolerance);
        if rows.len() < 3 {
            return 0.0;
        }
        let x: Vec<f64> = rows.iter().map(|r| r[0]).collect();
        let y: Vec<f64> = rows.iter().map(|r| r[1]).collect();
        stats::pearson_correlation(&x, &y)
    };

    let mut visited = vec![false; keys.len()];
    let mut groups = Vec::new();

    for i in 0..keys.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let mut group = vec![keys[i].clone()];

        for j in (i + 1)..keys.len() {
            if visited[j] {
                continue;
            }
            if correlation(keys[i], keys[j]).abs() >= threshold {
                group.push(keys[j].clone());
                visited[j] = true;
            }
        }

        if group.len() > 1 {
            groups.push(group);
        }
    }

    groups
}
