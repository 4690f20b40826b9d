//! PulseDB Pattern Detection Pipeline
//!
//! Independently configurable analyzers that pull record sequences from
//! the storage engine and emit detection events; none mutate storage:
//!
//! - **seasonal**: trend + seasonal + residual decomposition
//! - **multivariate**: joint anomaly scoring over correlated metric groups
//! - **changepoint**: CUSUM / PELT level-shift detection
//! - **window**: moving-window trend / volatility / range analysis
//! - **stats**: shared statistical helpers
//! - **error**: error types
//!
//! # Pipeline
//!
//! ```text
//! StorageEngine ──query──▶ scalar series ──▶ analyzer ──▶ DetectionEvent*
//!                                  (read-only, failure-isolated)
//! ```
//!
//! A failed analyzer run is scoped to that analyzer: `PatternDetector::run`
//! logs the failure and continues with the remaining analyzers.

pub mod changepoint;
pub mod error;
pub mod multivariate;
pub mod seasonal;
pub mod stats;
pub mod window;

pub use changepoint::{ChangePoint, ChangepointReport};
pub use error::{DetectError, DetectResult};
pub use multivariate::{GroupAnomaly, GroupReport};
pub use seasonal::SeasonalDecomposition;
pub use window::{WindowPoint, WindowReport};

use crate::storage::{StorageEngine, TimeRange};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Composition rule for seasonal decomposition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalMethod {
    /// value = trend + seasonal + residual
    Additive,
    /// value = trend * seasonal * residual
    Multiplicative,
}

/// Scoring method for multivariate anomaly detection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MultivariateMethod {
    Mahalanobis,
    IsolationForest,
}

/// Change-point detection algorithm
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangepointMethod {
    Cusum,
    Pelt,
}

/// Statistic computed per moving-window position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WindowMethod {
    Trend,
    Volatility,
    Range,
}

/// Seasonal decomposition configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SeasonalConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_min_data_points")]
    pub min_data_points: usize,
    /// Season length in seconds (default: one day)
    #[serde(default = "default_seasonal_period")]
    pub period: i64,
    #[serde(default = "default_seasonal_method")]
    pub method: SeasonalMethod,
}

/// Multivariate anomaly detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MultivariateConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Minimum |Pearson r| for auto-detected groups
    #[serde(default = "default_correlation_threshold")]
    pub correlation_threshold: f64,
    /// Explicit metric groups presumed correlated; when empty, groups
    /// are auto-detected from pairwise correlation
    #[serde(default)]
    pub groups: Vec<Vec<String>>,
    #[serde(default = "default_multivariate_method")]
    pub method: MultivariateMethod,
    /// Joint anomaly score above which a point is flagged
    #[serde(default = "default_multivariate_threshold")]
    pub threshold: f64,
    /// Nearest-timestamp alignment tolerance in seconds
    #[serde(default = "default_align_tolerance")]
    pub align_tolerance_secs: i64,
}

/// Change-point detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChangepointConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Decision threshold in standard deviations
    #[serde(default = "default_changepoint_threshold")]
    pub threshold: f64,
    #[serde(default = "default_changepoint_method")]
    pub method: ChangepointMethod,
    /// Per-segment penalty for PELT
    #[serde(default = "default_penalty")]
    pub penalty: f64,
}

/// Moving-window analysis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MovingWindowConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Window width in seconds
    #[serde(default = "default_window_size")]
    pub window_size: i64,
    /// Window advance in seconds
    #[serde(default = "default_step_size")]
    pub step_size: i64,
    #[serde(default = "default_window_method")]
    pub method: WindowMethod,
    /// Statistic magnitude above which a window is flagged
    #[serde(default = "default_window_threshold")]
    pub threshold: f64,
}

/// Process-wide detection configuration, immutable for the process
/// lifetime
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectionConfig {
    #[serde(default)]
    pub seasonal: SeasonalConfig,
    #[serde(default)]
    pub multivariate: MultivariateConfig,
    #[serde(default)]
    pub changepoint: ChangepointConfig,
    #[serde(default)]
    pub moving_window: MovingWindowConfig,
}

fn default_enabled() -> bool {
    true
}

fn default_min_data_points() -> usize {
    24
}

fn default_seasonal_period() -> i64 {
    86400
}

fn default_seasonal_method() -> SeasonalMethod {
    SeasonalMethod::Additive
}

fn default_correlation_threshold() -> f64 {
    0.7
}

fn default_multivariate_method() -> MultivariateMethod {
    MultivariateMethod::Mahalanobis
}

fn default_multivariate_threshold() -> f64 {
    3.0
}

fn default_align_tolerance() -> i64 {
    60
}

fn default_changepoint_threshold() -> f64 {
    2.0
}

fn default_changepoint_method() -> ChangepointMethod {
    ChangepointMethod::Cusum
}

fn default_penalty() -> f64 {
    1.0
}

fn default_window_size() -> i64 {
    3600
}

fn default_step_size() -> i64 {
    900
}

fn default_window_method() -> WindowMethod {
    WindowMethod::Volatility
}

fn default_window_threshold() -> f64 {
    1.5
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            min_data_points: default_min_data_points(),
            period: default_seasonal_period(),
            method: default_seasonal_method(),
        }
    }
}

impl Default for MultivariateConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            correlation_threshold: default_correlation_threshold(),
            groups: Vec::new(),
            method: default_multivariate_method(),
            threshold: default_multivariate_threshold(),
            align_tolerance_secs: default_align_tolerance(),
        }
    }
}

impl Default for ChangepointConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            threshold: default_changepoint_threshold(),
            method: default_changepoint_method(),
            penalty: default_penalty(),
        }
    }
}

impl Default for MovingWindowConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            window_size: default_window_size(),
            step_size: default_step_size(),
            method: default_window_method(),
            threshold: default_window_threshold(),
        }
    }
}

/// Where a detection applies
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventSpan {
    /// A single point in time
    At(i64),
    /// A half-open interval
    Interval { start: i64, end: i64 },
}

impl EventSpan {
    /// First timestamp the span covers
    pub fn start(&self) -> i64 {
        match self {
            EventSpan::At(ts) => *ts,
            EventSpan::Interval { start, .. } => *start,
        }
    }
}

/// Which analyzer produced an event
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SeasonalResidual,
    MultivariateAnomaly,
    ChangePoint,
    WindowAnomaly,
}

/// One detection emitted by an analyzer
#[derive(Debug, Clone, Serialize)]
pub struct DetectionEvent {
    /// Metric key(s) the detection applies to
    pub keys: Vec<String>,
    pub span: EventSpan,
    pub kind: EventKind,
    pub score: f64,
}

/// Runs the configured analyzers against the storage engine
pub struct PatternDetector {
    config: DetectionConfig,
    storage: Arc<StorageEngine>,
}

impl PatternDetector {
    /// Create a detector over an engine with the given configuration
    pub fn new(storage: Arc<StorageEngine>, config: DetectionConfig) -> Self {
        Self { config, storage }
    }

    /// Detection configuration
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Fetch the scalar series for a key, validating finiteness
    async fn series(&self, key: &str, range: TimeRange) -> DetectResult<Vec<(i64, f64)>> {
        let records = self.storage.query_range(key, range).await?;
        let mut samples = Vec::with_capacity(records.len());
        for record in &records {
            if let Some(v) = record.scalar_value() {
                if !v.is_finite() {
                    return Err(DetectError::NonFinite {
                        key: key.to_string(),
                        timestamp: record.timestamp,
                    });
                }
                samples.push((record.timestamp, v));
            }
        }
        if samples.is_empty() {
            return Err(DetectError::InsufficientData { needed: 1, got: 0 });
        }
        Ok(samples)
    }

    /// Decompose one series into trend + seasonal + residual
    pub async fn seasonal(
        &self,
        key: &str,
        range: TimeRange,
    ) -> DetectResult<SeasonalDecomposition> {
        if !self.config.seasonal.enabled {
            return Err(DetectError::Disabled("seasonal"));
        }
        let samples = self.series(key, range).await?;
        seasonal::decompose(key, &samples, &self.config.seasonal)
    }

    /// Score joint anomalies across correlated metric groups
    ///
    /// Explicit groups from the configuration are evaluated when all of
    /// their series have data; with no groups configured, groups are
    /// auto-detected by pairwise correlation and gated by
    /// `correlation_threshold`. Groups that cannot be aligned are logged
    /// and skipped so one bad group never hides the others.
    pub async fn multivariate(
        &self,
        keys: &[String],
        range: TimeRange,
    ) -> DetectResult<Vec<GroupReport>> {
        let config = &self.config.multivariate;
        if !config.enabled {
            return Err(DetectError::Disabled("multivariate"));
        }

        let mut series_map: HashMap<String, Vec<(i64, f64)>> = HashMap::new();
        for key in keys {
            match self.series(key, range).await {
                Ok(samples) => {
                    series_map.insert(key.clone(), samples);
                }
                Err(DetectError::InsufficientData { .. }) => {
                    tracing::debug!(key = %key, "no scalar data for multivariate analysis");
                }
                Err(e) => return Err(e),
            }
        }

        let groups: Vec<Vec<String>> = if config.groups.is_empty() {
            multivariate::correlated_groups(
                &series_map,
                config.align_tolerance_secs,
                config.correlation_threshold,
            )
        } else {
            config.groups.clone()
        };

        let mut reports = Vec::new();
        for group in groups {
            if group.len() < 2 {
                return Err(DetectError::MismatchedGroup(format!(
                    "configured group [{}] needs at least two metrics",
                    group.join(", ")
                )));
            }

            if !group.iter().all(|k| series_map.contains_key(k)) {
                tracing::debug!(group = ?group, "skipping group with missing series");
                continue;
            }

            let series: Vec<Vec<(i64, f64)>> =
                group.iter().map(|k| series_map[k].clone()).collect();
            match multivariate::detect_group(&group, &series, config) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::warn!(group = ?group, error = %e, "multivariate group skipped");
                }
            }
        }

        Ok(reports)
    }

    /// Detect abrupt level shifts in one series
    pub async fn changepoints(
        &self,
        key: &str,
        range: TimeRange,
    ) -> DetectResult<ChangepointReport> {
        let config = &self.config.changepoint;
        if !config.enabled {
            return Err(DetectError::Disabled("changepoint"));
        }
        let samples = self.series(key, range).await?;

        let points = match config.method {
            ChangepointMethod::Cusum => changepoint::cusum(&samples, config.threshold),
            ChangepointMethod::Pelt => {
                changepoint::pelt(&samples, config.threshold, config.penalty)
            }
        };

        Ok(ChangepointReport {
            key: key.to_string(),
            method: config.method,
            points,
        })
    }

    /// Slide the configured window over one series
    pub async fn moving_window(&self, key: &str, range: TimeRange) -> DetectResult<WindowReport> {
        let config = &self.config.moving_window;
        if !config.enabled {
            return Err(DetectError::Disabled("moving_window"));
        }
        let samples = self.series(key, range).await?;
        Ok(window::analyze(key, &samples, config))
    }

    /// Run every enabled analyzer over the given keys
    ///
    /// Analyzer failures are logged and skipped; the combined events are
    /// returned ordered by span start.
    pub async fn run(&self, keys: &[String], range: TimeRange) -> Vec<DetectionEvent> {
        let mut events = Vec::new();

        if self.config.seasonal.enabled {
            for key in keys {
                match self.seasonal(key, range).await {
                    Ok(result) => events.extend(result.events()),
                    Err(e) => log_analyzer_failure("seasonal", key, &e),
                }
            }
        }

        if self.config.changepoint.enabled {
            for key in keys {
                match self.changepoints(key, range).await {
                    Ok(report) => events.extend(report.events()),
                    Err(e) => log_analyzer_failure("changepoint", key, &e),
                }
            }
        }

        if self.config.moving_window.enabled {
            for key in keys {
                match self.moving_window(key, range).await {
                    Ok(report) => events.extend(report.events()),
                    Err(e) => log_analyzer_failure("moving_window", key, &e),
                }
            }
        }

        if self.config.multivariate.enabled {
            match self.multivariate(keys, range).await {
                Ok(reports) => {
                    for report in reports {
                        events.extend(report.events());
                    }
                }
                Err(e) => log_analyzer_failure("multivariate", "*", &e),
            }
        }

        events.sort_by_key(|e| e.span.start());
        events
    }
}

fn log_analyzer_failure(analyzer: &str, key: &str, error: &DetectError) {
    match error {
        DetectError::InsufficientData { .. } => {
            tracing::debug!(analyzer, key, error = %error, "analyzer skipped");
        }
        _ => {
            tracing::warn!(analyzer, key, error = %error, "analyzer failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{EngineConfig, Record};

    const HR: &str = "p1|8867-4|bpm";
    const SPO2: &str = "p1|2708-6|%";

    fn engine() -> Arc<StorageEngine> {
        Arc::new(StorageEngine::new(EngineConfig::default()).unwrap())
    }

    fn detector(storage: Arc<StorageEngine>) -> PatternDetector {
        PatternDetector::new(storage, DetectionConfig::default())
    }

    #[test]
    fn test_config_defaults_from_empty_toml() {
        let config: DetectionConfig = toml::from_str("").unwrap();
        assert!(config.seasonal.enabled);
        assert_eq!(config.seasonal.min_data_points, 24);
        assert_eq!(config.seasonal.method, SeasonalMethod::Additive);
        assert_eq!(config.multivariate.threshold, 3.0);
        assert_eq!(config.changepoint.method, ChangepointMethod::Cusum);
        assert_eq!(config.moving_window.step_size, 900);
    }

    #[test]
    fn test_config_enum_spellings() {
        let toml_src = r#"
            [seasonal]
            method = "multiplicative"

            [multivariate]
            method = "isolation_forest"
            groups = [["p1|8867-4|bpm", "p1|2708-6|%"]]

            [changepoint]
            method = "pelt"
            penalty = 4.0

            [moving_window]
            method = "range"
            enabled = false
        "#;
        let config: DetectionConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.seasonal.method, SeasonalMethod::Multiplicative);
        assert_eq!(config.multivariate.method, MultivariateMethod::IsolationForest);
        assert_eq!(config.multivariate.groups.len(), 1);
        assert_eq!(config.changepoint.method, ChangepointMethod::Pelt);
        assert_eq!(config.changepoint.penalty, 4.0);
        assert_eq!(config.moving_window.method, WindowMethod::Range);
        assert!(!config.moving_window.enabled);
    }

    #[tokio::test]
    async fn test_disabled_analyzer_reports_disabled() {
        let mut config = DetectionConfig::default();
        config.seasonal.enabled = false;
        let detector = PatternDetector::new(engine(), config);

        let err = detector
            .seasonal(HR, TimeRange::new(0, 3600))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::Disabled("seasonal")));
    }

    #[tokio::test]
    async fn test_series_rejects_non_finite() {
        let storage = engine();
        storage.ingest(Record::scalar(HR, 100, 70.0)).await.unwrap();
        storage
            .ingest(Record::scalar(HR, 200, f64::NAN))
            .await
            .unwrap();

        let detector = detector(storage);
        let err = detector
            .changepoints(HR, TimeRange::new(0, 3600))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::NonFinite { timestamp: 200, .. }));
    }

    #[tokio::test]
    async fn test_seasonal_through_engine() {
        let storage = engine();
        for i in 0..96 {
            let phase = (i % 24) as f64 / 24.0 * std::f64::consts::TAU;
            storage
                .ingest(Record::scalar(HR, i * 3600, 70.0 + 5.0 * phase.sin()))
                .await
                .unwrap();
        }

        let detector = detector(storage);
        let result = detector
            .seasonal(HR, TimeRange::new(0, 96 * 3600))
            .await
            .unwrap();

        assert_eq!(result.trend.len(), 96);
        assert_eq!(result.period_samples, 24);
    }

    #[tokio::test]
    async fn test_changepoints_through_engine() {
        let storage = engine();
        // Blood pressure constant at 120, then jumping to 140
        for i in 0..10 {
            storage
                .ingest(Record::scalar("p1|8480-6|mmHg", i * 60, 120.0))
                .await
                .unwrap();
        }
        for i in 10..20 {
            storage
                .ingest(Record::scalar("p1|8480-6|mmHg", i * 60, 140.0))
                .await
                .unwrap();
        }

        let detector = detector(storage);
        let report = detector
            .changepoints("p1|8480-6|mmHg", TimeRange::new(0, 3600))
            .await
            .unwrap();

        assert_eq!(report.timestamps(), vec![600]);
    }

    #[tokio::test]
    async fn test_multivariate_explicit_group_with_missing_series() {
        let storage = engine();
        for i in 0..20 {
            storage
                .ingest(Record::scalar(HR, i * 60, 70.0 + i as f64))
                .await
                .unwrap();
        }

        let mut config = DetectionConfig::default();
        config.multivariate.groups = vec![vec![HR.to_string(), "absent|x|y".to_string()]];
        let detector = PatternDetector::new(storage, config);

        // Group is skipped, not an error
        let reports = detector
            .multivariate(&[HR.to_string()], TimeRange::new(0, 3600))
            .await
            .unwrap();
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn test_multivariate_singleton_group_rejected() {
        let storage = engine();
        storage.ingest(Record::scalar(HR, 100, 70.0)).await.unwrap();

        let mut config = DetectionConfig::default();
        config.multivariate.groups = vec![vec![HR.to_string()]];
        let detector = PatternDetector::new(storage, config);

        let err = detector
            .multivariate(&[HR.to_string()], TimeRange::new(0, 3600))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::MismatchedGroup(_)));
    }

    #[tokio::test]
    async fn test_multivariate_auto_detects_correlated_pair() {
        let storage = engine();
        // Heart rate climbing while saturation falls in lockstep
        for i in 0..30 {
            let noise = if i % 2 == 0 { 0.3 } else { -0.3 };
            storage
                .ingest(Record::scalar(HR, i * 60, 70.0 + i as f64 + noise))
                .await
                .unwrap();
            storage
                .ingest(Record::scalar(SPO2, i * 60, 99.0 - i as f64 * 0.2 + noise))
                .await
                .unwrap();
        }

        let detector = detector(storage);
        let reports = detector
            .multivariate(&[HR.to_string(), SPO2.to_string()], TimeRange::new(0, 3600))
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].aligned_points, 30);
    }

    #[tokio::test]
    async fn test_run_is_failure_isolated() {
        let storage = engine();
        // Far too little data for seasonal, enough for nothing to crash
        storage.ingest(Record::scalar(HR, 100, 70.0)).await.unwrap();
        storage.ingest(Record::scalar(HR, 200, 71.0)).await.unwrap();

        let detector = detector(storage);
        let events = detector.run(&[HR.to_string()], TimeRange::new(0, 3600)).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_run_emits_ordered_events() {
        let storage = engine();
        // A level shift plus a volatile tail in one series
        for i in 0..30 {
            let v = if i < 15 { 120.0 } else { 140.0 };
            storage
                .ingest(Record::scalar("p1|8480-6|mmHg", i * 120, v))
                .await
                .unwrap();
        }

        let mut config = DetectionConfig::default();
        config.moving_window.window_size = 1200;
        config.moving_window.step_size = 600;
        config.moving_window.threshold = 5.0;
        let detector = PatternDetector::new(storage, config);

        let events = detector
            .run(&["p1|8480-6|mmHg".to_string()], TimeRange::new(0, 3600))
            .await;

        assert!(!events.is_empty());
        assert!(events.iter().any(|e| e.kind == EventKind::ChangePoint));
        for pair in events.windows(2) {
            assert!(pair[0].span.start() <= pair[1].span.start());
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = DetectionEvent {
            keys: vec![HR.to_string()],
            span: EventSpan::Interval {
                start: 0,
                end: 3600,
            },
            kind: EventKind::WindowAnomaly,
            score: 2.5,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("window_anomaly"));
        assert!(json.contains("interval"));
    }
}
