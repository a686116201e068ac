use std::sync::Arc;

use chrono::Utc;
use optimizer_analytics::RequestAnalysisStore;
use optimizer_common::CleanupConfig;
use optimizer_timeseries::TimeSeriesStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::prediction_history::PredictionHistory;

/// Owns a background sweep that bounds retained history: time-series
/// points older than the retention window are dropped, predictions beyond
/// their age cutoff are trimmed, and request types that haven't executed
/// within the window are removed from the analysis store. Mirrors the
/// periodic-sweep-plus-idempotent-Drop shape used for background
/// maintenance loops elsewhere in this workspace.
pub struct DataCleanupManager {
    config: CleanupConfig,
    timeseries: Arc<TimeSeriesStore>,
    predictions: Arc<PredictionHistory>,
    analysis: Option<Arc<RequestAnalysisStore>>,
    handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl DataCleanupManager {
    /// Constructs the manager without starting the background sweep; call
    /// [`Self::start`] separately once the suite has finished wiring up
    /// dependent components. Useful in tests that only need `sweep_once`.
    pub fn new_idle(
        config: CleanupConfig,
        timeseries: Arc<TimeSeriesStore>,
        predictions: Arc<PredictionHistory>,
        analysis: Option<Arc<RequestAnalysisStore>>,
    ) -> Self {
        Self {
            config,
            timeseries,
            predictions,
            analysis,
            handle: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Constructs the manager and immediately spawns its background sweep.
    pub fn new(
        config: CleanupConfig,
        timeseries: Arc<TimeSeriesStore>,
        predictions: Arc<PredictionHistory>,
        analysis: Option<Arc<RequestAnalysisStore>>,
    ) -> Self {
        let mut manager = Self::new_idle(config, timeseries, predictions, analysis);
        manager.handle = Some(manager.spawn_loop());
        manager
    }

    /// Runs one sweep synchronously; useful for tests and for an initial
    /// pass before the background loop's first tick.
    pub async fn sweep_once(&self) -> CleanupReport {
        let cutoff = Utc::now() - chrono::Duration::hours(self.config.retention_hours as i64);

        let points_removed = self.timeseries.evict_older_than(cutoff).await;
        let predictions_removed = self.predictions.retain_after(cutoff).await;

        let request_types_removed = if let Some(analysis) = &self.analysis {
            let mut removed = 0;
            for request_type in analysis.request_types().await {
                if let Some(metrics) = analysis.metrics_for(&request_type).await {
                    if metrics.last_execution < cutoff {
                        analysis.remove(&request_type).await;
                        removed += 1;
                    }
                }
            }
            removed
        } else {
            0
        };

        let report = CleanupReport {
            time_series_points_removed: points_removed,
            predictions_removed,
            request_types_removed,
        };
        debug!(?report, "cleanup sweep complete");
        report
    }

    /// Spawns the periodic background sweep over cloned handles to the
    /// underlying stores, so the task doesn't need to own `self`.
    fn spawn_loop(&self) -> JoinHandle<()> {
        let timeseries = self.timeseries.clone();
        let predictions = self.predictions.clone();
        let analysis = self.analysis.clone();
        let config = self.config.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let standalone = DataCleanupManager {
                config: config.clone(),
                timeseries,
                predictions,
                analysis,
                handle: None,
                cancel: cancel.clone(),
            };
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(
                config.sweep_interval_seconds,
            ));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("data cleanup manager stopping");
                        return;
                    }
                    _ = interval.tick() => {
                        standalone.sweep_once().await;
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DataCleanupManager {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupReport {
    pub time_series_points_removed: usize,
    pub predictions_removed: usize,
    pub request_types_removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimizer_analytics::ExecutionRecord;

    #[tokio::test]
    async fn sweep_removes_stale_time_series_points() {
        let timeseries = Arc::new(TimeSeriesStore::new(100));
        let old = Utc::now() - chrono::Duration::hours(48);
        timeseries.record("cpu", 1.0, old).await;
        timeseries.record_now("cpu", 2.0).await;

        let manager = DataCleanupManager::new(
            CleanupConfig {
                retention_hours: 24,
                ..CleanupConfig::default()
            },
            timeseries.clone(),
            Arc::new(PredictionHistory::new(10)),
            None,
        );

        let report = manager.sweep_once().await;
        assert_eq!(report.time_series_points_removed, 1);
        assert_eq!(timeseries.point_count("cpu").await, 1);
    }

    #[tokio::test]
    async fn sweep_removes_inactive_request_types() {
        let analysis = Arc::new(RequestAnalysisStore::new());
        analysis
            .record_execution(
                &"Stale".to_string(),
                ExecutionRecord {
                    duration_ms: 10.0,
                    success: true,
                    memory_allocated_bytes: 0,
                    database_calls: 0,
                    external_api_calls: 0,
                    cpu_usage_percent: 0.0,
                },
            )
            .await;

        let manager = DataCleanupManager::new(
            CleanupConfig {
                retention_hours: 24,
                ..CleanupConfig::default()
            },
            Arc::new(TimeSeriesStore::new(10)),
            Arc::new(PredictionHistory::new(10)),
            Some(analysis.clone()),
        );

        // The freshly-recorded execution is within the window, so it survives.
        let report = manager.sweep_once().await;
        assert_eq!(report.request_types_removed, 0);
        assert!(analysis.metrics_for(&"Stale".to_string()).await.is_some());
    }
}
