use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use optimizer_analytics::{ExecutionRecord, RequestAnalysisStore};
use optimizer_common::PerformanceTrackingConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::pipeline::{Next, PipelineBehavior, PipelineRequest, PipelineResponse};
use crate::plugins::MetricsExporter;

/// Times every request that passes through, records it into the shared
/// [`RequestAnalysisStore`] and ships a batch to the configured exporter
/// either on a request-count threshold or in the background on an
/// interval, matching the measure-then-gate shape of a request-logging
/// middleware.
pub struct PerformanceTrackingBehavior {
    config: PerformanceTrackingConfig,
    store: Arc<RequestAnalysisStore>,
    exporter: Arc<dyn MetricsExporter>,
    since_last_export: AtomicU32,
}

impl PerformanceTrackingBehavior {
    pub fn new(
        config: PerformanceTrackingConfig,
        store: Arc<RequestAnalysisStore>,
        exporter: Arc<dyn MetricsExporter>,
    ) -> Self {
        Self {
            config,
            store,
            exporter,
            since_last_export: AtomicU32::new(0),
        }
    }

    async fn maybe_export(&self) {
        if !self.config.enable_immediate_export {
            return;
        }
        let count = self.since_last_export.fetch_add(1, Ordering::SeqCst) + 1;
        if count < self.config.immediate_export_threshold {
            return;
        }
        self.since_last_export.store(0, Ordering::SeqCst);
        let metrics = self.store.all_metrics().await;
        if let Err(err) = self.exporter.export_execution_metrics(&metrics).await {
            tracing::warn!(error = %err, "failed to export execution metrics");
        }
    }

    /// Runs the configured periodic export loop until `cancel` fires.
    /// Intended to be spawned once by the composition root, not per request.
    pub async fn run_periodic_export(&self, cancel: CancellationToken) {
        if !self.config.enable_periodic_export {
            return;
        }
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(
            self.config.export_interval_seconds,
        ));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("performance tracking export loop stopping");
                    return;
                }
                _ = interval.tick() => {
                    let metrics = self.store.all_metrics().await;
                    if let Err(err) = self.exporter.export_execution_metrics(&metrics).await {
                        tracing::warn!(error = %err, "periodic metrics export failed");
                    }
                    if self.config.reset_after_export {
                        self.store.clear().await;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl PipelineBehavior for PerformanceTrackingBehavior {
    async fn handle(
        &self,
        request: PipelineRequest,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> optimizer_common::Result<PipelineResponse> {
        if !self.config.enable_tracking {
            return next.run(request, cancel).await;
        }

        let request_type = request.request_type.clone();
        self.store.begin_concurrent(&request_type).await;
        let started = std::time::Instant::now();

        let result = next.run(request, cancel).await;

        self.store.end_concurrent(&request_type).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let was_cancelled = matches!(result, Err(optimizer_common::Error::Cancelled));
        if !was_cancelled {
            self.store
                .record_execution(
                    &request_type,
                    ExecutionRecord {
                        duration_ms,
                        success: result.is_ok(),
                        memory_allocated_bytes: 0,
                        database_calls: 0,
                        external_api_calls: 0,
                        cpu_usage_percent: 0.0,
                    },
                )
                .await;

            if self.config.enable_detailed_logging {
                info!(request_type = %request_type, duration_ms, success = result.is_ok(), "request tracked");
            }

            self.maybe_export().await;
        } else {
            debug!(request_type = %request_type, "cancelled request excluded from analytics");
        }

        result
    }

    fn name(&self) -> &'static str {
        "performance_tracking"
    }
}
