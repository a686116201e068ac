use std::sync::Arc;

use chrono::Utc;
use optimizer_analytics::{
    ConnectionEstimateInputs, ConnectionEstimator, ConnectionMetricsCollector, RawLoadInputs,
    SystemMetricsCalculator,
};
use optimizer_common::{ConnectionEstimateConfig, LoadMetricsConfig, SystemLoadMetrics};
use tokio::sync::RwLock;
use tracing::debug;

use crate::plugins::{ActiveRequestCounter, SystemResourceProvider};

struct Cached {
    metrics: SystemLoadMetrics,
    fetched_at: chrono::DateTime<Utc>,
}

/// Assembles a fresh [`SystemLoadMetrics`] snapshot from pluggable request
/// and resource counters, caching the result for `cache_ttl_seconds` so
/// hot pipeline stages don't repeatedly hit the underlying providers.
pub struct SystemLoadMetricsProvider {
    config: LoadMetricsConfig,
    counter: Arc<dyn ActiveRequestCounter>,
    resources: Arc<dyn SystemResourceProvider>,
    calculator: SystemMetricsCalculator,
    connection_estimator: ConnectionEstimator,
    connections: ConnectionMetricsCollector,
    cache: RwLock<Option<Cached>>,
}

impl SystemLoadMetricsProvider {
    pub fn new(
        config: LoadMetricsConfig,
        calculator: SystemMetricsCalculator,
        counter: Arc<dyn ActiveRequestCounter>,
        resources: Arc<dyn SystemResourceProvider>,
    ) -> Self {
        Self::with_connection_estimates(config, calculator, counter, resources, ConnectionEstimateConfig::default())
    }

    pub fn with_connection_estimates(
        config: LoadMetricsConfig,
        calculator: SystemMetricsCalculator,
        counter: Arc<dyn ActiveRequestCounter>,
        resources: Arc<dyn SystemResourceProvider>,
        connection_estimates: ConnectionEstimateConfig,
    ) -> Self {
        Self {
            config,
            counter,
            resources,
            calculator,
            connection_estimator: ConnectionEstimator::new(connection_estimates),
            connections: ConnectionMetricsCollector::new(),
            cache: RwLock::new(None),
        }
    }

    pub async fn current(&self) -> SystemLoadMetrics {
        if self.config.enable_caching {
            if let Some(cached) = self.cache.read().await.as_ref() {
                let age = (Utc::now() - cached.fetched_at).num_seconds();
                if age < self.config.cache_ttl_seconds as i64 {
                    return cached.metrics.clone();
                }
            }
        }

        let metrics = self.fetch_fresh().await;

        if self.config.enable_caching {
            *self.cache.write().await = Some(Cached {
                metrics: metrics.clone(),
                fetched_at: Utc::now(),
            });
        }

        metrics
    }

    async fn fetch_fresh(&self) -> SystemLoadMetrics {
        let active = self.counter.active_requests().await;
        let queued = self.counter.queued_requests().await;
        let active_db_connections = self.resources.active_db_connections().await;

        let counts = self.connection_estimator.estimate(ConnectionEstimateInputs {
            http: ConnectionEstimator::http_fallback(active),
            database: active_db_connections,
            external: self.resources.active_external_connections().await,
            websocket: self.resources.active_websocket_connections().await,
        });
        self.connections.record(counts.total(), Utc::now()).await;

        let inputs = RawLoadInputs {
            cpu_utilization: self.resources.cpu_utilization().await,
            memory_used_bytes: self.resources.memory_used_bytes().await,
            memory_total_bytes: self.resources.memory_total_bytes().await,
            active_requests: active,
            queued_requests: queued,
            requests_in_window: active,
            window_seconds: self.config.cache_refresh_interval_seconds as f64,
            average_response_time_ms: 0.0,
            successful_in_window: active,
            failed_in_window: 0,
            active_db_connections,
            active_thread_pool_workers: self.resources.active_thread_pool_workers().await,
            max_thread_pool_workers: self.resources.max_thread_pool_workers().await,
            repeat_request_rate: self.resources.repeat_request_rate().await,
            average_batch_size: self.resources.average_batch_size().await,
        };

        debug!(active, queued, "recomputed system load metrics");
        self.calculator.calculate(&inputs)
    }

    pub async fn peak_connections(&self) -> optimizer_common::PeakConnectionMetrics {
        self.connections.snapshot().await
    }
}
