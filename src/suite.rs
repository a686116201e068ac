use std::sync::Arc;

use optimizer_analytics::{HealthScorer, RequestAnalysisStore, SystemMetricsCalculator};
use optimizer_behaviors::{
    ActiveRequestCounter, AiOptimizationBehavior, CachingBehavior, ForecastingHook, MetricsExporter,
    PerformanceTrackingBehavior, RecommendationCache, SystemLoadMetricsProvider, SystemResourceProvider,
};
use optimizer_cleanup::{DataCleanupManager, PredictionHistory};
use optimizer_common::{OptimizerConfig, Result, SystemPerformanceInsights};
use optimizer_engine::{OptimizationEngine, PatternRecognitionEngine, ValidationFramework};
use optimizer_timeseries::{AnomalyDetector, TimeSeriesStore};
use tokio_util::sync::CancellationToken;

/// External dependencies the host application supplies. Every field is a
/// plug-in trait object; the suite never talks to an OS, a network socket
/// or a specific cache implementation directly.
pub struct SuiteDependencies {
    pub recommendation_cache: Arc<dyn RecommendationCache>,
    pub metrics_exporter: Arc<dyn MetricsExporter>,
    pub active_request_counter: Arc<dyn ActiveRequestCounter>,
    pub system_resources: Arc<dyn SystemResourceProvider>,
    pub forecasting_hook: Option<Arc<dyn ForecastingHook>>,
}

/// The composition root: owns every store and engine, wires the pipeline
/// behaviors to them, and runs the background cleanup sweep for the
/// lifetime of the suite.
pub struct OptimizationSuite {
    config: OptimizerConfig,
    pub timeseries: Arc<TimeSeriesStore>,
    pub anomaly_detector: AnomalyDetector,
    pub analysis_store: Arc<RequestAnalysisStore>,
    pub health_scorer: HealthScorer,
    pub patterns: Arc<PatternRecognitionEngine>,
    pub optimization_engine: Arc<OptimizationEngine>,
    pub validation: ValidationFramework,
    pub caching: Arc<CachingBehavior>,
    pub load_metrics: Arc<SystemLoadMetricsProvider>,
    pub performance_tracking: Arc<PerformanceTrackingBehavior>,
    pub ai_optimization: Arc<AiOptimizationBehavior>,
    pub predictions: Arc<PredictionHistory>,
    cleanup: DataCleanupManager,
    export_loop_cancel: CancellationToken,
}

impl OptimizationSuite {
    pub fn new(config: OptimizerConfig, deps: SuiteDependencies) -> Arc<Self> {
        let timeseries = Arc::new(match deps.forecasting_hook {
            Some(hook) => TimeSeriesStore::with_forecasting_hook(config.engine.max_history_size, hook),
            None => TimeSeriesStore::new(config.engine.max_history_size),
        });
        let anomaly_detector = AnomalyDetector::new(
            config.engine.anomaly_z_threshold,
            config.engine.min_points_for_anomaly,
        );
        let analysis_store = Arc::new(RequestAnalysisStore::new());
        let health_scorer = HealthScorer::new(config.health_scorer.clone());
        let patterns = Arc::new(PatternRecognitionEngine::new(&config.engine));
        let optimization_engine = Arc::new(OptimizationEngine::new(config.engine.clone()));
        let validation = ValidationFramework::new(config.validation.clone());
        let predictions = Arc::new(PredictionHistory::new(config.cleanup.max_predictions));

        let caching = Arc::new(CachingBehavior::with_global_config(
            config.caching.clone(),
            deps.recommendation_cache,
        ));

        let calculator = SystemMetricsCalculator::new(config.connection_estimates.clone());
        let load_metrics = Arc::new(SystemLoadMetricsProvider::with_connection_estimates(
            config.load_metrics.clone(),
            calculator,
            deps.active_request_counter,
            deps.system_resources,
            config.connection_estimates.clone(),
        ));

        let performance_tracking = Arc::new(PerformanceTrackingBehavior::new(
            config.performance_tracking.clone(),
            analysis_store.clone(),
            deps.metrics_exporter,
        ));

        let ai_optimization = Arc::new(AiOptimizationBehavior::new(
            analysis_store.clone(),
            patterns.clone(),
            optimization_engine.clone(),
        ));

        let cleanup = DataCleanupManager::new(
            config.cleanup.clone(),
            timeseries.clone(),
            predictions.clone(),
            Some(analysis_store.clone()),
        );

        let export_loop_cancel = CancellationToken::new();
        let export_task_tracking = performance_tracking.clone();
        let export_cancel = export_loop_cancel.clone();
        tokio::spawn(async move {
            export_task_tracking.run_periodic_export(export_cancel).await;
        });

        Arc::new(Self {
            config,
            timeseries,
            anomaly_detector,
            analysis_store,
            health_scorer,
            patterns,
            optimization_engine,
            validation,
            caching,
            load_metrics,
            performance_tracking,
            ai_optimization,
            predictions,
            cleanup,
            export_loop_cancel,
        })
    }

    /// Produces a full system-performance snapshot: current health score
    /// and grade, bottlenecks/opportunities derived from the configured
    /// thresholds, and the most recent learned predictions.
    pub async fn insights(&self, analysis_period_seconds: i64) -> Result<SystemPerformanceInsights> {
        let load = self.load_metrics.current().await;
        let health_score = self.health_scorer.score(&load);
        let grade = self.health_scorer.grade(&load);

        self.optimization_engine
            .get_system_insights(
                analysis_period_seconds,
                &load,
                &self.config.insights_thresholds,
                health_score,
                grade,
            )
            .await
    }

    pub fn shutdown(&self) {
        self.cleanup.shutdown();
        self.export_loop_cancel.cancel();
    }
}

impl Drop for OptimizationSuite {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use optimizer_behaviors::NullMetricsExporter;
    use optimizer_common::OptimizationRecommendation;

    struct NullCache;
    #[async_trait]
    impl RecommendationCache for NullCache {
        async fn get(&self, _key: &str) -> Result<Option<OptimizationRecommendation>> {
            Ok(None)
        }
        async fn put(&self, _key: &str, _value: OptimizationRecommendation, _ttl_seconds: u64) -> Result<()> {
            Ok(())
        }
        async fn invalidate(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    struct ZeroCounter;
    #[async_trait]
    impl ActiveRequestCounter for ZeroCounter {
        async fn active_requests(&self) -> u32 {
            0
        }
        async fn queued_requests(&self) -> u32 {
            0
        }
    }

    struct IdleResources;
    #[async_trait]
    impl SystemResourceProvider for IdleResources {
        async fn cpu_utilization(&self) -> f32 {
            0.1
        }
        async fn memory_used_bytes(&self) -> u64 {
            100
        }
        async fn memory_total_bytes(&self) -> u64 {
            1000
        }
        async fn active_db_connections(&self) -> u32 {
            0
        }
        async fn active_thread_pool_workers(&self) -> u32 {
            0
        }
        async fn max_thread_pool_workers(&self) -> u32 {
            10
        }
        async fn active_external_connections(&self) -> u32 {
            0
        }
        async fn active_websocket_connections(&self) -> u32 {
            0
        }
        async fn repeat_request_rate(&self) -> f32 {
            0.0
        }
        async fn average_batch_size(&self) -> f32 {
            20.0
        }
    }

    fn deps() -> SuiteDependencies {
        SuiteDependencies {
            recommendation_cache: Arc::new(NullCache),
            metrics_exporter: Arc::new(NullMetricsExporter),
            active_request_counter: Arc::new(ZeroCounter),
            system_resources: Arc::new(IdleResources),
            forecasting_hook: None,
        }
    }

    #[tokio::test]
    async fn insights_reports_healthy_idle_system() {
        let suite = OptimizationSuite::new(OptimizerConfig::default(), deps());
        let insights = suite.insights(60).await.unwrap();
        assert!(insights.health_score > 0.8);
        assert!(insights.bottlenecks.is_empty());
    }

    #[tokio::test]
    async fn insights_flags_an_opportunity_for_small_average_batch_size() {
        let mut config = OptimizerConfig::default();
        config.insights_thresholds.batch_size_opportunity = 25.0;
        let suite = OptimizationSuite::new(config, deps());
        let insights = suite.insights(60).await.unwrap();
        assert!(insights
            .opportunities
            .iter()
            .any(|o| o.title == "Implement Request Batching"));
    }
}
