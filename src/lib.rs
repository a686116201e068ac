//! Adaptive request-optimization middleware: learns per-request-type
//! execution patterns and turns them into caching and optimization
//! recommendations, without taking the pipeline transport itself as a
//! dependency.

pub mod suite;

pub use optimizer_analytics::{
    ConnectionEstimateInputs, ConnectionEstimator, ConnectionMetricsCollector, ExecutionRecord, HealthScorer,
    RawLoadInputs, RequestAnalysisStore, SystemMetricsCalculator,
};
pub use optimizer_behaviors::{
    ActiveRequestCounter, AiOptimizationBehavior, CachingBehavior, CachingPolicyProvider, ForecastingHook,
    MetricsExporter, Next, NullMetricsExporter, PerTypeCachingPolicyProvider, PipelineBehavior,
    PipelineRequest, PipelineResponse, RecommendationCache, SharedBehavior, StaticCachingPolicyProvider,
    SystemLoadMetricsProvider, SystemResourceProvider,
};
pub use optimizer_cleanup::{CleanupReport, DataCleanupManager, PredictionHistory};
pub use optimizer_common::*;
pub use optimizer_engine::{
    impact_tier, load_bucket, ImpactTier, LoadBucket, OptimizationEngine, PatternRecognitionEngine,
    ValidationFramework,
};
pub use optimizer_timeseries::{Anomaly, AnomalyDetector, TimeSeriesStore};

pub use suite::OptimizationSuite;
