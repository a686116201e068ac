pub mod ai_optimization;
pub mod caching;
pub mod load_metrics;
pub mod performance_tracking;
pub mod pipeline;
pub mod plugins;

pub use ai_optimization::AiOptimizationBehavior;
pub use caching::CachingBehavior;
pub use load_metrics::SystemLoadMetricsProvider;
pub use performance_tracking::PerformanceTrackingBehavior;
pub use pipeline::{Next, PipelineBehavior, PipelineRequest, PipelineResponse, SharedBehavior};
pub use plugins::{
    ActiveRequestCounter, CachingPolicyProvider, ForecastingHook, MetricsExporter, NullMetricsExporter,
    PerTypeCachingPolicyProvider, RecommendationCache, StaticCachingPolicyProvider, SystemResourceProvider,
};
