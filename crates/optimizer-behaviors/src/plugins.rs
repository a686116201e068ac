use async_trait::async_trait;
use optimizer_common::{
    CachingBehaviorConfig, CachingPolicy, ExecutionMetrics, OptimizationRecommendation, RequestType, Result,
};

pub use optimizer_common::ForecastingHook;

/// Ships collected metrics to wherever the host application wants them
/// (a metrics backend, a log sink, a test spy). Implementations must not
/// block the pipeline; slow exporters should buffer internally.
#[async_trait]
pub trait MetricsExporter: Send + Sync {
    async fn export_execution_metrics(&self, metrics: &[ExecutionMetrics]) -> Result<()>;
    async fn export_recommendation(&self, recommendation: &OptimizationRecommendation) -> Result<()>;
}

/// A no-op exporter for hosts that don't want metrics shipped anywhere.
pub struct NullMetricsExporter;

#[async_trait]
impl MetricsExporter for NullMetricsExporter {
    async fn export_execution_metrics(&self, _metrics: &[ExecutionMetrics]) -> Result<()> {
        Ok(())
    }

    async fn export_recommendation(&self, _recommendation: &OptimizationRecommendation) -> Result<()> {
        Ok(())
    }
}

/// Storage for optimization recommendations the caching behavior has
/// decided are worth keeping around. This never holds response payloads -
/// it caches the *decision* (which strategy, at what confidence), not the
/// answer to a request. Failures here are the caller's to swallow; this
/// trait may return `Err` freely.
#[async_trait]
pub trait RecommendationCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<OptimizationRecommendation>>;
    async fn put(&self, key: &str, value: OptimizationRecommendation, ttl_seconds: u64) -> Result<()>;
    async fn invalidate(&self, key: &str) -> Result<()>;
}

/// Reports how many requests are currently in flight, for load estimation.
#[async_trait]
pub trait ActiveRequestCounter: Send + Sync {
    async fn active_requests(&self) -> u32;
    async fn queued_requests(&self) -> u32;
}

/// Supplies OS/process-level resource figures the system-load provider
/// can't compute on its own.
#[async_trait]
pub trait SystemResourceProvider: Send + Sync {
    async fn cpu_utilization(&self) -> f32;
    async fn memory_used_bytes(&self) -> u64;
    async fn memory_total_bytes(&self) -> u64;
    async fn active_db_connections(&self) -> u32;
    async fn active_thread_pool_workers(&self) -> u32;
    async fn max_thread_pool_workers(&self) -> u32;
    async fn active_external_connections(&self) -> u32;
    async fn active_websocket_connections(&self) -> u32;
    async fn repeat_request_rate(&self) -> f32;
    async fn average_batch_size(&self) -> f32;
}

/// Resolves a [`CachingPolicy`] per request type. Kept synchronous since a
/// policy lookup is a plain in-memory decision, never an I/O call.
pub trait CachingPolicyProvider: Send + Sync {
    fn policy_for(&self, request_type: &RequestType) -> CachingPolicy;
}

/// Default provider: every request type shares one policy derived from a
/// single global [`CachingBehaviorConfig`].
pub struct StaticCachingPolicyProvider {
    policy: CachingPolicy,
}

impl StaticCachingPolicyProvider {
    pub fn new(config: CachingBehaviorConfig) -> Self {
        Self {
            policy: CachingPolicy::from(&config),
        }
    }
}

impl CachingPolicyProvider for StaticCachingPolicyProvider {
    fn policy_for(&self, _request_type: &RequestType) -> CachingPolicy {
        self.policy
    }
}

/// Per-request-type policy table, for hosts that want different caching
/// behavior per request type instead of one global config.
pub struct PerTypeCachingPolicyProvider {
    default_policy: CachingPolicy,
    overrides: std::collections::HashMap<RequestType, CachingPolicy>,
}

impl PerTypeCachingPolicyProvider {
    pub fn new(default_policy: CachingPolicy) -> Self {
        Self {
            default_policy,
            overrides: std::collections::HashMap::new(),
        }
    }

    pub fn with_override(mut self, request_type: impl Into<RequestType>, policy: CachingPolicy) -> Self {
        self.overrides.insert(request_type.into(), policy);
        self
    }
}

impl CachingPolicyProvider for PerTypeCachingPolicyProvider {
    fn policy_for(&self, request_type: &RequestType) -> CachingPolicy {
        self.overrides
            .get(request_type)
            .copied()
            .unwrap_or(self.default_policy)
    }
}
