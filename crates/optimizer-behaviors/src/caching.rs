use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use optimizer_common::{CachingBehaviorConfig, CachingPolicy, CachingRecommendation, RequestType};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pipeline::{Next, PipelineBehavior, PipelineRequest, PipelineResponse};
use crate::plugins::{CachingPolicyProvider, RecommendationCache, StaticCachingPolicyProvider};

const HIT_RATE_EMA_ALPHA: f32 = 0.3;

struct FrequencyState {
    access_count: u64,
    hit_count: u64,
    hit_rate_ema: f32,
    last_access: chrono::DateTime<Utc>,
}

impl FrequencyState {
    fn new() -> Self {
        Self {
            access_count: 0,
            hit_count: 0,
            hit_rate_ema: 0.0,
            last_access: Utc::now(),
        }
    }

    fn record(&mut self, hit: bool) {
        self.access_count += 1;
        if hit {
            self.hit_count += 1;
        }
        let observed = if hit { 1.0 } else { 0.0 };
        self.hit_rate_ema = HIT_RATE_EMA_ALPHA * observed + (1.0 - HIT_RATE_EMA_ALPHA) * self.hit_rate_ema;
        self.last_access = Utc::now();
    }

    fn access_frequency_per_minute(&self, window_start: chrono::DateTime<Utc>) -> f32 {
        let minutes = (Utc::now() - window_start).num_seconds() as f32 / 60.0;
        if minutes <= 0.0 {
            return self.access_count as f32;
        }
        self.access_count as f32 / minutes
    }
}

/// Decides, per request type, whether the *optimization recommendation* for
/// that type is worth caching, and delegates storage to a pluggable
/// [`RecommendationCache`]. This never caches the response payload itself -
/// `next` always runs, regardless of cache hit or miss. A hit only tells the
/// caller a recommendation already exists for the cache key; what to do with
/// it (e.g. skip re-running AI analysis) is the caller's decision.
pub struct CachingBehavior {
    enable_caching: bool,
    cache: Arc<dyn RecommendationCache>,
    policies: Arc<dyn CachingPolicyProvider>,
    frequency: RwLock<HashMap<RequestType, FrequencyState>>,
    started_at: chrono::DateTime<Utc>,
}

impl CachingBehavior {
    pub fn new(
        enable_caching: bool,
        cache: Arc<dyn RecommendationCache>,
        policies: Arc<dyn CachingPolicyProvider>,
    ) -> Self {
        Self {
            enable_caching,
            cache,
            policies,
            frequency: RwLock::new(HashMap::new()),
            started_at: Utc::now(),
        }
    }

    /// Convenience constructor for hosts with no per-type policy needs: every
    /// request type gets the same policy derived from `config`.
    pub fn with_global_config(config: CachingBehaviorConfig, cache: Arc<dyn RecommendationCache>) -> Self {
        let enable_caching = config.enable_caching;
        Self::new(enable_caching, cache, Arc::new(StaticCachingPolicyProvider::new(config)))
    }

    pub async fn evaluate(&self, request_type: &RequestType, execution_time_ms: f64) -> CachingRecommendation {
        let policy = self.policies.policy_for(request_type);
        if !self.enable_caching || !policy.enable_ai_analysis {
            return CachingRecommendation {
                should_cache: false,
                ttl_seconds: 0,
                scope: policy.preferred_scope,
                predicted_hit_rate: 0.0,
            };
        }

        let frequency = self.frequency.read().await;
        let (access_freq, predicted_hit_rate) = match frequency.get(request_type) {
            Some(state) => (
                state.access_frequency_per_minute(self.started_at),
                state.hit_rate_ema,
            ),
            None => (0.0, 0.0),
        };
        drop(frequency);

        let should_cache = execution_time_ms >= policy.min_execution_time_for_caching_ms as f64
            && access_freq >= policy.min_access_frequency
            && predicted_hit_rate >= policy.min_predicted_hit_rate;

        let ttl_seconds = if policy.use_dynamic_ttl {
            let boost = (predicted_hit_rate * 2.0).max(1.0);
            (policy.default_ttl_seconds as f32 * boost) as u64
        } else {
            policy.default_ttl_seconds
        };

        CachingRecommendation {
            should_cache,
            ttl_seconds,
            scope: policy.preferred_scope,
            predicted_hit_rate,
        }
    }

    async fn record_outcome(&self, request_type: &RequestType, hit: bool) {
        let mut frequency = self.frequency.write().await;
        frequency
            .entry(request_type.clone())
            .or_insert_with(FrequencyState::new)
            .record(hit);
    }

    fn cache_key(request: &PipelineRequest) -> String {
        format!("{}:{}", request.request_type, request.payload)
    }

    fn response_size(response: &PipelineResponse) -> u64 {
        serde_json::to_vec(&response.payload)
            .map(|bytes| bytes.len() as u64)
            .unwrap_or(u64::MAX)
    }
}

#[async_trait]
impl PipelineBehavior for CachingBehavior {
    async fn handle(
        &self,
        request: PipelineRequest,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> optimizer_common::Result<PipelineResponse> {
        if !self.enable_caching {
            return next.run(request, cancel).await;
        }

        let key = Self::cache_key(&request);
        let cache_hit = match self.cache.get(&key).await {
            Ok(cached) => cached.is_some(),
            Err(err) => {
                warn!(error = %err, "recommendation cache read failed, treating as miss");
                false
            }
        };
        self.record_outcome(&request.request_type, cache_hit).await;
        debug!(request_type = %request.request_type, cache_hit, "recommendation cache consulted");

        let started = std::time::Instant::now();
        let request_type = request.request_type.clone();
        let response = next.run(request, cancel).await?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        if !cache_hit {
            let policy = self.policies.policy_for(&request_type);
            let recommendation = self.evaluate(&request_type, elapsed_ms).await;
            let size_ok = Self::response_size(&response) <= policy.max_cached_response_size_bytes;
            if recommendation.should_cache && size_ok {
                let to_store = optimizer_common::OptimizationRecommendation {
                    strategy: optimizer_common::Strategy::EnableCaching,
                    confidence: recommendation.predicted_hit_rate,
                    estimated_improvement_ms: elapsed_ms,
                    reasoning: "observed access frequency and hit rate cross the caching policy".into(),
                    priority: optimizer_common::Priority::Medium,
                    risk: optimizer_common::RiskLevel::Low,
                    estimated_gain_percent: (recommendation.predicted_hit_rate * 100.0).min(100.0),
                };
                if let Err(err) = self.cache.put(&key, to_store, recommendation.ttl_seconds).await {
                    warn!(error = %err, "recommendation cache write failed, discarding");
                }
            }
        }

        Ok(response)
    }

    fn name(&self) -> &'static str {
        "caching"
    }
}
