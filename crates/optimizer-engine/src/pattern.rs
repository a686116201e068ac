use std::collections::HashMap;

use chrono::{Datelike, Timelike, Weekday};
use optimizer_common::{Error, PredictionResult, RequestType, Result, Strategy};
use tokio::sync::RwLock;

/// Candidate strategies the pattern engine will ever assign a weight to.
/// `Strategy::None` is the "no recommendation" answer, not a learned
/// pattern, so it is excluded here.
pub const CANDIDATE_STRATEGIES: [Strategy; 8] = [
    Strategy::EnableCaching,
    Strategy::Parallelization,
    Strategy::Batching,
    Strategy::LazyLoading,
    Strategy::DatabaseOptimization,
    Strategy::ResourcePooling,
    Strategy::CompressionOptimization,
    Strategy::MemoryOptimization,
];

/// How much a prediction's observed improvement should count toward the
/// learned weight for the strategy that produced it. Small wins are real but
/// noisy; large wins move the needle more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactTier {
    Low,
    Medium,
    High,
}

/// `Low < 50ms`, `50ms <= Medium <= 100ms`, `High > 100ms`.
pub fn impact_tier(improvement_ms: f64) -> ImpactTier {
    if improvement_ms > 100.0 {
        ImpactTier::High
    } else if improvement_ms >= 50.0 {
        ImpactTier::Medium
    } else {
        ImpactTier::Low
    }
}

impl ImpactTier {
    fn weight_multiplier(self) -> f32 {
        match self {
            ImpactTier::High => 1.0,
            ImpactTier::Medium => 0.7,
            ImpactTier::Low => 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadBucket {
    Low,
    Medium,
    High,
}

/// `Low <= 50 concurrent executions`, `Medium <= 100`, `High > 100`.
pub fn load_bucket(concurrent_executions: u32) -> LoadBucket {
    if concurrent_executions > 100 {
        LoadBucket::High
    } else if concurrent_executions > 50 {
        LoadBucket::Medium
    } else {
        LoadBucket::Low
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TemporalBucket {
    successes: u32,
    total: u32,
}

impl TemporalBucket {
    fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.successes += 1;
        }
    }

    fn success_rate(&self) -> Option<f32> {
        if self.total == 0 {
            None
        } else {
            Some(self.successes as f32 / self.total as f32)
        }
    }
}

#[derive(Default)]
struct TypeState {
    weights: HashMap<Strategy, f32>,
    observations: u32,
    hourly: HashMap<u32, TemporalBucket>,
    daily: HashMap<Weekday, TemporalBucket>,
    load: HashMap<LoadBucket, TemporalBucket>,
}

/// Learns, per request type, which optimization strategy tends to pay off.
/// Weights are blended via an exponential moving average so recent outcomes
/// matter more than old ones without discarding history outright. Updates
/// arrive in batches via [`retrain`], gated upstream by a minimum-batch-size
/// policy rather than folding in every single outcome as it happens.
pub struct PatternRecognitionEngine {
    alpha: f32,
    min_executions_for_analysis: u32,
    state: RwLock<HashMap<RequestType, TypeState>>,
}

impl PatternRecognitionEngine {
    pub fn new(config: &optimizer_common::EngineConfig) -> Self {
        Self {
            alpha: config.retrain_ema_alpha,
            min_executions_for_analysis: config.min_executions_for_analysis,
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Folds a batch of recorded predictions into the learned weights, one
    /// request/strategy pair per predicted strategy. `None` is a programming
    /// error (the caller has nothing to retrain on); an empty slice is a
    /// harmless no-op.
    pub async fn retrain(&self, predictions: Option<&[PredictionResult]>) -> Result<()> {
        let Some(predictions) = predictions else {
            return Err(Error::InvalidArgument(
                "retrain requires a predictions batch, got none".into(),
            ));
        };

        let mut state = self.state.write().await;
        for prediction in predictions {
            let entry = state.entry(prediction.request_type.clone()).or_default();
            entry.observations += 1;

            let tier = impact_tier(prediction.actual_improvement_ms);
            let outcome_score =
                (prediction.metrics.success_rate() as f32 * tier.weight_multiplier()).clamp(0.0, 1.0);

            for strategy in &prediction.predicted_strategies {
                let weight = entry.weights.entry(*strategy).or_insert(outcome_score);
                *weight = self.alpha * outcome_score + (1.0 - self.alpha) * *weight;
            }

            let success = prediction.metrics.success_rate() >= 0.5;
            let hour = prediction.timestamp.hour();
            entry.hourly.entry(hour).or_default().record(success);
            let weekday = prediction.timestamp.weekday();
            entry.daily.entry(weekday).or_default().record(success);
            let bucket = load_bucket(prediction.metrics.concurrent_executions);
            entry.load.entry(bucket).or_default().record(success);
        }

        Ok(())
    }

    pub async fn weight_for(&self, request_type: &RequestType, strategy: Strategy) -> f32 {
        self.state
            .read()
            .await
            .get(request_type)
            .and_then(|s| s.weights.get(&strategy).copied())
            .unwrap_or(0.0)
    }

    /// The highest-weighted candidate strategy for a request type, if any
    /// observations have been recorded for it.
    pub async fn best_strategy(&self, request_type: &RequestType) -> Option<(Strategy, f32)> {
        let state = self.state.read().await;
        let entry = state.get(request_type)?;
        entry
            .weights
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(s, w)| (*s, *w))
    }

    pub async fn observation_count(&self, request_type: &RequestType) -> u32 {
        self.state
            .read()
            .await
            .get(request_type)
            .map(|s| s.observations)
            .unwrap_or(0)
    }

    pub async fn has_sufficient_data(&self, request_type: &RequestType) -> bool {
        self.observation_count(request_type).await >= self.min_executions_for_analysis
    }

    pub async fn reset(&self, request_type: &RequestType) {
        self.state.write().await.remove(request_type);
    }

    pub async fn tracked_request_types(&self) -> Vec<RequestType> {
        self.state.read().await.keys().cloned().collect()
    }

    pub async fn hourly_success_rate(&self, request_type: &RequestType, hour: u32) -> Option<f32> {
        self.state
            .read()
            .await
            .get(request_type)?
            .hourly
            .get(&hour)?
            .success_rate()
    }

    pub async fn daily_success_rate(&self, request_type: &RequestType, weekday: Weekday) -> Option<f32> {
        self.state
            .read()
            .await
            .get(request_type)?
            .daily
            .get(&weekday)?
            .success_rate()
    }

    pub async fn load_bucket_success_rate(
        &self,
        request_type: &RequestType,
        bucket: LoadBucket,
    ) -> Option<f32> {
        self.state
            .read()
            .await
            .get(request_type)?
            .load
            .get(&bucket)?
            .success_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use optimizer_common::{EngineConfig, ExecutionMetrics};

    fn config() -> EngineConfig {
        EngineConfig {
            retrain_ema_alpha: 0.5,
            min_executions_for_analysis: 3,
            ..EngineConfig::default()
        }
    }

    fn metrics(request_type: &str, success: bool, concurrent: u32) -> ExecutionMetrics {
        ExecutionMetrics {
            request_type: request_type.to_string(),
            total_executions: 10,
            successful_executions: if success { 10 } else { 0 },
            failed_executions: if success { 0 } else { 10 },
            average_execution_time_ms: 100.0,
            median_execution_time_ms: 90.0,
            p95_execution_time_ms: 150.0,
            p99_execution_time_ms: 200.0,
            concurrent_executions: concurrent,
            memory_allocated_bytes: 0,
            sample_period_seconds: 60,
            last_execution: Utc::now(),
            cpu_usage_percent: 10.0,
            database_calls: 0,
            external_api_calls: 0,
        }
    }

    fn prediction(request_type: &str, strategy: Strategy, improvement_ms: f64, success: bool) -> PredictionResult {
        PredictionResult {
            request_type: request_type.to_string(),
            predicted_strategies: vec![strategy],
            actual_improvement_ms: improvement_ms,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 8, 14, 0, 0).unwrap(),
            metrics: metrics(request_type, success, 10),
        }
    }

    #[tokio::test]
    async fn retrain_requires_a_batch() {
        let engine = PatternRecognitionEngine::new(&config());
        assert!(engine.retrain(None).await.is_err());
    }

    #[tokio::test]
    async fn retrain_blends_toward_recent_outcomes() {
        let engine = PatternRecognitionEngine::new(&config());
        let batch = vec![
            prediction("Search", Strategy::EnableCaching, 20.0, true),
            prediction("Search", Strategy::EnableCaching, 150.0, true),
        ];
        engine.retrain(Some(&batch)).await.unwrap();
        // first: tier Low (0.4) * success_rate 1.0 = 0.4, seeded as initial weight
        // second: tier High (1.0) * 1.0 = 1.0, blended: 0.5*1.0 + 0.5*0.4 = 0.7
        let w = engine.weight_for(&"Search".to_string(), Strategy::EnableCaching).await;
        assert!((w - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn best_strategy_picks_highest_weight() {
        let engine = PatternRecognitionEngine::new(&config());
        let batch = vec![
            prediction("Search", Strategy::EnableCaching, 20.0, true),
            prediction("Search", Strategy::Batching, 150.0, true),
        ];
        engine.retrain(Some(&batch)).await.unwrap();
        let (strategy, weight) = engine.best_strategy(&"Search".to_string()).await.unwrap();
        assert_eq!(strategy, Strategy::Batching);
        assert!(weight > 0.3);
    }

    #[tokio::test]
    async fn insufficient_data_below_threshold() {
        let engine = PatternRecognitionEngine::new(&config());
        let batch = vec![prediction("Search", Strategy::EnableCaching, 60.0, true)];
        engine.retrain(Some(&batch)).await.unwrap();
        assert!(!engine.has_sufficient_data(&"Search".to_string()).await);
        let batch = vec![
            prediction("Search", Strategy::EnableCaching, 60.0, true),
            prediction("Search", Strategy::EnableCaching, 60.0, true),
        ];
        engine.retrain(Some(&batch)).await.unwrap();
        assert!(engine.has_sufficient_data(&"Search".to_string()).await);
    }

    #[tokio::test]
    async fn unknown_request_type_has_no_best_strategy() {
        let engine = PatternRecognitionEngine::new(&config());
        assert!(engine.best_strategy(&"Unknown".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn impact_tier_boundaries() {
        assert_eq!(impact_tier(10.0), ImpactTier::Low);
        assert_eq!(impact_tier(49.9), ImpactTier::Low);
        assert_eq!(impact_tier(50.0), ImpactTier::Medium);
        assert_eq!(impact_tier(100.0), ImpactTier::Medium);
        assert_eq!(impact_tier(100.1), ImpactTier::High);
    }

    #[tokio::test]
    async fn temporal_buckets_track_success_rate() {
        let engine = PatternRecognitionEngine::new(&config());
        let batch = vec![
            prediction("Search", Strategy::EnableCaching, 60.0, true),
            prediction("Search", Strategy::EnableCaching, 60.0, false),
        ];
        engine.retrain(Some(&batch)).await.unwrap();
        let hourly = engine.hourly_success_rate(&"Search".to_string(), 14).await.unwrap();
        assert_eq!(hourly, 0.5);
        let daily = engine
            .daily_success_rate(&"Search".to_string(), Weekday::Mon)
            .await
            .unwrap();
        assert_eq!(daily, 0.5);
        let load = engine
            .load_bucket_success_rate(&"Search".to_string(), LoadBucket::Low)
            .await
            .unwrap();
        assert_eq!(load, 0.5);
    }
}
