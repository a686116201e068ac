use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use optimizer_common::{
    Bottleneck, CachingPolicy, CachingRecommendation, EngineConfig, Error, ExecutionMetrics,
    InsightsThresholds, ModelStatistics, Opportunity, OptimizationRecommendation, PerformanceGrade,
    PredictionResult, Priority, RequestType, Result, RiskLevel, Severity, Strategy, SystemLoadMetrics,
    SystemPerformanceInsights,
};
use tokio::sync::RwLock;

use crate::pattern::PatternRecognitionEngine;

/// Plausible upper bound on the fraction of execution time a strategy can
/// shave off, used to turn a pattern weight into an estimated-improvement
/// figure. These are judgment calls, not measurements; see the validation
/// framework for the mechanism that keeps the model honest over time.
fn max_gain_fraction(strategy: Strategy) -> f64 {
    match strategy {
        Strategy::None => 0.0,
        Strategy::EnableCaching => 0.9,
        Strategy::Parallelization => 0.5,
        Strategy::Batching => 0.3,
        Strategy::LazyLoading => 0.2,
        Strategy::DatabaseOptimization => 0.4,
        Strategy::ResourcePooling => 0.25,
        Strategy::CompressionOptimization => 0.15,
        Strategy::MemoryOptimization => 0.2,
    }
}

fn risk_for_strategy(strategy: Strategy) -> RiskLevel {
    match strategy {
        Strategy::None => RiskLevel::VeryLow,
        Strategy::EnableCaching | Strategy::Batching | Strategy::CompressionOptimization => {
            RiskLevel::Low
        }
        Strategy::LazyLoading => RiskLevel::Low,
        Strategy::Parallelization | Strategy::ResourcePooling | Strategy::MemoryOptimization => {
            RiskLevel::Medium
        }
        Strategy::DatabaseOptimization => RiskLevel::High,
    }
}

fn priority_for(confidence: f32, estimated_gain_percent: f32) -> Priority {
    if confidence >= 0.9 && estimated_gain_percent >= 50.0 {
        Priority::Critical
    } else if confidence >= 0.9 {
        Priority::High
    } else if confidence >= 0.8 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Turns learned pattern weights and recent execution metrics into a
/// concrete (or empty) optimization recommendation for one request type,
/// and owns the batching/retraining/insight-reporting surface the rest of
/// the system drives: pending predictions accumulate via
/// [`OptimizationEngine::learn_from_execution`] until enough have landed to
/// retrain the pattern model, and the resulting history feeds
/// [`OptimizationEngine::get_system_insights`].
pub struct OptimizationEngine {
    config: EngineConfig,
    disposed: AtomicBool,
    learning_enabled: AtomicBool,
    pending: RwLock<Vec<PredictionResult>>,
    history: RwLock<VecDeque<PredictionResult>>,
    model_stats: RwLock<ModelStatistics>,
}

impl OptimizationEngine {
    pub fn new(config: EngineConfig) -> Self {
        let learning_enabled = config.learning_enabled;
        Self {
            config,
            disposed: AtomicBool::new(false),
            learning_enabled: AtomicBool::new(learning_enabled),
            pending: RwLock::new(Vec::new()),
            history: RwLock::new(VecDeque::new()),
            model_stats: RwLock::new(ModelStatistics {
                accuracy: 0.0,
                f1_score: 0.0,
                training_data_points: 0,
                last_retrained: Utc::now(),
                average_prediction_time_ms: 0.0,
            }),
        }
    }

    fn ensure_not_disposed(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Idempotent: disposing an already-disposed engine is a no-op, not an
    /// error. Pending, not-yet-retrained predictions are dropped.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pending.write().await.clear();
    }

    pub async fn set_learning_mode(&self, enabled: bool) -> Result<()> {
        self.ensure_not_disposed()?;
        self.learning_enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    /// Scores a single request type's learned pattern against its recent
    /// execution metrics.
    pub fn analyze_request(
        &self,
        metrics: &ExecutionMetrics,
        best_pattern: Option<(Strategy, f32)>,
    ) -> Result<OptimizationRecommendation> {
        self.ensure_not_disposed()?;
        metrics.validate()?;

        if metrics.total_executions < self.config.min_executions_for_analysis as u64 {
            return Ok(OptimizationRecommendation::none(format!(
                "only {} execution(s) recorded, need at least {}",
                metrics.total_executions, self.config.min_executions_for_analysis
            )));
        }

        let Some((strategy, confidence)) = best_pattern else {
            return Ok(OptimizationRecommendation::none(
                "no learned pattern for this request type yet",
            ));
        };

        if confidence < self.config.min_confidence_score {
            return Ok(OptimizationRecommendation::none(format!(
                "best candidate {strategy:?} has confidence {confidence:.2}, below the {:.2} threshold",
                self.config.min_confidence_score
            )));
        }

        let gain_fraction = confidence as f64 * max_gain_fraction(strategy);
        let estimated_improvement_ms = metrics.average_execution_time_ms * gain_fraction;
        let estimated_gain_percent = (gain_fraction * 100.0) as f32;
        let risk = risk_for_strategy(strategy);
        let priority = priority_for(confidence, estimated_gain_percent);

        let recommendation = OptimizationRecommendation {
            strategy,
            confidence,
            estimated_improvement_ms,
            reasoning: format!(
                "{strategy:?} selected with pattern confidence {confidence:.2} over {} executions averaging {:.1}ms",
                metrics.total_executions, metrics.average_execution_time_ms
            ),
            priority,
            risk,
            estimated_gain_percent,
        };
        recommendation.validate().map_err(|e| Error::Internal(e.to_string()))?;
        Ok(recommendation)
    }

    /// Scales the batch size toward `max_batch_size` as CPU headroom grows,
    /// never dropping below `default_batch_size`.
    pub fn predict_optimal_batch_size(&self, current_load: &SystemLoadMetrics) -> Result<u32> {
        self.ensure_not_disposed()?;
        let headroom = (1.0 - current_load.cpu_utilization as f64).clamp(0.0, 1.0);
        let span = (self.config.max_batch_size.max(self.config.default_batch_size)
            - self.config.default_batch_size) as f64;
        let scaled = self.config.default_batch_size as f64 + headroom * span;
        Ok(scaled.round() as u32)
    }

    /// Whether a response is worth caching given observed access frequency
    /// and a predicted hit rate, under a per-request-type policy.
    pub fn should_cache(
        &self,
        access_frequency: f32,
        predicted_hit_rate: f32,
        policy: &CachingPolicy,
    ) -> Result<CachingRecommendation> {
        self.ensure_not_disposed()?;
        let should_cache = policy.enable_ai_analysis
            && access_frequency >= policy.min_access_frequency
            && predicted_hit_rate >= policy.min_predicted_hit_rate;

        let ttl_seconds = if policy.use_dynamic_ttl {
            let boost = (predicted_hit_rate * 2.0).max(1.0);
            (policy.default_ttl_seconds as f32 * boost) as u64
        } else {
            policy.default_ttl_seconds
        };

        Ok(CachingRecommendation {
            should_cache,
            ttl_seconds,
            scope: policy.preferred_scope,
            predicted_hit_rate,
        })
    }

    /// Records the outcome of an applied strategy. Predictions accumulate in
    /// a pending batch; once `minimum_predictions_for_retraining` have
    /// landed, the batch is drained into `patterns.retrain`. A disabled
    /// learning mode records nothing.
    pub async fn learn_from_execution(
        &self,
        patterns: &PatternRecognitionEngine,
        request_type: &RequestType,
        applied_strategies: Vec<Strategy>,
        actual_improvement_ms: f64,
        metrics: ExecutionMetrics,
    ) -> Result<()> {
        self.ensure_not_disposed()?;
        if !self.learning_enabled.load(Ordering::SeqCst) {
            return Ok(());
        }

        let prediction = PredictionResult {
            request_type: request_type.clone(),
            predicted_strategies: applied_strategies,
            actual_improvement_ms,
            timestamp: Utc::now(),
            metrics,
        };

        {
            let mut history = self.history.write().await;
            history.push_back(prediction.clone());
            while history.len() > self.config.max_history_size {
                history.pop_front();
            }
        }

        let batch = {
            let mut pending = self.pending.write().await;
            pending.push(prediction);
            if pending.len() >= self.config.minimum_predictions_for_retraining as usize {
                Some(std::mem::take(&mut *pending))
            } else {
                None
            }
        };

        if let Some(batch) = batch {
            let started = std::time::Instant::now();
            patterns.retrain(Some(&batch)).await?;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            let successes = batch
                .iter()
                .filter(|p| p.metrics.success_rate() >= 0.5)
                .count() as f64;
            let rate = successes / batch.len() as f64;

            let mut stats = self.model_stats.write().await;
            stats.training_data_points += batch.len() as u64;
            stats.accuracy = rate;
            stats.f1_score = rate;
            stats.last_retrained = Utc::now();
            stats.average_prediction_time_ms = elapsed_ms;
        }

        Ok(())
    }

    pub async fn get_model_statistics(&self) -> Result<ModelStatistics> {
        self.ensure_not_disposed()?;
        Ok(self.model_stats.read().await.clone())
    }

    /// Builds bottleneck/opportunity findings from a load snapshot and
    /// configured thresholds, and attaches the most recently learned
    /// predictions. CPU, memory and error-rate saturation are bottlenecks;
    /// repeat-request rate, small batch sizes and database pool pressure are
    /// opportunities, never bottlenecks - they describe unused headroom, not
    /// active failure.
    pub async fn get_system_insights(
        &self,
        analysis_period_seconds: i64,
        current_load: &SystemLoadMetrics,
        thresholds: &InsightsThresholds,
        health_score: f64,
        grade: PerformanceGrade,
    ) -> Result<SystemPerformanceInsights> {
        self.ensure_not_disposed()?;

        let mut bottlenecks = Vec::new();
        if current_load.cpu_utilization as f64 >= thresholds.cpu_critical {
            bottlenecks.push(Bottleneck {
                component: "CPU".into(),
                severity: Severity::Critical,
                description: format!("CPU utilization at {:.0}%", current_load.cpu_utilization * 100.0),
            });
        } else if current_load.cpu_utilization as f64 >= thresholds.cpu_high {
            bottlenecks.push(Bottleneck {
                component: "CPU".into(),
                severity: Severity::High,
                description: format!("CPU utilization at {:.0}%", current_load.cpu_utilization * 100.0),
            });
        }
        if current_load.memory_utilization as f64 >= thresholds.memory_critical {
            bottlenecks.push(Bottleneck {
                component: "Memory".into(),
                severity: Severity::Critical,
                description: format!(
                    "Memory utilization at {:.0}%",
                    current_load.memory_utilization * 100.0
                ),
            });
        } else if current_load.memory_utilization as f64 >= thresholds.memory_high {
            bottlenecks.push(Bottleneck {
                component: "Memory".into(),
                severity: Severity::High,
                description: format!(
                    "Memory utilization at {:.0}%",
                    current_load.memory_utilization * 100.0
                ),
            });
        }
        if current_load.error_rate as f64 >= thresholds.error_rate_critical {
            bottlenecks.push(Bottleneck {
                component: "Application".into(),
                severity: Severity::Critical,
                description: format!("Error rate at {:.1}%", current_load.error_rate * 100.0),
            });
        } else if current_load.error_rate as f64 >= thresholds.error_rate_high {
            bottlenecks.push(Bottleneck {
                component: "Application".into(),
                severity: Severity::High,
                description: format!("Error rate at {:.1}%", current_load.error_rate * 100.0),
            });
        }

        let mut opportunities = Vec::new();
        if current_load.repeat_request_rate as f64 > thresholds.repeat_rate_opportunity {
            opportunities.push(Opportunity {
                title: "Implement Response Caching".into(),
                description: format!(
                    "{:.0}% of requests repeat an already-seen key",
                    current_load.repeat_request_rate * 100.0
                ),
                priority: Priority::Medium,
            });
        }
        if (current_load.average_batch_size as f64) < thresholds.batch_size_opportunity {
            opportunities.push(Opportunity {
                title: "Implement Request Batching".into(),
                description: format!(
                    "average batch size is {:.1}, below the {:.1} target",
                    current_load.average_batch_size, thresholds.batch_size_opportunity
                ),
                priority: Priority::Medium,
            });
        }
        if current_load.database_pool_utilization as f64 > thresholds.db_pool_opportunity {
            opportunities.push(Opportunity {
                title: "Optimize Database Connection Pooling".into(),
                description: format!(
                    "database pool utilization at {:.0}%",
                    current_load.database_pool_utilization * 100.0
                ),
                priority: Priority::Medium,
            });
        }

        let predictions: Vec<PredictionResult> = self.history.read().await.iter().rev().take(20).cloned().collect();

        let mut key_metrics = HashMap::new();
        key_metrics.insert("cpu_utilization".to_string(), current_load.cpu_utilization as f64);
        key_metrics.insert(
            "memory_utilization".to_string(),
            current_load.memory_utilization as f64,
        );
        key_metrics.insert("error_rate".to_string(), current_load.error_rate as f64);
        key_metrics.insert("throughput_rps".to_string(), current_load.throughput_rps as f64);
        key_metrics.insert("health_score".to_string(), health_score);

        Ok(SystemPerformanceInsights {
            analysis_period_seconds,
            analysis_time: Utc::now(),
            health_score,
            performance_grade: grade,
            bottlenecks,
            opportunities,
            predictions,
            key_metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn metrics(total: u64, avg_ms: f64) -> ExecutionMetrics {
        ExecutionMetrics {
            request_type: "Search".into(),
            total_executions: total,
            successful_executions: total,
            failed_executions: 0,
            average_execution_time_ms: avg_ms,
            median_execution_time_ms: avg_ms,
            p95_execution_time_ms: avg_ms,
            p99_execution_time_ms: avg_ms,
            concurrent_executions: 0,
            memory_allocated_bytes: 0,
            sample_period_seconds: 60,
            last_execution: Utc::now(),
            cpu_usage_percent: 0.0,
            database_calls: 0,
            external_api_calls: 0,
        }
    }

    fn load() -> SystemLoadMetrics {
        SystemLoadMetrics {
            cpu_utilization: 0.1,
            memory_utilization: 0.1,
            active_requests: 0,
            queued_requests: 0,
            throughput_rps: 0.0,
            average_response_time_ms: 0.0,
            error_rate: 0.0,
            database_pool_utilization: 0.1,
            thread_pool_utilization: 0.1,
            available_memory_bytes: 0,
            repeat_request_rate: 0.0,
            average_batch_size: 20.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn insufficient_history_yields_none() {
        let engine = OptimizationEngine::new(EngineConfig::default());
        let rec = engine.analyze_request(&metrics(2, 100.0), None).unwrap();
        assert_eq!(rec.strategy, Strategy::None);
        assert_eq!(rec.priority, Priority::Low);
        assert_eq!(rec.estimated_gain_percent, 0.0);
    }

    #[test]
    fn low_confidence_pattern_yields_none() {
        let engine = OptimizationEngine::new(EngineConfig::default());
        let rec = engine
            .analyze_request(&metrics(50, 100.0), Some((Strategy::EnableCaching, 0.2)))
            .unwrap();
        assert_eq!(rec.strategy, Strategy::None);
    }

    #[test]
    fn confident_pattern_produces_recommendation() {
        let engine = OptimizationEngine::new(EngineConfig::default());
        let rec = engine
            .analyze_request(&metrics(50, 200.0), Some((Strategy::EnableCaching, 0.95)))
            .unwrap();
        assert_eq!(rec.strategy, Strategy::EnableCaching);
        assert!(rec.estimated_improvement_ms > 0.0);
        assert!(rec.confidence >= 0.9);
    }

    #[test]
    fn invalid_metrics_are_rejected() {
        let engine = OptimizationEngine::new(EngineConfig::default());
        let mut bad = metrics(10, 100.0);
        bad.successful_executions = 3;
        bad.failed_executions = 3;
        assert!(engine.analyze_request(&bad, None).is_err());
    }

    #[tokio::test]
    async fn disposed_engine_rejects_every_operation() {
        let engine = OptimizationEngine::new(EngineConfig::default());
        engine.dispose().await;
        assert!(engine.is_disposed());
        assert!(engine.analyze_request(&metrics(50, 100.0), None).is_err());
        assert!(engine.predict_optimal_batch_size(&load()).is_err());
        assert!(engine.get_model_statistics().await.is_err());
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let engine = OptimizationEngine::new(EngineConfig::default());
        engine.dispose().await;
        engine.dispose().await;
        assert!(engine.is_disposed());
    }

    #[test]
    fn batch_size_scales_with_cpu_headroom() {
        let engine = OptimizationEngine::new(EngineConfig::default());
        let mut idle = load();
        idle.cpu_utilization = 0.0;
        let mut busy = load();
        busy.cpu_utilization = 0.95;
        let idle_batch = engine.predict_optimal_batch_size(&idle).unwrap();
        let busy_batch = engine.predict_optimal_batch_size(&busy).unwrap();
        assert!(idle_batch > busy_batch);
    }

    #[tokio::test]
    async fn learn_from_execution_retrains_once_batch_is_full() {
        let mut config = EngineConfig::default();
        config.minimum_predictions_for_retraining = 2;
        config.min_executions_for_analysis = 2;
        let engine = OptimizationEngine::new(config.clone());
        let patterns = PatternRecognitionEngine::new(&config);

        engine
            .learn_from_execution(
                &patterns,
                &"Search".to_string(),
                vec![Strategy::EnableCaching],
                120.0,
                metrics(10, 100.0),
            )
            .await
            .unwrap();
        assert_eq!(engine.get_model_statistics().await.unwrap().training_data_points, 0);

        engine
            .learn_from_execution(
                &patterns,
                &"Search".to_string(),
                vec![Strategy::EnableCaching],
                130.0,
                metrics(10, 100.0),
            )
            .await
            .unwrap();

        let stats = engine.get_model_statistics().await.unwrap();
        assert_eq!(stats.training_data_points, 2);
        assert!(patterns.has_sufficient_data(&"Search".to_string()).await);
    }

    #[tokio::test]
    async fn disabled_learning_mode_skips_recording() {
        let engine = OptimizationEngine::new(EngineConfig::default());
        engine.set_learning_mode(false).await.unwrap();
        let patterns = PatternRecognitionEngine::new(&EngineConfig::default());
        engine
            .learn_from_execution(
                &patterns,
                &"Search".to_string(),
                vec![Strategy::EnableCaching],
                120.0,
                metrics(10, 100.0),
            )
            .await
            .unwrap();
        assert_eq!(engine.get_model_statistics().await.unwrap().training_data_points, 0);
    }

    #[tokio::test]
    async fn insights_flags_cpu_bottleneck_not_warning() {
        let engine = OptimizationEngine::new(EngineConfig::default());
        let mut hot = load();
        hot.cpu_utilization = 0.85;
        let thresholds = InsightsThresholds::default();
        let insights = engine
            .get_system_insights(60, &hot, &thresholds, 0.5, PerformanceGrade::C)
            .await
            .unwrap();
        assert_eq!(insights.bottlenecks.len(), 1);
        assert_eq!(insights.bottlenecks[0].component, "CPU");
        assert_eq!(insights.bottlenecks[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn insights_flags_db_pool_as_opportunity_not_bottleneck() {
        let engine = OptimizationEngine::new(EngineConfig::default());
        let mut saturated = load();
        saturated.database_pool_utilization = 0.95;
        let thresholds = InsightsThresholds::default();
        let insights = engine
            .get_system_insights(60, &saturated, &thresholds, 0.9, PerformanceGrade::A)
            .await
            .unwrap();
        assert!(insights.bottlenecks.is_empty());
        assert_eq!(insights.opportunities.len(), 1);
        assert_eq!(insights.opportunities[0].title, "Optimize Database Connection Pooling");
    }
}
