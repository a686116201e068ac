use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifies a class of request the system tracks metrics for, e.g.
/// `"GetOrderById"` or `"search.products"`. Callers choose the granularity.
pub type RequestType = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    None,
    EnableCaching,
    Parallelization,
    Batching,
    LazyLoading,
    DatabaseOptimization,
    ResourcePooling,
    CompressionOptimization,
    MemoryOptimization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Global,
    User,
    Session,
    Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceGrade {
    A,
    B,
    C,
    D,
    F,
}

impl PerformanceGrade {
    pub fn from_health_score(score: f64) -> Self {
        match score {
            s if s >= 0.9 => PerformanceGrade::A,
            s if s >= 0.75 => PerformanceGrade::B,
            s if s >= 0.6 => PerformanceGrade::C,
            s if s >= 0.4 => PerformanceGrade::D,
            _ => PerformanceGrade::F,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationIssueKind {
    LowAccuracy,
    InconsistentPredictions,
    InsufficientData,
    StaleModel,
    SlowPredictions,
}

/// A single sample recorded against a named time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub key: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl TimeSeriesPoint {
    pub fn new(key: impl Into<String>, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp,
        }
    }
}

/// Rolling execution statistics for one request type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub request_type: RequestType,
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub average_execution_time_ms: f64,
    pub median_execution_time_ms: f64,
    pub p95_execution_time_ms: f64,
    pub p99_execution_time_ms: f64,
    pub concurrent_executions: u32,
    pub memory_allocated_bytes: u64,
    pub sample_period_seconds: u64,
    pub last_execution: DateTime<Utc>,
    pub cpu_usage_percent: f32,
    pub database_calls: u32,
    pub external_api_calls: u32,
}

impl ExecutionMetrics {
    pub fn validate(&self) -> Result<()> {
        if self.successful_executions + self.failed_executions != self.total_executions {
            return Err(Error::InvalidArgument(format!(
                "successful ({}) + failed ({}) != total ({}) for request type {}",
                self.successful_executions,
                self.failed_executions,
                self.total_executions,
                self.request_type
            )));
        }
        Ok(())
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_executions == 0 {
            return 1.0;
        }
        self.successful_executions as f64 / self.total_executions as f64
    }

    pub fn error_rate(&self) -> f64 {
        1.0 - self.success_rate()
    }
}

/// Point-in-time snapshot of system-wide load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemLoadMetrics {
    pub cpu_utilization: f32,
    pub memory_utilization: f32,
    pub active_requests: u32,
    pub queued_requests: u32,
    pub throughput_rps: f32,
    pub average_response_time_ms: f64,
    pub error_rate: f32,
    pub database_pool_utilization: f32,
    pub thread_pool_utilization: f32,
    pub available_memory_bytes: u64,
    /// Fraction of requests observed to repeat an already-seen cache key.
    pub repeat_request_rate: f32,
    /// Mean batch size across executions that went through a batching strategy.
    pub average_batch_size: f32,
    pub timestamp: DateTime<Utc>,
}

/// Estimated connection counts across the four categories the load metrics
/// provider tracks. Every field is saturating-arithmetic derived and can
/// never overflow or panic - an estimate that hits a ceiling clamps there
/// instead of wrapping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectionCounts {
    pub http: u32,
    pub database: u32,
    pub external: u32,
    pub websocket: u32,
}

impl ConnectionCounts {
    pub fn total(&self) -> u32 {
        self.http
            .saturating_add(self.database)
            .saturating_add(self.external)
            .saturating_add(self.websocket)
    }
}

/// Highest observed connection counts, bucketed by retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakConnectionMetrics {
    pub all_time_peak: u32,
    pub daily_peak: u32,
    pub hourly_peak: u32,
    pub last_peak_timestamp: DateTime<Utc>,
    pub current_day: NaiveDate,
    pub current_hour: u32,
}

/// A suggested optimization for a request type, or the "do nothing" answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    pub strategy: Strategy,
    pub confidence: f32,
    pub estimated_improvement_ms: f64,
    pub reasoning: String,
    pub priority: Priority,
    pub risk: RiskLevel,
    pub estimated_gain_percent: f32,
}

impl OptimizationRecommendation {
    pub fn none(reasoning: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::None,
            confidence: 0.0,
            estimated_improvement_ms: 0.0,
            reasoning: reasoning.into(),
            priority: Priority::Low,
            risk: RiskLevel::VeryLow,
            estimated_gain_percent: 0.0,
        }
    }

    /// `strategy = None ⇒ priority = Low ∧ estimated_gain_percent = 0`
    pub fn validate(&self) -> Result<()> {
        if matches!(self.strategy, Strategy::None)
            && (self.priority != Priority::Low || self.estimated_gain_percent != 0.0)
        {
            return Err(Error::InvalidArgument(
                "Strategy::None must carry Priority::Low and zero estimated gain".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub request_type: RequestType,
    pub predicted_strategies: Vec<Strategy>,
    pub actual_improvement_ms: f64,
    pub timestamp: DateTime<Utc>,
    pub metrics: ExecutionMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bottleneck {
    pub component: String,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPerformanceInsights {
    pub analysis_period_seconds: i64,
    pub analysis_time: DateTime<Utc>,
    pub health_score: f64,
    pub performance_grade: PerformanceGrade,
    pub bottlenecks: Vec<Bottleneck>,
    pub opportunities: Vec<Opportunity>,
    pub predictions: Vec<PredictionResult>,
    pub key_metrics: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachingRecommendation {
    pub should_cache: bool,
    pub ttl_seconds: u64,
    pub scope: Scope,
    pub predicted_hit_rate: f32,
}

/// Resolved caching policy for one request type. `CachingPolicyProvider`
/// implementations hand these out per-type instead of every caller sharing
/// one global config.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CachingPolicy {
    pub enable_ai_analysis: bool,
    pub min_execution_time_for_caching_ms: u64,
    pub max_cached_response_size_bytes: u64,
    pub min_access_frequency: f32,
    pub min_predicted_hit_rate: f32,
    pub use_dynamic_ttl: bool,
    pub default_ttl_seconds: u64,
    pub preferred_scope: Scope,
}

/// A time-series forecasting plug-in. Absent by default; `TimeSeriesStore`
/// consults it only when `forecast` is called.
#[async_trait]
pub trait ForecastingHook: Send + Sync {
    async fn forecast(&self, series: &str, horizon: Duration) -> Option<f64>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatistics {
    pub accuracy: f64,
    pub f1_score: f64,
    pub training_data_points: u64,
    pub last_retrained: DateTime<Utc>,
    pub average_prediction_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: ValidationIssueKind,
    pub severity: IssueSeverity,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_healthy: bool,
    pub overall_score: f64,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn healthy(overall_score: f64) -> Self {
        Self {
            is_healthy: true,
            overall_score,
            issues: Vec::new(),
        }
    }
}
