use serde::{Deserialize, Serialize};

use crate::types::{CachingPolicy, RiskLevel, Scope};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub engine: EngineConfig,
    pub caching: CachingBehaviorConfig,
    pub load_metrics: LoadMetricsConfig,
    pub performance_tracking: PerformanceTrackingConfig,
    pub connection_estimates: ConnectionEstimateConfig,
    pub cleanup: CleanupConfig,
    pub health_scorer: HealthScorerConfig,
    pub insights_thresholds: InsightsThresholds,
    pub validation: ValidationConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            caching: CachingBehaviorConfig::default(),
            load_metrics: LoadMetricsConfig::default(),
            performance_tracking: PerformanceTrackingConfig::default(),
            connection_estimates: ConnectionEstimateConfig::default(),
            cleanup: CleanupConfig::default(),
            health_scorer: HealthScorerConfig::default(),
            insights_thresholds: InsightsThresholds::default(),
            validation: ValidationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub min_accuracy_error_threshold: f64,
    pub min_accuracy_warning_threshold: f64,
    /// F1 gate, kept distinct from `min_accuracy_error_threshold` even though
    /// both currently read 0.6 - accuracy and F1 are different statistics and
    /// can diverge once either default changes.
    pub min_f1_error_threshold: f64,
    pub min_training_data_points: u64,
    pub max_model_age_hours: i64,
    pub max_prediction_time_ms: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_accuracy_error_threshold: 0.5,
            min_accuracy_warning_threshold: 0.8,
            min_f1_error_threshold: 0.6,
            min_training_data_points: 100,
            max_model_age_hours: 168,
            max_prediction_time_ms: 200.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub enabled: bool,
    pub learning_enabled: bool,
    pub min_confidence_score: f32,
    pub min_executions_for_analysis: u32,
    pub model_update_interval_seconds: u64,
    pub max_automatic_optimization_risk: RiskLevel,
    pub default_batch_size: u32,
    pub max_batch_size: u32,
    pub minimum_predictions_for_retraining: u32,
    pub retrain_ema_alpha: f32,
    pub anomaly_z_threshold: f64,
    pub min_points_for_anomaly: usize,
    pub max_history_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            learning_enabled: true,
            min_confidence_score: 0.7,
            min_executions_for_analysis: 5,
            model_update_interval_seconds: 300,
            max_automatic_optimization_risk: RiskLevel::Medium,
            default_batch_size: 10,
            max_batch_size: 100,
            minimum_predictions_for_retraining: 10,
            retrain_ema_alpha: 0.3,
            anomaly_z_threshold: 3.0,
            min_points_for_anomaly: 10,
            max_history_size: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachingBehaviorConfig {
    pub enable_caching: bool,
    pub min_execution_time_for_caching_ms: u64,
    pub max_cached_response_size_bytes: u64,
    pub min_access_frequency: f32,
    pub min_predicted_hit_rate: f32,
    pub use_dynamic_ttl: bool,
    pub default_ttl_seconds: u64,
    pub preferred_scope: Scope,
}

impl Default for CachingBehaviorConfig {
    fn default() -> Self {
        Self {
            enable_caching: true,
            min_execution_time_for_caching_ms: 100,
            max_cached_response_size_bytes: 1_048_576,
            min_access_frequency: 1.0,
            min_predicted_hit_rate: 0.5,
            use_dynamic_ttl: false,
            default_ttl_seconds: 300,
            preferred_scope: Scope::Global,
        }
    }
}

impl From<&CachingBehaviorConfig> for CachingPolicy {
    /// Default policy every request type gets until a `CachingPolicyProvider`
    /// is configured with per-type overrides.
    fn from(config: &CachingBehaviorConfig) -> Self {
        Self {
            enable_ai_analysis: config.enable_caching,
            min_execution_time_for_caching_ms: config.min_execution_time_for_caching_ms,
            max_cached_response_size_bytes: config.max_cached_response_size_bytes,
            min_access_frequency: config.min_access_frequency,
            min_predicted_hit_rate: config.min_predicted_hit_rate,
            use_dynamic_ttl: config.use_dynamic_ttl,
            default_ttl_seconds: config.default_ttl_seconds,
            preferred_scope: config.preferred_scope,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadMetricsConfig {
    pub enable_caching: bool,
    pub cache_ttl_seconds: u64,
    pub cache_refresh_interval_seconds: u64,
    pub use_cached_cpu_measurements: bool,
    pub cpu_measurement_interval_ms: u64,
    pub baseline_memory_bytes: u64,
}

impl Default for LoadMetricsConfig {
    fn default() -> Self {
        Self {
            enable_caching: true,
            cache_ttl_seconds: 5,
            cache_refresh_interval_seconds: 10,
            use_cached_cpu_measurements: true,
            cpu_measurement_interval_ms: 1000,
            baseline_memory_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceTrackingConfig {
    pub enable_tracking: bool,
    pub enable_detailed_logging: bool,
    pub enable_periodic_export: bool,
    pub enable_immediate_export: bool,
    pub export_interval_seconds: u64,
    pub immediate_export_threshold: u32,
    pub reset_after_export: bool,
    pub sliding_window_size: usize,
    pub track_percentiles: bool,
}

impl Default for PerformanceTrackingConfig {
    fn default() -> Self {
        Self {
            enable_tracking: true,
            enable_detailed_logging: false,
            enable_periodic_export: true,
            enable_immediate_export: true,
            export_interval_seconds: 300,
            immediate_export_threshold: 1000,
            reset_after_export: true,
            sliding_window_size: 10_000,
            track_percentiles: true,
        }
    }
}

/// Upper bounds used to turn raw connection counts into utilization ratios
/// when no authoritative pool/connection-manager figure is wired in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEstimateConfig {
    pub max_estimated_http_connections: u32,
    /// Target capacity of the database connection pool.
    pub max_estimated_db_connections: u32,
    /// Upper bound used for db-connection-count estimation when no pool
    /// stats are wired in; kept distinct from `max_estimated_db_connections`
    /// because the two can diverge (e.g. pool sized above the estimator's
    /// assumed ceiling).
    pub estimated_max_db_connections: u32,
    pub max_estimated_external_connections: u32,
    pub max_estimated_websocket_connections: u32,
}

impl Default for ConnectionEstimateConfig {
    fn default() -> Self {
        Self {
            max_estimated_http_connections: 10_000,
            max_estimated_db_connections: 100,
            estimated_max_db_connections: 100,
            max_estimated_external_connections: 1_000,
            max_estimated_websocket_connections: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    pub retention_hours: u64,
    pub max_predictions: usize,
    pub sweep_interval_seconds: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            retention_hours: 24,
            max_predictions: 10_000,
            sweep_interval_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthScorerConfig {
    pub weight_cpu: f64,
    pub weight_memory: f64,
    pub weight_error_rate: f64,
    pub weight_p95_latency: f64,
    pub weight_queue_depth: f64,
    /// p95 latency, in ms, considered maximally unhealthy (risk saturates at 1.0).
    pub p95_latency_target_ms: f64,
    /// queued-request count considered maximally unhealthy.
    pub queue_depth_target: f64,
}

impl Default for HealthScorerConfig {
    fn default() -> Self {
        Self {
            weight_cpu: 0.25,
            weight_memory: 0.2,
            weight_error_rate: 0.25,
            weight_p95_latency: 0.2,
            weight_queue_depth: 0.1,
            p95_latency_target_ms: 2000.0,
            queue_depth_target: 100.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsThresholds {
    pub cpu_high: f64,
    pub cpu_critical: f64,
    pub memory_high: f64,
    pub memory_critical: f64,
    pub error_rate_high: f64,
    pub error_rate_critical: f64,
    pub repeat_rate_opportunity: f64,
    pub batch_size_opportunity: f64,
    pub db_pool_opportunity: f64,
}

impl Default for InsightsThresholds {
    fn default() -> Self {
        Self {
            cpu_high: 0.80,
            cpu_critical: 0.95,
            memory_high: 0.90,
            memory_critical: 0.95,
            error_rate_high: 0.05,
            error_rate_critical: 0.10,
            repeat_rate_opportunity: 0.30,
            batch_size_opportunity: 5.0,
            db_pool_opportunity: 0.90,
        }
    }
}
