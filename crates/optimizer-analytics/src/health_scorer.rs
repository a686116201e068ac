use optimizer_common::{HealthScorerConfig, PerformanceGrade, SystemLoadMetrics};

/// Reduces a [`SystemLoadMetrics`] snapshot to a single `[0, 1]` health
/// score, higher is healthier, via a weighted blend of per-factor risk.
#[derive(Debug, Clone)]
pub struct HealthScorer {
    config: HealthScorerConfig,
}

impl HealthScorer {
    pub fn new(config: HealthScorerConfig) -> Self {
        Self { config }
    }

    pub fn score(&self, metrics: &SystemLoadMetrics) -> f64 {
        let cpu_risk = metrics.cpu_utilization as f64;
        let memory_risk = metrics.memory_utilization as f64;
        let error_risk = metrics.error_rate as f64;
        let latency_risk =
            (metrics.average_response_time_ms / self.config.p95_latency_target_ms).min(1.0);
        let queue_risk =
            (metrics.queued_requests as f64 / self.config.queue_depth_target).min(1.0);

        let weighted_risk = cpu_risk * self.config.weight_cpu
            + memory_risk * self.config.weight_memory
            + error_risk * self.config.weight_error_rate
            + latency_risk * self.config.weight_p95_latency
            + queue_risk * self.config.weight_queue_depth;

        (1.0 - weighted_risk).clamp(0.0, 1.0)
    }

    pub fn grade(&self, metrics: &SystemLoadMetrics) -> PerformanceGrade {
        PerformanceGrade::from_health_score(self.score(metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn metrics(cpu: f32, memory: f32, error_rate: f32) -> SystemLoadMetrics {
        SystemLoadMetrics {
            cpu_utilization: cpu,
            memory_utilization: memory,
            active_requests: 0,
            queued_requests: 0,
            throughput_rps: 0.0,
            average_response_time_ms: 0.0,
            error_rate,
            database_pool_utilization: 0.0,
            thread_pool_utilization: 0.0,
            available_memory_bytes: 0,
            repeat_request_rate: 0.0,
            average_batch_size: 0.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn idle_system_scores_near_perfect() {
        let scorer = HealthScorer::new(HealthScorerConfig::default());
        let score = scorer.score(&metrics(0.0, 0.0, 0.0));
        assert!(score > 0.99);
        assert_eq!(scorer.grade(&metrics(0.0, 0.0, 0.0)), PerformanceGrade::A);
    }

    #[test]
    fn saturated_system_scores_poorly() {
        let scorer = HealthScorer::new(HealthScorerConfig::default());
        let score = scorer.score(&metrics(1.0, 1.0, 1.0));
        assert!(score < 0.3);
        assert_eq!(scorer.grade(&metrics(1.0, 1.0, 1.0)), PerformanceGrade::F);
    }

    #[test]
    fn score_is_always_within_unit_interval() {
        let scorer = HealthScorer::new(HealthScorerConfig::default());
        let mut m = metrics(5.0, 5.0, 5.0);
        m.average_response_time_ms = 1_000_000.0;
        m.queued_requests = 1_000_000;
        assert!((0.0..=1.0).contains(&scorer.score(&m)));
    }
}
