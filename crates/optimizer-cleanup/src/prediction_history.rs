use std::collections::VecDeque;

use optimizer_common::PredictionResult;
use tokio::sync::RwLock;

/// Bounded FIFO history of predictions, trimmed by count rather than age;
/// [`super::manager::DataCleanupManager`] is what enforces the age-based
/// retention policy on top of this.
pub struct PredictionHistory {
    predictions: RwLock<VecDeque<PredictionResult>>,
    max_predictions: usize,
}

impl PredictionHistory {
    pub fn new(max_predictions: usize) -> Self {
        Self {
            predictions: RwLock::new(VecDeque::new()),
            max_predictions,
        }
    }

    pub async fn push(&self, prediction: PredictionResult) {
        let mut predictions = self.predictions.write().await;
        predictions.push_back(prediction);
        while predictions.len() > self.max_predictions {
            predictions.pop_front();
        }
    }

    pub async fn recent(&self, n: usize) -> Vec<PredictionResult> {
        let predictions = self.predictions.read().await;
        predictions.iter().rev().take(n).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.predictions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn retain_after(&self, cutoff: chrono::DateTime<chrono::Utc>) -> usize {
        let mut predictions = self.predictions.write().await;
        let before = predictions.len();
        predictions.retain(|p| p.timestamp >= cutoff);
        before - predictions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use optimizer_common::{ExecutionMetrics, Strategy};

    fn sample(timestamp: chrono::DateTime<Utc>) -> PredictionResult {
        PredictionResult {
            request_type: "Search".into(),
            predicted_strategies: vec![Strategy::EnableCaching],
            actual_improvement_ms: 10.0,
            timestamp,
            metrics: ExecutionMetrics {
                request_type: "Search".into(),
                total_executions: 1,
                successful_executions: 1,
                failed_executions: 0,
                average_execution_time_ms: 10.0,
                median_execution_time_ms: 10.0,
                p95_execution_time_ms: 10.0,
                p99_execution_time_ms: 10.0,
                concurrent_executions: 0,
                memory_allocated_bytes: 0,
                sample_period_seconds: 0,
                last_execution: timestamp,
                cpu_usage_percent: 0.0,
                database_calls: 0,
                external_api_calls: 0,
            },
        }
    }

    #[tokio::test]
    async fn caps_total_predictions() {
        let history = PredictionHistory::new(3);
        for _ in 0..5 {
            history.push(sample(Utc::now())).await;
        }
        assert_eq!(history.len().await, 3);
    }

    #[tokio::test]
    async fn retain_after_drops_stale_predictions() {
        let history = PredictionHistory::new(10);
        history.push(sample(Utc::now() - chrono::Duration::hours(2))).await;
        history.push(sample(Utc::now())).await;
        let removed = history.retain_after(Utc::now() - chrono::Duration::hours(1)).await;
        assert_eq!(removed, 1);
        assert_eq!(history.len().await, 1);
    }
}
