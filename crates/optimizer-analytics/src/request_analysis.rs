use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use optimizer_common::{ExecutionMetrics, RequestType};
use tokio::sync::{Mutex, RwLock};

const MAX_SAMPLES_PER_TYPE: usize = 1000;

struct Accumulator {
    total_executions: u64,
    successful_executions: u64,
    failed_executions: u64,
    recent_times_ms: VecDeque<f64>,
    concurrent_executions: u32,
    memory_allocated_bytes: u64,
    last_execution: chrono::DateTime<Utc>,
    cpu_usage_percent: f32,
    database_calls: u32,
    external_api_calls: u32,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            total_executions: 0,
            successful_executions: 0,
            failed_executions: 0,
            recent_times_ms: VecDeque::new(),
            concurrent_executions: 0,
            memory_allocated_bytes: 0,
            last_execution: Utc::now(),
            cpu_usage_percent: 0.0,
            database_calls: 0,
            external_api_calls: 0,
        }
    }

    fn snapshot(&self, request_type: &RequestType) -> ExecutionMetrics {
        let mut sorted: Vec<f64> = self.recent_times_ms.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        ExecutionMetrics {
            request_type: request_type.clone(),
            total_executions: self.total_executions,
            successful_executions: self.successful_executions,
            failed_executions: self.failed_executions,
            average_execution_time_ms: average(&sorted),
            median_execution_time_ms: percentile(&sorted, 0.5),
            p95_execution_time_ms: percentile(&sorted, 0.95),
            p99_execution_time_ms: percentile(&sorted, 0.99),
            concurrent_executions: self.concurrent_executions,
            memory_allocated_bytes: self.memory_allocated_bytes,
            sample_period_seconds: 0,
            last_execution: self.last_execution,
            cpu_usage_percent: self.cpu_usage_percent,
            database_calls: self.database_calls,
            external_api_calls: self.external_api_calls,
        }
    }
}

fn average(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.iter().sum::<f64>() / sorted.len() as f64
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Parameters for a single recorded execution.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub duration_ms: f64,
    pub success: bool,
    pub memory_allocated_bytes: u64,
    pub database_calls: u32,
    pub external_api_calls: u32,
    pub cpu_usage_percent: f32,
}

/// Per-request-type execution metrics, locked independently so that writes
/// to unrelated request types never contend with each other.
pub struct RequestAnalysisStore {
    types: RwLock<HashMap<RequestType, Arc<Mutex<Accumulator>>>>,
}

impl RequestAnalysisStore {
    pub fn new() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
        }
    }

    async fn accumulator_for(&self, request_type: &RequestType) -> Arc<Mutex<Accumulator>> {
        if let Some(acc) = self.types.read().await.get(request_type) {
            return acc.clone();
        }
        let mut types = self.types.write().await;
        types
            .entry(request_type.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Accumulator::new())))
            .clone()
    }

    pub async fn record_execution(&self, request_type: &RequestType, record: ExecutionRecord) {
        let acc = self.accumulator_for(request_type).await;
        let mut acc = acc.lock().await;
        acc.total_executions += 1;
        if record.success {
            acc.successful_executions += 1;
        } else {
            acc.failed_executions += 1;
        }
        acc.recent_times_ms.push_back(record.duration_ms);
        while acc.recent_times_ms.len() > MAX_SAMPLES_PER_TYPE {
            acc.recent_times_ms.pop_front();
        }
        acc.memory_allocated_bytes += record.memory_allocated_bytes;
        acc.database_calls += record.database_calls;
        acc.external_api_calls += record.external_api_calls;
        acc.cpu_usage_percent = record.cpu_usage_percent;
        acc.last_execution = Utc::now();
    }

    pub async fn begin_concurrent(&self, request_type: &RequestType) {
        let acc = self.accumulator_for(request_type).await;
        acc.lock().await.concurrent_executions += 1;
    }

    pub async fn end_concurrent(&self, request_type: &RequestType) {
        let acc = self.accumulator_for(request_type).await;
        let mut acc = acc.lock().await;
        acc.concurrent_executions = acc.concurrent_executions.saturating_sub(1);
    }

    pub async fn metrics_for(&self, request_type: &RequestType) -> Option<ExecutionMetrics> {
        let acc = self.types.read().await.get(request_type)?.clone();
        let acc = acc.lock().await;
        Some(acc.snapshot(request_type))
    }

    pub async fn all_metrics(&self) -> Vec<ExecutionMetrics> {
        let snapshot: Vec<_> = self.types.read().await.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let mut out = Vec::with_capacity(snapshot.len());
        for (request_type, acc) in snapshot {
            out.push(acc.lock().await.snapshot(&request_type));
        }
        out
    }

    pub async fn request_types(&self) -> Vec<RequestType> {
        self.types.read().await.keys().cloned().collect()
    }

    pub async fn remove(&self, request_type: &RequestType) {
        self.types.write().await.remove(request_type);
    }

    pub async fn clear(&self) {
        self.types.write().await.clear();
    }
}

impl Default for RequestAnalysisStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ms: f64, success: bool) -> ExecutionRecord {
        ExecutionRecord {
            duration_ms: ms,
            success,
            memory_allocated_bytes: 0,
            database_calls: 0,
            external_api_calls: 0,
            cpu_usage_percent: 0.0,
        }
    }

    #[tokio::test]
    async fn totals_are_internally_consistent() {
        let store = RequestAnalysisStore::new();
        store.record_execution(&"GetOrder".to_string(), record(10.0, true)).await;
        store.record_execution(&"GetOrder".to_string(), record(20.0, false)).await;
        let metrics = store.metrics_for(&"GetOrder".to_string()).await.unwrap();
        assert!(metrics.validate().is_ok());
        assert_eq!(metrics.total_executions, 2);
        assert_eq!(metrics.successful_executions, 1);
        assert_eq!(metrics.failed_executions, 1);
    }

    #[tokio::test]
    async fn unknown_request_type_yields_none() {
        let store = RequestAnalysisStore::new();
        assert!(store.metrics_for(&"Nope".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn percentiles_reflect_recorded_samples() {
        let store = RequestAnalysisStore::new();
        for ms in [10.0, 20.0, 30.0, 40.0, 50.0] {
            store.record_execution(&"Search".to_string(), record(ms, true)).await;
        }
        let metrics = store.metrics_for(&"Search".to_string()).await.unwrap();
        assert_eq!(metrics.median_execution_time_ms, 30.0);
        assert_eq!(metrics.p99_execution_time_ms, 50.0);
    }

    #[tokio::test]
    async fn concurrent_counter_tracks_in_flight_executions() {
        let store = RequestAnalysisStore::new();
        let rt = "Batch".to_string();
        store.begin_concurrent(&rt).await;
        store.begin_concurrent(&rt).await;
        store.end_concurrent(&rt).await;
        let metrics = store.metrics_for(&rt).await.unwrap();
        assert_eq!(metrics.concurrent_executions, 1);
    }
}
