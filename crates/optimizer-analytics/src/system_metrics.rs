use chrono::Utc;
use optimizer_common::{ConnectionEstimateConfig, SystemLoadMetrics};

/// Raw counters fed into [`SystemMetricsCalculator::calculate`]. Each field
/// is supplied by whatever component owns the authoritative count; the
/// calculator only normalizes and combines them.
#[derive(Debug, Clone, Default)]
pub struct RawLoadInputs {
    pub cpu_utilization: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub active_requests: u32,
    pub queued_requests: u32,
    pub requests_in_window: u32,
    pub window_seconds: f64,
    pub average_response_time_ms: f64,
    pub successful_in_window: u32,
    pub failed_in_window: u32,
    pub active_db_connections: u32,
    pub active_thread_pool_workers: u32,
    pub max_thread_pool_workers: u32,
    pub repeat_request_rate: f32,
    pub average_batch_size: f32,
}

/// Turns raw counters into the bounded, comparable [`SystemLoadMetrics`]
/// snapshot the rest of the system reasons about. A test harness can
/// substitute a fixed [`RawLoadInputs`] to get deterministic output without
/// touching the real OS-level providers.
#[derive(Debug, Clone)]
pub struct SystemMetricsCalculator {
    estimates: ConnectionEstimateConfig,
}

impl SystemMetricsCalculator {
    pub fn new(estimates: ConnectionEstimateConfig) -> Self {
        Self { estimates }
    }

    pub fn calculate(&self, inputs: &RawLoadInputs) -> SystemLoadMetrics {
        let total_in_window = inputs.successful_in_window + inputs.failed_in_window;
        let error_rate = if total_in_window == 0 {
            0.0
        } else {
            inputs.failed_in_window as f32 / total_in_window as f32
        };

        let throughput_rps = if inputs.window_seconds > 0.0 {
            inputs.requests_in_window as f32 / inputs.window_seconds as f32
        } else {
            0.0
        };

        let memory_utilization = if inputs.memory_total_bytes > 0 {
            inputs.memory_used_bytes as f32 / inputs.memory_total_bytes as f32
        } else {
            0.0
        };

        let database_pool_utilization = (inputs.active_db_connections as f32
            / self.estimates.estimated_max_db_connections.max(1) as f32)
            .min(1.0);

        let thread_pool_utilization = if inputs.max_thread_pool_workers > 0 {
            (inputs.active_thread_pool_workers as f32 / inputs.max_thread_pool_workers as f32)
                .min(1.0)
        } else {
            0.0
        };

        SystemLoadMetrics {
            cpu_utilization: inputs.cpu_utilization.clamp(0.0, 1.0),
            memory_utilization,
            active_requests: inputs.active_requests,
            queued_requests: inputs.queued_requests,
            throughput_rps,
            average_response_time_ms: inputs.average_response_time_ms,
            error_rate: error_rate.clamp(0.0, 1.0),
            database_pool_utilization,
            thread_pool_utilization,
            available_memory_bytes: inputs
                .memory_total_bytes
                .saturating_sub(inputs.memory_used_bytes),
            repeat_request_rate: inputs.repeat_request_rate.clamp(0.0, 1.0),
            average_batch_size: inputs.average_batch_size.max(0.0),
            timestamp: Utc::now(),
        }
    }
}
