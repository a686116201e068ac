use chrono::{DateTime, NaiveDate, Timelike, Utc};
use optimizer_common::{ConnectionCounts, ConnectionEstimateConfig, PeakConnectionMetrics};
use tokio::sync::RwLock;

/// Raw, un-clamped connection observations for the four categories the
/// system tracks. Each field is whatever the host's own bookkeeping
/// reports; [`ConnectionEstimator`] is what turns these into a bounded
/// [`ConnectionCounts`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionEstimateInputs {
    pub http: u32,
    pub database: u32,
    pub external: u32,
    pub websocket: u32,
}

/// Clamps raw per-category connection observations to the configured
/// ceilings, so a runaway counter (a leak, a miscounted pool) can't report
/// an unbounded connection count upstream.
#[derive(Debug, Clone)]
pub struct ConnectionEstimator {
    config: ConnectionEstimateConfig,
}

impl ConnectionEstimator {
    pub fn new(config: ConnectionEstimateConfig) -> Self {
        Self { config }
    }

    pub fn estimate(&self, inputs: ConnectionEstimateInputs) -> ConnectionCounts {
        ConnectionCounts {
            http: inputs.http.min(self.config.max_estimated_http_connections),
            database: inputs.database.min(self.config.max_estimated_db_connections),
            external: inputs.external.min(self.config.max_estimated_external_connections),
            websocket: inputs.websocket.min(self.config.max_estimated_websocket_connections),
        }
    }

    /// Rough HTTP connection estimate for hosts with no connection-pool
    /// stats wired in: one live socket per available core per in-flight
    /// request, since a thread-per-core server holds roughly that many
    /// sockets open under load.
    pub fn http_fallback(active_requests: u32) -> u32 {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        active_requests.saturating_mul(cores.max(1))
    }
}

/// Tracks all-time/daily/hourly connection peaks from a stream of current
/// connection-count samples. Daily and hourly peaks reset when their bucket
/// rolls over; the all-time peak is monotonic for the collector's lifetime.
pub struct ConnectionMetricsCollector {
    state: RwLock<PeakConnectionMetrics>,
}

impl ConnectionMetricsCollector {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            state: RwLock::new(PeakConnectionMetrics {
                all_time_peak: 0,
                daily_peak: 0,
                hourly_peak: 0,
                last_peak_timestamp: now,
                current_day: now.date_naive(),
                current_hour: now.hour(),
            }),
        }
    }

    pub async fn record(&self, current_connections: u32, timestamp: DateTime<Utc>) {
        let mut state = self.state.write().await;
        Self::roll_buckets(&mut state, timestamp.date_naive(), timestamp.hour());

        if current_connections > state.all_time_peak {
            state.all_time_peak = current_connections;
            state.last_peak_timestamp = timestamp;
        }
        if current_connections > state.daily_peak {
            state.daily_peak = current_connections;
        }
        if current_connections > state.hourly_peak {
            state.hourly_peak = current_connections;
        }
    }

    fn roll_buckets(state: &mut PeakConnectionMetrics, day: NaiveDate, hour: u32) {
        if day != state.current_day {
            state.current_day = day;
            state.daily_peak = 0;
        }
        if hour != state.current_hour || day != state.current_day {
            state.current_hour = hour;
            state.hourly_peak = 0;
        }
    }

    pub async fn snapshot(&self) -> PeakConnectionMetrics {
        self.state.read().await.clone()
    }

    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        *state = PeakConnectionMetrics {
            all_time_peak: 0,
            daily_peak: 0,
            hourly_peak: 0,
            last_peak_timestamp: Utc::now(),
            current_day: Utc::now().date_naive(),
            current_hour: Utc::now().hour(),
        };
    }
}

impl Default for ConnectionMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
