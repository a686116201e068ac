use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use optimizer_common::{ForecastingHook, TimeSeriesPoint};
use tokio::sync::RwLock;
use tracing::debug;

/// A bounded, per-key append-only series. Oldest points are dropped once a
/// key's queue reaches `max_points_per_key`, the same FIFO-eviction shape
/// used by the cache's access-order bookkeeping. An optional forecasting
/// plug-in answers `forecast` queries; without one, `forecast` always
/// returns `None`.
pub struct TimeSeriesStore {
    series: RwLock<HashMap<String, VecDeque<TimeSeriesPoint>>>,
    max_points_per_key: usize,
    forecasting_hook: Option<Arc<dyn ForecastingHook>>,
}

impl TimeSeriesStore {
    pub fn new(max_points_per_key: usize) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            max_points_per_key,
            forecasting_hook: None,
        }
    }

    pub fn with_forecasting_hook(max_points_per_key: usize, hook: Arc<dyn ForecastingHook>) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            max_points_per_key,
            forecasting_hook: Some(hook),
        }
    }

    pub async fn record(&self, key: impl Into<String>, value: f64, timestamp: DateTime<Utc>) {
        let key = key.into();
        let mut series = self.series.write().await;
        let queue = series.entry(key.clone()).or_insert_with(VecDeque::new);
        queue.push_back(TimeSeriesPoint::new(key, value, timestamp));
        while queue.len() > self.max_points_per_key {
            queue.pop_front();
        }
    }

    pub async fn record_now(&self, key: impl Into<String>, value: f64) {
        self.record(key, value, Utc::now()).await;
    }

    pub async fn series(&self, key: &str) -> Vec<TimeSeriesPoint> {
        self.series
            .read()
            .await
            .get(key)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn latest(&self, key: &str) -> Option<TimeSeriesPoint> {
        self.series.read().await.get(key)?.back().cloned()
    }

    /// The most recent `n` points for a key, oldest first. Fewer than `n`
    /// are returned if the series doesn't hold that many yet.
    pub async fn tail(&self, key: &str, n: usize) -> Vec<TimeSeriesPoint> {
        let series = self.series.read().await;
        let Some(queue) = series.get(key) else {
            return Vec::new();
        };
        let skip = queue.len().saturating_sub(n);
        queue.iter().skip(skip).cloned().collect()
    }

    /// All points recorded within `window` of now.
    pub async fn range(&self, key: &str, window: Duration) -> Vec<TimeSeriesPoint> {
        let cutoff = Utc::now() - window;
        self.series
            .read()
            .await
            .get(key)
            .map(|q| q.iter().filter(|p| p.timestamp >= cutoff).cloned().collect())
            .unwrap_or_default()
    }

    /// Asks the configured forecasting plug-in for a prediction `horizon`
    /// out. `None` if no hook is wired in or the hook declines to answer.
    pub async fn forecast(&self, key: &str, horizon: Duration) -> Option<f64> {
        self.forecasting_hook.as_ref()?.forecast(key, horizon).await
    }

    pub async fn point_count(&self, key: &str) -> usize {
        self.series.read().await.get(key).map(|q| q.len()).unwrap_or(0)
    }

    pub async fn key_count(&self) -> usize {
        self.series.read().await.len()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.series.read().await.keys().cloned().collect()
    }

    /// Mean and population standard deviation over the retained window.
    pub async fn mean_and_stddev(&self, key: &str) -> Option<(f64, f64)> {
        let series = self.series.read().await;
        let queue = series.get(key)?;
        if queue.is_empty() {
            return None;
        }
        let n = queue.len() as f64;
        let mean = queue.iter().map(|p| p.value).sum::<f64>() / n;
        let variance = queue.iter().map(|p| (p.value - mean).powi(2)).sum::<f64>() / n;
        Some((mean, variance.sqrt()))
    }

    pub async fn clear_key(&self, key: &str) {
        self.series.write().await.remove(key);
    }

    pub async fn clear_all(&self) {
        self.series.write().await.clear();
    }

    /// Drops points older than `cutoff` across all keys, returning the
    /// number of points removed.
    pub async fn evict_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut series = self.series.write().await;
        let mut removed = 0;
        for queue in series.values_mut() {
            let before = queue.len();
            queue.retain(|p| p.timestamp >= cutoff);
            removed += before - queue.len();
        }
        if removed > 0 {
            debug!(removed, "evicted stale time-series points");
        }
        removed
    }
}
