use chrono::{DateTime, Utc};

use crate::store::TimeSeriesStore;

/// A single point flagged as statistically unusual against its series'
/// recent mean/stddev.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub z_score: f64,
}

/// Flags points whose z-score against the series' own mean/stddev (computed
/// over the requested lookback window, not the full retained history)
/// exceeds a configured threshold. Windows shorter than `min_points` are
/// considered too thin to judge and never produce anomalies.
pub struct AnomalyDetector {
    z_threshold: f64,
    min_points: usize,
}

impl AnomalyDetector {
    pub fn new(z_threshold: f64, min_points: usize) -> Self {
        Self {
            z_threshold,
            min_points,
        }
    }

    pub async fn detect(&self, store: &TimeSeriesStore, key: &str, lookback_points: usize) -> Vec<Anomaly> {
        let points = store.tail(key, lookback_points).await;
        if points.len() < self.min_points {
            return Vec::new();
        }

        let n = points.len() as f64;
        let mean = points.iter().map(|p| p.value).sum::<f64>() / n;
        let variance = points.iter().map(|p| (p.value - mean).powi(2)).sum::<f64>() / n;
        let stddev = variance.sqrt();
        if stddev == 0.0 {
            return Vec::new();
        }

        points
            .into_iter()
            .filter_map(|p| {
                let z_score = (p.value - mean) / stddev;
                (z_score.abs() > self.z_threshold).then_some(Anomaly {
                    timestamp: p.timestamp,
                    value: p.value,
                    z_score,
                })
            })
            .collect()
    }

    pub fn is_anomalous(&self, value: f64, mean: f64, stddev: f64) -> bool {
        if stddev == 0.0 {
            return false;
        }
        ((value - mean) / stddev).abs() > self.z_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_outlier_beyond_threshold() {
        let store = TimeSeriesStore::new(100);
        for _ in 0..20 {
            store.record_now("latency", 100.0).await;
        }
        store.record_now("latency", 10_000.0).await;

        let detector = AnomalyDetector::new(3.0, 10);
        let anomalies = detector.detect(&store, "latency", 21).await;
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].value, 10_000.0);
        assert!(anomalies[0].z_score > 3.0);
    }

    #[tokio::test]
    async fn lookback_window_excludes_older_points() {
        let store = TimeSeriesStore::new(100);
        store.record_now("latency", 10_000.0).await;
        for _ in 0..20 {
            store.record_now("latency", 100.0).await;
        }

        let detector = AnomalyDetector::new(3.0, 10);
        // Only the most recent 20 points are in scope; the one outlier
        // recorded before them is out of the lookback window.
        let anomalies = detector.detect(&store, "latency", 20).await;
        assert!(anomalies.is_empty());
    }

    #[tokio::test]
    async fn too_few_points_never_anomalous() {
        let store = TimeSeriesStore::new(100);
        store.record_now("latency", 1.0).await;
        store.record_now("latency", 9999.0).await;

        let detector = AnomalyDetector::new(3.0, 10);
        assert!(detector.detect(&store, "latency", 10).await.is_empty());
    }

    #[tokio::test]
    async fn zero_variance_series_has_no_anomalies() {
        let store = TimeSeriesStore::new(100);
        for _ in 0..20 {
            store.record_now("latency", 42.0).await;
        }
        let detector = AnomalyDetector::new(3.0, 10);
        assert!(detector.detect(&store, "latency", 20).await.is_empty());
    }
}
