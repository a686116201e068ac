pub mod connection_metrics;
pub mod health_scorer;
pub mod request_analysis;
pub mod system_metrics;

pub use connection_metrics::{ConnectionEstimateInputs, ConnectionEstimator, ConnectionMetricsCollector};
pub use health_scorer::HealthScorer;
pub use request_analysis::{ExecutionRecord, RequestAnalysisStore};
pub use system_metrics::{RawLoadInputs, SystemMetricsCalculator};
