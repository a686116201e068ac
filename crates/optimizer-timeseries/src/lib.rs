pub mod anomaly;
pub mod store;

pub use anomaly::{Anomaly, AnomalyDetector};
pub use store::TimeSeriesStore;
