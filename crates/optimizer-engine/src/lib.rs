pub mod optimization;
pub mod pattern;
pub mod validation;

pub use optimization::OptimizationEngine;
pub use pattern::{ImpactTier, LoadBucket, PatternRecognitionEngine, CANDIDATE_STRATEGIES, impact_tier, load_bucket};
pub use validation::ValidationFramework;
