use std::sync::Arc;

use async_trait::async_trait;
use optimizer_analytics::RequestAnalysisStore;
use optimizer_common::{OptimizationRecommendation, Result, Strategy};
use optimizer_engine::{OptimizationEngine, PatternRecognitionEngine};
use tokio_util::sync::CancellationToken;

use crate::pipeline::{Next, PipelineBehavior, PipelineRequest, PipelineResponse};

/// Observes request outcomes to keep the pattern-recognition model current,
/// and answers `recommend` queries by combining the model's learned weights
/// with the request type's recent execution metrics. Does not itself apply
/// any strategy; it only recommends one. Shares its [`OptimizationEngine`]
/// with whatever else in the suite calls `get_system_insights`/`dispose`, so
/// both see the same pending-batch and history state.
pub struct AiOptimizationBehavior {
    store: Arc<RequestAnalysisStore>,
    patterns: Arc<PatternRecognitionEngine>,
    engine: Arc<OptimizationEngine>,
}

impl AiOptimizationBehavior {
    pub fn new(
        store: Arc<RequestAnalysisStore>,
        patterns: Arc<PatternRecognitionEngine>,
        engine: Arc<OptimizationEngine>,
    ) -> Self {
        Self {
            store,
            patterns,
            engine,
        }
    }

    pub async fn recommend(&self, request_type: &str) -> Result<OptimizationRecommendation> {
        let request_type = request_type.to_string();
        let Some(metrics) = self.store.metrics_for(&request_type).await else {
            return Ok(OptimizationRecommendation::none(
                "no execution metrics recorded for this request type",
            ));
        };
        let best = self.patterns.best_strategy(&request_type).await;
        self.engine.analyze_request(&metrics, best)
    }

    /// Feeds an outcome back into the pattern model via the shared engine's
    /// batched retraining: how well `strategy` performed relative to the
    /// request type's recent average.
    pub async fn record_outcome(&self, request_type: &str, strategy: Strategy, actual_improvement_ms: f64) {
        let request_type = request_type.to_string();
        let Some(metrics) = self.store.metrics_for(&request_type).await else {
            return;
        };
        if let Err(err) = self
            .engine
            .learn_from_execution(&self.patterns, &request_type, vec![strategy], actual_improvement_ms, metrics)
            .await
        {
            tracing::warn!(error = %err, request_type = %request_type, "failed to record optimization outcome");
        }
    }
}

#[async_trait]
impl PipelineBehavior for AiOptimizationBehavior {
    async fn handle(
        &self,
        request: PipelineRequest,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> Result<PipelineResponse> {
        // The behavior is a passive observer in the pipeline: it never
        // changes the request or response, only reads the store that the
        // performance-tracking behavior populates elsewhere in the chain.
        next.run(request, cancel).await
    }

    fn name(&self) -> &'static str {
        "ai_optimization"
    }
}
