use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use optimizer_common::{RequestType, Result};
use tokio_util::sync::CancellationToken;

/// A transport-agnostic request passing through the optimization pipeline.
/// `request_type` is the key every analytics/pattern component keys its
/// state on; `payload` is opaque to the pipeline itself.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub id: uuid::Uuid,
    pub request_type: RequestType,
    pub payload: serde_json::Value,
    pub metadata: HashMap<String, String>,
}

impl PipelineRequest {
    pub fn new(request_type: impl Into<RequestType>, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            request_type: request_type.into(),
            payload,
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineResponse {
    pub payload: serde_json::Value,
    pub served_from_cache: bool,
}

impl PipelineResponse {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            served_from_cache: false,
        }
    }
}

/// The remaining pipeline, invoked by a behavior to continue the chain.
/// Boxed because each behavior wraps the one after it, the same layering
/// idiom a tower-style middleware stack uses.
pub struct Next<'a> {
    inner: Box<dyn FnOnce(PipelineRequest, CancellationToken) -> BoxFuture<'a> + Send + 'a>,
}

type BoxFuture<'a> = std::pin::Pin<Box<dyn std::future::Future<Output = Result<PipelineResponse>> + Send + 'a>>;

impl<'a> Next<'a> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(PipelineRequest, CancellationToken) -> BoxFuture<'a> + Send + 'a,
    {
        Self { inner: Box::new(f) }
    }

    pub async fn run(self, request: PipelineRequest, cancel: CancellationToken) -> Result<PipelineResponse> {
        (self.inner)(request, cancel).await
    }
}

/// One stage in the optimization pipeline. Behaviors compose by calling
/// `next.run(..)` themselves, so they can inspect/modify both the request
/// on the way in and the response on the way out.
#[async_trait]
pub trait PipelineBehavior: Send + Sync {
    async fn handle(
        &self,
        request: PipelineRequest,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> Result<PipelineResponse>;

    fn name(&self) -> &'static str;
}

pub type SharedBehavior = Arc<dyn PipelineBehavior>;

#[cfg(test)]
mod tests {
    use super::*;
    use optimizer_common::Error;

    struct Echo;

    #[async_trait]
    impl PipelineBehavior for Echo {
        async fn handle(
            &self,
            request: PipelineRequest,
            _next: Next<'_>,
            cancel: CancellationToken,
        ) -> Result<PipelineResponse> {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            Ok(PipelineResponse::new(request.payload))
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    #[tokio::test]
    async fn behavior_runs_to_completion() {
        let behavior = Echo;
        let request = PipelineRequest::new("Search", serde_json::json!({"q": "rust"}));
        let cancel = CancellationToken::new();
        let next = Next::new(|req, _| Box::pin(async move { Ok(PipelineResponse::new(req.payload)) }));
        let response = behavior.handle(request, next, cancel).await.unwrap();
        assert_eq!(response.payload, serde_json::json!({"q": "rust"}));
    }

    #[tokio::test]
    async fn cancellation_short_circuits() {
        let behavior = Echo;
        let request = PipelineRequest::new("Search", serde_json::json!(null));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let next = Next::new(|req, _| Box::pin(async move { Ok(PipelineResponse::new(req.payload)) }));
        let result = behavior.handle(request, next, cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
