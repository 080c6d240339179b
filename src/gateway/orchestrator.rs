//! The caller-facing orchestrator.

use std::sync::Arc;
use std::time::Instant;

use tracing::instrument;

use crate::dispatch::CallDispatcher;
use crate::fallback::FallbackController;
use crate::providers::ProviderRegistry;
use crate::telemetry;
use crate::types::{ExecutionContext, Generation, GenerationRequest};
use crate::{Result, SummarizerError};

/// Runs generation requests with fallback.
///
/// Cheap to share: clone it or put it behind an `Arc`. Requests running
/// concurrently share only the read-only registry.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    dispatcher: CallDispatcher,
    controller: FallbackController,
}

impl Orchestrator {
    pub(crate) fn new(
        registry: Arc<ProviderRegistry>,
        dispatcher: CallDispatcher,
        controller: FallbackController,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            controller,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Execution context used by [`generate`](Self::generate).
    pub fn execution_context(&self) -> ExecutionContext {
        self.dispatcher.context()
    }

    /// Run a request in the default execution context.
    ///
    /// An unknown provider or an empty prompt fails before any attempt.
    /// Exhausted fallbacks surface as [`SummarizerError::Terminal`].
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        self.run(&self.dispatcher, request).await
    }

    /// Run a request as if issued from `context`.
    pub async fn generate_in(
        &self,
        request: &GenerationRequest,
        context: ExecutionContext,
    ) -> Result<Generation> {
        if context == self.dispatcher.context() {
            return self.run(&self.dispatcher, request).await;
        }
        let dispatcher = self.dispatcher.clone().in_context(context);
        self.run(&dispatcher, request).await
    }

    #[instrument(
        name = "orchestrator.generate",
        skip_all,
        fields(
            provider = %request.provider_id,
            model = request.model_override.as_deref().unwrap_or(""),
            context = ?dispatcher.context(),
        )
    )]
    async fn run(&self, dispatcher: &CallDispatcher, request: &GenerationRequest) -> Result<Generation> {
        if request.prompt.trim().is_empty() {
            return Err(SummarizerError::InvalidInput("prompt is empty".to_string()));
        }
        let descriptor = self.registry.describe(&request.provider_id)?;
        let transport = dispatcher.transport_mode(&descriptor, request.prefer_streaming);

        let start = Instant::now();
        let outcome = self
            .controller
            .execute(&descriptor, request, transport, dispatcher)
            .await;

        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => request.provider_id.clone(),
        )
        .record(start.elapsed().as_secs_f64());
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => request.provider_id.clone(),
            "status" => if outcome.is_ok() { "ok" } else { "error" },
        )
        .increment(1);

        outcome.map_err(SummarizerError::from)
    }
}
