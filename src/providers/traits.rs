//! Provider client trait.
//!
//! Every supported provider kind implements [`ProviderClient`]: one call
//! method that takes the model, key and transport chosen by the
//! orchestrator, plus the classification of its own failures. The client
//! holds connection details (base URL, HTTP client, timeout) but no
//! per-request state, so one instance serves any number of concurrent
//! requests.
//!
//! # Example
//!
//! ```ignore
//! let client: Arc<dyn ProviderClient> = Arc::new(GeminiClient::new(http));
//! let result = client
//!     .call(&model, Some(&key), TransportMode::Block, &request)
//!     .await?;
//! ```

use async_trait::async_trait;

use crate::providers::classify::ClassificationTable;
use crate::types::{
    ApiKey, FailureClass, GenerationRequest, GenerationResult, ModelSpec, ProviderKind,
    TransportMode,
};
use crate::{Result, SummarizerError};

/// A provider reachable over its wire protocol.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Which protocol this client speaks.
    fn kind(&self) -> ProviderKind;

    /// Whether [`TransportMode::Stream`] is implemented.
    fn supports_streaming(&self) -> bool {
        true
    }

    /// Make one call. No retries happen here.
    ///
    /// `api_key` is `None` for keyless providers. A stream that breaks
    /// mid-response returns [`SummarizerError::Stream`].
    async fn call(
        &self,
        model: &ModelSpec,
        api_key: Option<&ApiKey>,
        transport: TransportMode,
        request: &GenerationRequest,
    ) -> Result<GenerationResult>;

    /// Classification table for this provider's failures.
    fn classification(&self) -> &ClassificationTable;

    /// Map a failure of [`call`](Self::call) to its recovery class.
    fn classify_failure(&self, err: &SummarizerError) -> FailureClass {
        self.classification().classify(err)
    }
}
