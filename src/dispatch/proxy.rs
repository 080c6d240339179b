//! Message-passing proxy for locally hosted providers.
//!
//! Code running in a restricted execution context cannot open connections
//! to the user's machine. It hands the call to a worker in the privileged
//! context instead and waits for the answer:
//!
//! ```text
//!  restricted side                        privileged side
//!  ───────────────                        ───────────────
//!  ProxyHandle::call ──mpsc(ProxyCall)──► worker loop
//!        ▲                                   │ tokio::spawn per call
//!        └──────────oneshot(Result)──────────┘ client.call(.., Block, ..)
//! ```
//!
//! The worker only serves locally hosted kinds and always uses blocking
//! transport. A closed channel or a dropped reply surfaces as
//! [`SummarizerError::ProxyUnavailable`]; a refused call as
//! [`SummarizerError::ProxyRejected`].

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::providers::ProviderRegistry;
use crate::types::{
    ApiKey, GenerationRequest, GenerationResult, ModelSpec, TransportMode,
};
use crate::{Result, SummarizerError};

/// Default number of calls queued before senders wait.
pub const DEFAULT_PROXY_BUFFER: usize = 32;

/// One call handed to the privileged side.
#[derive(Debug)]
pub struct ProxyCall {
    pub provider_id: String,
    pub model: ModelSpec,
    pub api_key: Option<ApiKey>,
    pub request: GenerationRequest,
}

struct ProxyMessage {
    call: ProxyCall,
    reply: oneshot::Sender<Result<GenerationResult>>,
}

/// Sending half of the proxy, held by the restricted side.
#[derive(Clone)]
pub struct ProxyHandle {
    tx: mpsc::Sender<ProxyMessage>,
}

impl ProxyHandle {
    /// Send a call to the privileged worker and wait for its result.
    pub async fn call(&self, call: ProxyCall) -> Result<GenerationResult> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ProxyMessage { call, reply })
            .await
            .map_err(|_| SummarizerError::ProxyUnavailable("proxy worker is gone".to_string()))?;
        rx.await.map_err(|_| {
            SummarizerError::ProxyUnavailable("proxy dropped the call without a reply".to_string())
        })?
    }

    /// Whether the worker is still accepting calls.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Start a proxy worker serving the local providers of `registry`.
///
/// The worker runs until every [`ProxyHandle`] is dropped.
///
/// # Panics
///
/// Requires a tokio runtime context.
pub fn spawn_proxy(registry: Arc<ProviderRegistry>) -> (ProxyHandle, JoinHandle<()>) {
    spawn_proxy_with_buffer(registry, DEFAULT_PROXY_BUFFER)
}

/// [`spawn_proxy`] with an explicit queue size.
pub fn spawn_proxy_with_buffer(
    registry: Arc<ProviderRegistry>,
    buffer_size: usize,
) -> (ProxyHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<ProxyMessage>(buffer_size.max(1));

    let worker = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let ProxyMessage { call, reply } = message;
                let result = serve(&registry, call).await;
                if reply.send(result).is_err() {
                    debug!("proxy caller went away before the reply");
                }
            });
        }
        debug!("proxy worker stopped");
    });

    (ProxyHandle { tx }, worker)
}

async fn serve(registry: &ProviderRegistry, call: ProxyCall) -> Result<GenerationResult> {
    let descriptor = registry
        .describe(&call.provider_id)
        .map_err(|_| SummarizerError::ProxyRejected(format!("unknown provider {}", call.provider_id)))?;
    if !descriptor.kind.is_local() {
        warn!(provider = %call.provider_id, kind = %descriptor.kind, "proxy refused remote provider");
        return Err(SummarizerError::ProxyRejected(format!(
            "provider {} is not locally hosted",
            call.provider_id
        )));
    }
    let client = registry.client(&call.provider_id)?;
    client
        .call(
            &call.model,
            call.api_key.as_ref(),
            TransportMode::Block,
            &call.request,
        )
        .await
}
