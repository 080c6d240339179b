//! Call dispatch: route and transport selection for single attempts.
//!
//! [`CallDispatcher`] makes the two decisions that depend on where the code
//! runs, and leaves every retry decision to the fallback controller:
//!
//! | context    | provider kind | route  | transport                    |
//! |------------|---------------|--------|------------------------------|
//! | privileged | any           | direct | caller preference if capable |
//! | restricted | remote        | direct | block                        |
//! | restricted | local         | proxy  | block                        |
//!
//! A provider whose descriptor says it cannot stream is always called in
//! block mode.

pub mod proxy;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::providers::ProviderRegistry;
use crate::telemetry;
use crate::types::{
    ApiKey, ExecutionContext, FailureClass, GenerationRequest, GenerationResult, ModelSpec,
    ProviderDescriptor, TransportMode,
};
use crate::{Result, SummarizerError};

pub use proxy::{ProxyCall, ProxyHandle, spawn_proxy, spawn_proxy_with_buffer};

/// Single-attempt call interface used by the fallback controller.
#[async_trait]
pub trait Caller: Send + Sync {
    /// Make exactly one call. No retries.
    async fn call(
        &self,
        provider_id: &str,
        model: &ModelSpec,
        api_key: Option<&ApiKey>,
        transport: TransportMode,
        request: &GenerationRequest,
    ) -> Result<GenerationResult>;

    /// Classify a failure returned by [`call`](Self::call) for `provider_id`.
    fn classify(&self, provider_id: &str, err: &SummarizerError) -> FailureClass;
}

/// How an attempt reaches its provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Direct,
    Proxy,
}

/// Route and transport selection over the provider registry.
#[derive(Clone)]
pub struct CallDispatcher {
    registry: Arc<ProviderRegistry>,
    context: ExecutionContext,
    proxy: Option<ProxyHandle>,
}

impl CallDispatcher {
    pub fn new(registry: Arc<ProviderRegistry>, context: ExecutionContext) -> Self {
        Self {
            registry,
            context,
            proxy: None,
        }
    }

    /// Attach the proxy used for local providers in a restricted context.
    pub fn with_proxy(mut self, proxy: ProxyHandle) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Same registry and proxy, different execution context.
    pub fn in_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Transport for the first attempt of a request.
    pub fn transport_mode(&self, descriptor: &ProviderDescriptor, prefer_streaming: bool) -> TransportMode {
        if prefer_streaming
            && descriptor.capabilities.supports_streaming
            && !self.context.is_restricted()
        {
            TransportMode::Stream
        } else {
            TransportMode::Block
        }
    }

    /// Whether an attempt goes direct or through the proxy.
    pub fn route(&self, descriptor: &ProviderDescriptor) -> Route {
        if self.context.is_restricted() && descriptor.kind.is_local() {
            Route::Proxy
        } else {
            Route::Direct
        }
    }

    async fn call_via_proxy(
        &self,
        provider_id: &str,
        model: &ModelSpec,
        api_key: Option<&ApiKey>,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        let proxy = self.proxy.as_ref().ok_or_else(|| {
            SummarizerError::ProxyUnavailable("no proxy configured for restricted context".to_string())
        })?;
        let result = proxy
            .call(ProxyCall {
                provider_id: provider_id.to_string(),
                model: model.clone(),
                api_key: api_key.cloned(),
                request: request.clone(),
            })
            .await;
        metrics::counter!(telemetry::PROXY_CALLS_TOTAL,
            "provider" => provider_id.to_owned(),
            "status" => if result.is_ok() { "ok" } else { "error" },
        )
        .increment(1);
        result
    }
}

#[async_trait]
impl Caller for CallDispatcher {
    async fn call(
        &self,
        provider_id: &str,
        model: &ModelSpec,
        api_key: Option<&ApiKey>,
        transport: TransportMode,
        request: &GenerationRequest,
    ) -> Result<GenerationResult> {
        let descriptor = self.registry.describe(provider_id)?;
        let route = self.route(&descriptor);
        debug!(provider = provider_id, model = %model.name, %transport, ?route, "dispatching attempt");

        let result = match route {
            Route::Proxy => self.call_via_proxy(provider_id, model, api_key, request).await,
            Route::Direct => {
                let client = self.registry.client(provider_id)?;
                client.call(model, api_key, transport, request).await
            }
        };

        match (result, api_key) {
            (Err(e), Some(key)) => Err(e.redact(key.expose())),
            (other, _) => other,
        }
    }

    fn classify(&self, provider_id: &str, err: &SummarizerError) -> FailureClass {
        match self.registry.client(provider_id) {
            Ok(client) => client.classify_failure(err),
            Err(_) => FailureClass::Other,
        }
    }
}

impl std::fmt::Debug for CallDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallDispatcher")
            .field("context", &self.context)
            .field("proxy", &self.proxy.is_some())
            .finish()
    }
}
