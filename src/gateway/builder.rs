//! Builder for configuring orchestrator instances

use std::sync::Arc;
use std::time::Duration;

use super::Orchestrator;
use crate::dispatch::{CallDispatcher, ProxyHandle, spawn_proxy};
use crate::fallback::{FallbackController, FallbackPolicy};
use crate::notify::{FallbackListener, NotificationBridge};
use crate::providers::http::{DEFAULT_TIMEOUT, build_client};
use crate::providers::{ClassificationTable, ProviderClient, ProviderRegistry, client_for};
use crate::types::{ExecutionContext, ProviderDescriptor};
use crate::{Result, SummarizerError};

/// Main entry point for creating orchestrator instances.
pub struct Summarizerrrr;

impl Summarizerrrr {
    /// Create a new builder for configuring the orchestrator.
    pub fn builder() -> SummarizerrrrBuilder {
        SummarizerrrrBuilder::new()
    }
}

enum ClientSpec {
    Default {
        base_url: Option<String>,
        classification: ClassificationTable,
    },
    Custom(Arc<dyn ProviderClient>),
}

/// Builder for configuring orchestrator instances.
pub struct SummarizerrrrBuilder {
    providers: Vec<(ProviderDescriptor, ClientSpec)>,
    timeout: Duration,
    policy: FallbackPolicy,
    listener: Option<Arc<dyn FallbackListener>>,
    context: ExecutionContext,
    proxy: Option<ProxyHandle>,
    local_proxy: bool,
}

impl Default for SummarizerrrrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SummarizerrrrBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            policy: FallbackPolicy::default(),
            listener: None,
            context: ExecutionContext::default(),
            proxy: None,
            local_proxy: false,
        }
    }

    /// Add a provider served by the built-in client for its kind.
    pub fn provider(self, descriptor: ProviderDescriptor) -> Self {
        self.provider_with_table(descriptor, None, ClassificationTable::new())
    }

    /// Add a provider served by the built-in client at a custom endpoint.
    pub fn provider_at(self, descriptor: ProviderDescriptor, base_url: impl Into<String>) -> Self {
        self.provider_with_table(descriptor, Some(base_url.into()), ClassificationTable::new())
    }

    /// Add a provider with an explicit endpoint and classification table.
    pub fn provider_with_table(
        mut self,
        descriptor: ProviderDescriptor,
        base_url: Option<String>,
        classification: ClassificationTable,
    ) -> Self {
        self.providers.push((
            descriptor,
            ClientSpec::Default {
                base_url,
                classification,
            },
        ));
        self
    }

    /// Add a provider served by a caller-supplied client.
    pub fn provider_with_client(
        mut self,
        descriptor: ProviderDescriptor,
        client: Arc<dyn ProviderClient>,
    ) -> Self {
        self.providers.push((descriptor, ClientSpec::Custom(client)));
        self
    }

    /// Set the HTTP request timeout of the built-in clients (default: 120s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the fallback policy.
    pub fn policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register the listener that receives fallback events.
    pub fn listener(mut self, listener: impl FallbackListener + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn listener_arc(mut self, listener: Arc<dyn FallbackListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Set the default execution context (default: privileged).
    pub fn execution_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    /// Use an existing proxy for local providers in a restricted context.
    pub fn proxy(mut self, proxy: ProxyHandle) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Spawn a proxy worker over this orchestrator's own providers.
    ///
    /// Requires `build()` to run inside a tokio runtime.
    pub fn local_proxy(mut self, enabled: bool) -> Self {
        self.local_proxy = enabled;
        self
    }

    /// Build the orchestrator.
    ///
    /// Fails when a provider descriptor is invalid, two providers share an
    /// id, a provider kind is not compiled in, or a local proxy is requested
    /// outside a tokio runtime.
    pub fn build(self) -> Result<Orchestrator> {
        let needs_http = self
            .providers
            .iter()
            .any(|(_, spec)| matches!(spec, ClientSpec::Default { .. }));
        let http = if needs_http {
            Some(build_client(self.timeout)?)
        } else {
            None
        };

        let mut registry = ProviderRegistry::new();
        for (descriptor, spec) in self.providers {
            let client = match (spec, &http) {
                (ClientSpec::Custom(client), _) => client,
                (
                    ClientSpec::Default {
                        base_url,
                        classification,
                    },
                    Some(http),
                ) => client_for(
                    descriptor.kind,
                    http.clone(),
                    base_url.as_deref(),
                    classification,
                )?,
                (ClientSpec::Default { .. }, None) => {
                    return Err(SummarizerError::Configuration(
                        "HTTP client missing for built-in provider".to_string(),
                    ));
                }
            };
            registry.register(descriptor, client)?;
        }
        let registry = Arc::new(registry);

        let proxy = match (self.proxy, self.local_proxy) {
            (Some(proxy), _) => Some(proxy),
            (None, true) => {
                if tokio::runtime::Handle::try_current().is_err() {
                    return Err(SummarizerError::Configuration(
                        "local proxy requires a tokio runtime".to_string(),
                    ));
                }
                let (handle, _worker) = spawn_proxy(Arc::clone(&registry));
                Some(handle)
            }
            (None, false) => None,
        };

        let mut dispatcher = CallDispatcher::new(Arc::clone(&registry), self.context);
        if let Some(proxy) = proxy {
            dispatcher = dispatcher.with_proxy(proxy);
        }

        let bridge = match self.listener {
            Some(listener) => NotificationBridge::from_arc(listener),
            None => NotificationBridge::silent(),
        };
        let controller = FallbackController::new(Arc::clone(&registry), bridge, self.policy);

        Ok(Orchestrator::new(registry, dispatcher, controller))
    }
}
