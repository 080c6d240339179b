//! Provider registry: descriptors and clients by provider id.
//!
//! The registry is filled once at startup and then shared read-only
//! (`Arc<ProviderRegistry>`) by every in-flight request. It answers three
//! questions for the fallback loop:
//!
//! - what does provider `id` look like ([`describe`](ProviderRegistry::describe))
//! - which model comes after the current one ([`next_model`](ProviderRegistry::next_model))
//! - which key comes after the current one ([`next_api_key`](ProviderRegistry::next_api_key))
//!
//! ```text
//!   models: [heavy, medium, light]      keys: [k1, k2]
//!            ──────────────────►               ──────►
//!            downgrade direction               rotation direction
//! ```
//!
//! Both walks only move forward; running off the end is
//! [`SummarizerError::Exhausted`].

use std::sync::Arc;

use super::traits::ProviderClient;
use crate::types::{ApiKey, ModelSpec, ProviderDescriptor};
use crate::{Result, SummarizerError};

struct Entry {
    descriptor: Arc<ProviderDescriptor>,
    client: Arc<dyn ProviderClient>,
}

/// Registry of configured providers, in registration order.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<Entry>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider with the client that speaks its protocol.
    ///
    /// Rejects an empty id, a descriptor without models, a duplicate id, and
    /// a client whose kind differs from the descriptor's. A client without
    /// streaming support clears the descriptor's streaming capability.
    pub fn register(
        &mut self,
        descriptor: ProviderDescriptor,
        client: Arc<dyn ProviderClient>,
    ) -> Result<()> {
        if descriptor.id.trim().is_empty() {
            return Err(SummarizerError::Configuration(
                "provider id must not be empty".to_string(),
            ));
        }
        if descriptor.models.is_empty() {
            return Err(SummarizerError::Configuration(format!(
                "provider {} has no models",
                descriptor.id
            )));
        }
        if self.entries.iter().any(|e| e.descriptor.id == descriptor.id) {
            return Err(SummarizerError::Configuration(format!(
                "provider {} registered twice",
                descriptor.id
            )));
        }
        if client.kind() != descriptor.kind {
            return Err(SummarizerError::Configuration(format!(
                "provider {} is {} but its client speaks {}",
                descriptor.id,
                descriptor.kind,
                client.kind()
            )));
        }
        let mut descriptor = descriptor;
        if !client.supports_streaming() {
            descriptor.capabilities.supports_streaming = false;
        }
        self.entries.push(Entry {
            descriptor: Arc::new(descriptor),
            client,
        });
        Ok(())
    }

    fn entry(&self, provider_id: &str) -> Result<&Entry> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == provider_id)
            .ok_or_else(|| SummarizerError::ProviderNotFound(provider_id.to_string()))
    }

    /// Look up a provider's descriptor.
    pub fn describe(&self, provider_id: &str) -> Result<Arc<ProviderDescriptor>> {
        self.entry(provider_id).map(|e| Arc::clone(&e.descriptor))
    }

    /// Look up the client that calls a provider.
    pub fn client(&self, provider_id: &str) -> Result<Arc<dyn ProviderClient>> {
        self.entry(provider_id).map(|e| Arc::clone(&e.client))
    }

    /// The model after `current`, with its index.
    pub fn next_model<'a>(
        &self,
        descriptor: &'a ProviderDescriptor,
        current: usize,
    ) -> Result<(&'a ModelSpec, usize)> {
        let next = current + 1;
        descriptor
            .models
            .get(next)
            .map(|m| (m, next))
            .ok_or(SummarizerError::Exhausted("models"))
    }

    /// The API key after `current`, with its index.
    pub fn next_api_key<'a>(
        &self,
        descriptor: &'a ProviderDescriptor,
        current: usize,
    ) -> Result<(&'a ApiKey, usize)> {
        let next = current + 1;
        descriptor
            .api_keys
            .get(next)
            .map(|k| (k, next))
            .ok_or(SummarizerError::Exhausted("api keys"))
    }

    /// Registered provider ids, in registration order.
    pub fn provider_ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.descriptor.id.as_str())
            .collect()
    }

    /// All descriptors, in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<ProviderDescriptor>> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::classify::ClassificationTable;
    use crate::types::{
        GenerationRequest, GenerationResult, ProviderKind, TransportMode,
    };
    use async_trait::async_trait;

    struct NullClient {
        kind: ProviderKind,
        streaming: bool,
        table: ClassificationTable,
    }

    impl NullClient {
        fn new(kind: ProviderKind) -> Arc<dyn ProviderClient> {
            Arc::new(Self {
                kind,
                streaming: true,
                table: ClassificationTable::new(),
            })
        }

        fn block_only(kind: ProviderKind) -> Arc<dyn ProviderClient> {
            Arc::new(Self {
                kind,
                streaming: false,
                table: ClassificationTable::new(),
            })
        }
    }

    #[async_trait]
    impl ProviderClient for NullClient {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn supports_streaming(&self) -> bool {
            self.streaming
        }

        async fn call(
            &self,
            _model: &ModelSpec,
            _api_key: Option<&ApiKey>,
            _transport: TransportMode,
            _request: &GenerationRequest,
        ) -> Result<GenerationResult> {
            Err(SummarizerError::EmptyResponse)
        }

        fn classification(&self) -> &ClassificationTable {
            &self.table
        }
    }

    fn demo() -> ProviderDescriptor {
        ProviderDescriptor::new("demo", ProviderKind::Gemini)
            .model(ModelSpec::new("heavy"))
            .model(ModelSpec::new("light"))
            .api_key("k1")
            .api_key("k2")
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry
            .register(demo(), NullClient::new(ProviderKind::Gemini))
            .unwrap();
        registry
    }

    #[test]
    fn describe_known_and_unknown() {
        let registry = registry();
        assert_eq!(registry.describe("demo").unwrap().models.len(), 2);
        assert!(matches!(
            registry.describe("nope"),
            Err(SummarizerError::ProviderNotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn next_model_walks_forward_then_exhausts() {
        let registry = registry();
        let desc = registry.describe("demo").unwrap();
        let (model, idx) = registry.next_model(&desc, 0).unwrap();
        assert_eq!((model.name.as_str(), idx), ("light", 1));
        assert!(matches!(
            registry.next_model(&desc, 1),
            Err(SummarizerError::Exhausted("models"))
        ));
    }

    #[test]
    fn next_api_key_walks_forward_then_exhausts() {
        let registry = registry();
        let desc = registry.describe("demo").unwrap();
        let (key, idx) = registry.next_api_key(&desc, 0).unwrap();
        assert_eq!((key.expose(), idx), ("k2", 1));
        assert!(matches!(
            registry.next_api_key(&desc, 1),
            Err(SummarizerError::Exhausted("api keys"))
        ));
    }

    #[test]
    fn keyless_provider_has_no_next_key() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(
                ProviderDescriptor::new("local", ProviderKind::Ollama).model(ModelSpec::new("llama3")),
                NullClient::new(ProviderKind::Ollama),
            )
            .unwrap();
        let desc = registry.describe("local").unwrap();
        assert!(registry.next_api_key(&desc, 0).is_err());
    }

    #[test]
    fn register_rejects_invalid_descriptors() {
        let mut registry = registry();
        let client = NullClient::new(ProviderKind::Gemini);

        let duplicate = registry.register(demo(), Arc::clone(&client));
        assert!(matches!(duplicate, Err(SummarizerError::Configuration(_))));

        let no_models = ProviderDescriptor::new("empty", ProviderKind::Gemini);
        assert!(registry.register(no_models, Arc::clone(&client)).is_err());

        let blank = ProviderDescriptor::new("  ", ProviderKind::Gemini).model(ModelSpec::new("m"));
        assert!(registry.register(blank, Arc::clone(&client)).is_err());

        let wrong_kind =
            ProviderDescriptor::new("local", ProviderKind::Ollama).model(ModelSpec::new("llama3"));
        assert!(registry.register(wrong_kind, client).is_err());

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn block_only_client_clears_streaming_capability() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(demo(), NullClient::block_only(ProviderKind::Gemini))
            .unwrap();
        assert!(!registry.describe("demo").unwrap().capabilities.supports_streaming);
    }

    #[test]
    fn provider_ids_keep_registration_order() {
        let mut registry = registry();
        registry
            .register(
                ProviderDescriptor::new("local", ProviderKind::Ollama).model(ModelSpec::new("llama3")),
                NullClient::new(ProviderKind::Ollama),
            )
            .unwrap();
        assert_eq!(registry.provider_ids(), vec!["demo", "local"]);
    }
}
