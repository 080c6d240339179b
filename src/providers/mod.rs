//! Provider clients and the registry that holds them.
//!
//! Each supported [`ProviderKind`] has one client behind the
//! [`ProviderClient`] trait. Clients are compiled in per feature
//! (`gemini`, `openai`, `ollama`; all on by default).

pub mod classify;
pub mod http;
pub mod registry;
pub mod stream;
pub mod traits;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

use std::sync::Arc;

pub use classify::{ClassificationRule, ClassificationTable};
pub use registry::ProviderRegistry;
pub use traits::ProviderClient;

#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;
#[cfg(feature = "ollama")]
pub use ollama::OllamaClient;
#[cfg(feature = "openai")]
pub use openai::OpenAiClient;

use crate::types::ProviderKind;
use crate::{Result, SummarizerError};

/// Build the client for a provider kind.
///
/// `base_url` overrides the kind's default endpoint. Fails with a
/// configuration error when the kind's feature is not compiled in.
pub fn client_for(
    kind: ProviderKind,
    http: reqwest::Client,
    base_url: Option<&str>,
    classification: ClassificationTable,
) -> Result<Arc<dyn ProviderClient>> {
    match kind {
        #[cfg(feature = "gemini")]
        ProviderKind::Gemini => {
            let client = match base_url {
                Some(url) => GeminiClient::with_base_url(http, url),
                None => GeminiClient::new(http),
            };
            Ok(Arc::new(client.classification_table(classification)))
        }
        #[cfg(feature = "openai")]
        ProviderKind::OpenaiCompatible => {
            let client = match base_url {
                Some(url) => OpenAiClient::with_base_url(http, url),
                None => OpenAiClient::new(http),
            };
            Ok(Arc::new(client.classification_table(classification)))
        }
        #[cfg(feature = "ollama")]
        ProviderKind::Ollama => {
            let client = match base_url {
                Some(url) => OllamaClient::with_base_url(http, url),
                None => OllamaClient::new(http),
            };
            Ok(Arc::new(client.classification_table(classification)))
        }
        #[allow(unreachable_patterns)]
        other => {
            let _ = (http, base_url, classification);
            Err(SummarizerError::Configuration(format!(
                "provider kind {other} is not compiled in (enable the matching feature)"
            )))
        }
    }
}
