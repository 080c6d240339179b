//! Summarizerrrr - provider call orchestrator for LLM summaries
//!
//! This crate sends one summarization request to an LLM provider and keeps
//! it alive through the failures providers routinely produce:
//!
//! - a rejected or rate-limited API key rotates to the next key
//! - an overloaded model downgrades to the next, lighter model
//! - a broken stream retries once in blocking mode
//!
//! Each downgrade is reported to an optional listener as a
//! [`FallbackEvent`] (for toast-style notifications). When nothing is left
//! to try the request fails with a [`TerminalFailure`] carrying the full
//! attempt trail.
//!
//! # Example
//!
//! ```rust,no_run
//! use summarizerrrr::{
//!     FnListener, GenerationParams, GenerationRequest, ModelSpec, ProviderDescriptor,
//!     ProviderKind, Summarizerrrr,
//! };
//!
//! #[tokio::main]
//! async fn main() -> summarizerrrr::Result<()> {
//!     let gemini = ProviderDescriptor::new("gemini", ProviderKind::Gemini)
//!         .model(ModelSpec::new("gemini-2.5-pro")
//!             .with_params(GenerationParams::new().max_output_tokens(8192)))
//!         .model(ModelSpec::new("gemini-2.5-flash"))
//!         .api_key("first-key")
//!         .api_key("second-key");
//!
//!     let orchestrator = Summarizerrrr::builder()
//!         .provider(gemini)
//!         .listener(FnListener::new(|event| eprintln!("{}", event.toast_message())))
//!         .build()?;
//!
//!     let request = GenerationRequest::new(
//!         "gemini",
//!         "Summarize the article in five bullet points.",
//!         "…article text…",
//!     );
//!     let generation = orchestrator.generate(&request).await?;
//!
//!     println!("{}", generation.result.text);
//!     Ok(())
//! }
//! ```
//!
//! # Execution contexts
//!
//! In [`ExecutionContext::Restricted`] every call is made in block mode, and
//! calls to locally hosted providers (Ollama) go through a message-passing
//! proxy ([`dispatch::spawn_proxy`]) instead of a direct connection.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod notify;
pub mod providers;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use error::{Result, SummarizerError};
pub use gateway::{Orchestrator, Summarizerrrr, SummarizerrrrBuilder};

pub use config::{Config, Secrets};
pub use dispatch::{CallDispatcher, Caller, ProxyHandle, Route};
pub use fallback::{FallbackController, FallbackPolicy};
pub use notify::{ChannelListener, FallbackListener, FnListener, NotificationBridge};
pub use providers::{
    ClassificationRule, ClassificationTable, ProviderClient, ProviderRegistry,
};

pub use types::{
    ApiKey, AttemptRecord, ExecutionContext, FailureClass, FallbackEvent, FallbackReason,
    FinishReason, Generation, GenerationParams, GenerationRequest, GenerationResult, ModelSpec,
    ProviderCapabilities, ProviderDescriptor, ProviderKind, TerminalFailure, TransportMode, Usage,
};

pub use version::{GIT_BRANCH, GIT_SHA, PKG_VERSION, version_string};
