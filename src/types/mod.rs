//! Public types for the Summarizerrrr orchestrator.

mod event;
mod outcome;
mod provider;
mod request;
mod response;

pub use event::{FallbackEvent, FallbackReason};
pub use outcome::{AttemptRecord, FailureClass, Generation, TerminalFailure};
pub use provider::{
    ApiKey, GenerationParams, ModelSpec, ProviderCapabilities, ProviderDescriptor, ProviderKind,
};
pub use request::{ExecutionContext, GenerationRequest, TransportMode};
pub use response::{FinishReason, GenerationResult, Usage};
