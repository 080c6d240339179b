//! Fallback controller: one logical request, many attempts.
//!
//! The controller drives a strictly sequential loop. Each failed attempt is
//! classified and mapped to at most one downgrade step:
//!
//! | failure class                     | step                                   |
//! |-----------------------------------|----------------------------------------|
//! | `auth_or_rate_limit`              | next API key, else next model (`error`) |
//! | `overload`                        | next model, keys restart at the first  |
//! | `transport_streaming_unsupported` | same model and key in block mode, once |
//! | `other`                           | none, terminal                         |
//!
//! Key and model indices only move forward and block mode sticks once
//! taken, so no `(model, key, transport)` triple is tried twice in one
//! request. Every step publishes one [`FallbackEvent`].
//!
//! A model override that names a configured model starts the walk at that
//! model. Any other override is the only candidate: it runs with the first
//! model's parameters and cannot be downgraded.

mod policy;

pub use policy::FallbackPolicy;

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::dispatch::Caller;
use crate::notify::NotificationBridge;
use crate::providers::ProviderRegistry;
use crate::SummarizerError;
use crate::telemetry;
use crate::types::{
    ApiKey, AttemptRecord, FailureClass, FallbackEvent, FallbackReason, Generation,
    GenerationRequest, GenerationResult, ModelSpec, ProviderDescriptor, TerminalFailure,
    TransportMode,
};

/// Mutable state of one request. Never shared between requests.
#[derive(Debug)]
struct AttemptState {
    model: ModelSpec,
    model_index: usize,
    /// Override outside the configured list: no model downgrade.
    pinned: bool,
    key_index: Option<usize>,
    transport: TransportMode,
    transport_downgraded: bool,
    downgrades: u32,
    trail: Vec<AttemptRecord>,
}

impl AttemptState {
    fn new(descriptor: &ProviderDescriptor, request: &GenerationRequest, transport: TransportMode) -> Self {
        let (model, model_index, pinned) = match request.model_override.as_deref() {
            None => (descriptor.models[0].clone(), 0, false),
            Some(name) => match descriptor.model_index(name) {
                Some(i) => (descriptor.models[i].clone(), i, false),
                None => (
                    ModelSpec::new(name).with_params(descriptor.models[0].params.clone()),
                    0,
                    true,
                ),
            },
        };
        Self {
            model,
            model_index,
            pinned,
            key_index: first_key(descriptor),
            transport,
            transport_downgraded: false,
            downgrades: 0,
            trail: Vec::new(),
        }
    }

    fn record(&mut self, error: Option<String>) {
        self.trail.push(AttemptRecord {
            model: self.model.name.clone(),
            key_index: self.key_index,
            transport: self.transport,
            error,
        });
    }
}

fn first_key(descriptor: &ProviderDescriptor) -> Option<usize> {
    (!descriptor.api_keys.is_empty()).then_some(0)
}

/// A downgrade chosen for the next attempt.
struct Step {
    reason: FallbackReason,
    from_model: String,
}

/// Wraps a request with the key, model and transport downgrade policies.
#[derive(Debug, Clone)]
pub struct FallbackController {
    registry: Arc<ProviderRegistry>,
    bridge: NotificationBridge,
    policy: FallbackPolicy,
}

impl FallbackController {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        bridge: NotificationBridge,
        policy: FallbackPolicy,
    ) -> Self {
        Self {
            registry,
            bridge,
            policy,
        }
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    /// Run `request` against `descriptor` until it succeeds or no
    /// downgrade remains.
    ///
    /// `transport` is the mode of the first attempt, as chosen by the
    /// dispatcher.
    #[instrument(
        name = "fallback.execute",
        skip_all,
        fields(provider = %descriptor.id, initial_transport = %transport)
    )]
    pub async fn execute<C>(
        &self,
        descriptor: &ProviderDescriptor,
        request: &GenerationRequest,
        transport: TransportMode,
        caller: &C,
    ) -> Result<Generation, TerminalFailure>
    where
        C: Caller + ?Sized,
    {
        let provider = descriptor.id.as_str();
        if descriptor.models.is_empty() {
            return Err(TerminalFailure {
                provider: provider.to_string(),
                class: FailureClass::Other,
                last_error: SummarizerError::Configuration(format!(
                    "provider {provider} has no models"
                )),
                attempts: Vec::new(),
            });
        }
        let mut state = AttemptState::new(descriptor, request, transport);

        loop {
            let api_key: Option<&ApiKey> = state.key_index.map(|i| &descriptor.api_keys[i]);
            debug!(
                model = %state.model.name,
                key_index = ?state.key_index,
                transport = %state.transport,
                attempt = state.trail.len() + 1,
                "attempting call"
            );

            let err = match caller
                .call(provider, &state.model, api_key, state.transport, request)
                .await
            {
                Ok(result) => {
                    state.record(None);
                    record_attempt(provider, state.transport, "ok");
                    record_tokens(provider, &result);
                    if state.trail.len() > 1 {
                        info!(
                            model = %state.model.name,
                            attempts = state.trail.len(),
                            "recovered after fallback"
                        );
                    }
                    return Ok(Generation {
                        provider: provider.to_string(),
                        result,
                        attempts: state.trail,
                    });
                }
                Err(err) => err,
            };

            let class = caller.classify(provider, &err);
            state.record(Some(err.to_string()));
            record_attempt(provider, state.transport, class.as_str());

            let failed_key = state.key_index;
            let Some(step) = self.next_step(descriptor, &mut state, class) else {
                warn!(
                    model = %state.model.name,
                    class = %class,
                    attempts = state.trail.len(),
                    error = %err,
                    "no fallback left, giving up"
                );
                return Err(TerminalFailure {
                    provider: provider.to_string(),
                    class,
                    last_error: err,
                    attempts: state.trail,
                });
            };

            let event = FallbackEvent::new(provider, step.from_model, &state.model.name, step.reason);
            warn!(
                from_model = %event.from_model,
                to_model = %event.to_model,
                reason = %event.reason,
                key_index = ?state.key_index,
                transport = %state.transport,
                error = %err,
                "falling back"
            );
            metrics::counter!(telemetry::FALLBACKS_TOTAL,
                "provider" => provider.to_owned(),
                "reason" => step.reason.as_str(),
            )
            .increment(1);
            self.bridge.publish(&event);

            // A retry-after hint only concerns the key that was throttled.
            let hint = err.retry_after().filter(|_| state.key_index == failed_key);
            let delay = self.policy.effective_delay(state.downgrades, hint);
            state.downgrades += 1;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Pick and apply the downgrade for a failure of class `class`.
    fn next_step(
        &self,
        descriptor: &ProviderDescriptor,
        state: &mut AttemptState,
        class: FailureClass,
    ) -> Option<Step> {
        match class {
            FailureClass::AuthOrRateLimit => self
                .rotate_key(descriptor, state)
                .or_else(|| self.downgrade_model(descriptor, state, FallbackReason::Error)),
            FailureClass::Overload => {
                self.downgrade_model(descriptor, state, FallbackReason::Overload)
            }
            FailureClass::TransportStreamingUnsupported => self.downgrade_transport(state),
            FailureClass::Other => None,
        }
    }

    fn rotate_key(&self, descriptor: &ProviderDescriptor, state: &mut AttemptState) -> Option<Step> {
        if !self.policy.key_rotation {
            return None;
        }
        let current = state.key_index?;
        let (_, next) = self.registry.next_api_key(descriptor, current).ok()?;
        state.key_index = Some(next);
        Some(Step {
            reason: FallbackReason::KeyRotation,
            from_model: state.model.name.clone(),
        })
    }

    fn downgrade_model(
        &self,
        descriptor: &ProviderDescriptor,
        state: &mut AttemptState,
        reason: FallbackReason,
    ) -> Option<Step> {
        if !self.policy.model_downgrade || state.pinned {
            return None;
        }
        let (model, next) = self.registry.next_model(descriptor, state.model_index).ok()?;
        let from_model = std::mem::replace(&mut state.model, model.clone()).name;
        state.model_index = next;
        state.key_index = first_key(descriptor);
        Some(Step { reason, from_model })
    }

    fn downgrade_transport(&self, state: &mut AttemptState) -> Option<Step> {
        if !self.policy.transport_downgrade
            || state.transport_downgraded
            || state.transport != TransportMode::Stream
        {
            return None;
        }
        state.transport = TransportMode::Block;
        state.transport_downgraded = true;
        Some(Step {
            reason: FallbackReason::Transport,
            from_model: state.model.name.clone(),
        })
    }
}

fn record_attempt(provider: &str, transport: TransportMode, outcome: &'static str) {
    metrics::counter!(telemetry::ATTEMPTS_TOTAL,
        "provider" => provider.to_owned(),
        "transport" => transport.as_str(),
        "outcome" => outcome,
    )
    .increment(1);
}

fn record_tokens(provider: &str, result: &GenerationResult) {
    if let Some(usage) = &result.usage {
        metrics::counter!(telemetry::TOKENS_TOTAL,
            "provider" => provider.to_owned(),
            "direction" => "prompt",
        )
        .increment(u64::from(usage.prompt_tokens));
        metrics::counter!(telemetry::TOKENS_TOTAL,
            "provider" => provider.to_owned(),
            "direction" => "completion",
        )
        .increment(u64::from(usage.completion_tokens));
    }
}
