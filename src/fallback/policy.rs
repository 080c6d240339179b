//! Fallback policy: which downgrades are allowed and how long to wait.

use std::time::Duration;

/// Configuration of the fallback loop.
///
/// All three downgrade paths are enabled by default. Between attempts the
/// loop waits `initial_delay * 2^n` (capped at `max_delay`), where `n`
/// counts the downgrades already taken in this request:
///
/// ```rust
/// # use summarizerrrr::FallbackPolicy;
/// # use std::time::Duration;
/// let policy = FallbackPolicy::new()
///     .transport_downgrade(false)
///     .initial_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPolicy {
    /// Rotate to the next API key on auth / rate-limit failures. Default: true.
    pub key_rotation: bool,
    /// Move to the next (lighter) model on overload. Default: true.
    pub model_downgrade: bool,
    /// Retry once in block mode after a streaming failure. Default: true.
    pub transport_downgrade: bool,
    /// Wait before the first retry. Default: 250ms.
    pub initial_delay: Duration,
    /// Upper bound of the exponential wait. Default: 10s.
    pub max_delay: Duration,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            key_rotation: true,
            model_downgrade: true,
            transport_downgrade: true,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl FallbackPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// All downgrades enabled, no waiting between attempts.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// No downgrades at all: the first failure is terminal.
    pub fn disabled() -> Self {
        Self {
            key_rotation: false,
            model_downgrade: false,
            transport_downgrade: false,
            ..Self::immediate()
        }
    }

    pub fn key_rotation(mut self, enabled: bool) -> Self {
        self.key_rotation = enabled;
        self
    }

    pub fn model_downgrade(mut self, enabled: bool) -> Self {
        self.model_downgrade = enabled;
        self
    }

    pub fn transport_downgrade(mut self, enabled: bool) -> Self {
        self.transport_downgrade = enabled;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Backoff before the retry following downgrade `step` (0-indexed).
    pub fn delay_for_step(&self, step: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(step))
            .min(self.max_delay)
    }

    /// Wait before the next attempt.
    ///
    /// A provider `retry_after` hint wins when it is longer than the backoff,
    /// but never exceeds `max_delay`. With delays disabled (`max_delay`
    /// zero) hints are ignored too.
    pub fn effective_delay(&self, step: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.delay_for_step(step);
        match retry_after {
            Some(hint) if hint > backoff => hint.min(self.max_delay),
            _ => backoff,
        }
    }
}
