//! Fallback events published when a request changes strategy.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Why the controller downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Auth or rate-limit failure; next API key, same model.
    KeyRotation,
    /// Model overloaded; next (lighter) model.
    Overload,
    /// Keys exhausted after auth/rate-limit failures; next model.
    Error,
    /// Stream broke; same model and key in blocking mode.
    Transport,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReason::KeyRotation => "key_rotation",
            FallbackReason::Overload => "overload",
            FallbackReason::Error => "error",
            FallbackReason::Transport => "transport",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One downgrade step of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackEvent {
    pub provider: String,
    pub from_model: String,
    pub to_model: String,
    pub reason: FallbackReason,
    pub timestamp: SystemTime,
}

impl FallbackEvent {
    pub fn new(
        provider: impl Into<String>,
        from_model: impl Into<String>,
        to_model: impl Into<String>,
        reason: FallbackReason,
    ) -> Self {
        Self {
            provider: provider.into(),
            from_model: from_model.into(),
            to_model: to_model.into(),
            reason,
            timestamp: SystemTime::now(),
        }
    }

    /// Short user-facing text for a passive notification.
    pub fn toast_message(&self) -> String {
        match self.reason {
            FallbackReason::KeyRotation => format!(
                "{}: API key rejected or rate limited, trying the next key for {}",
                self.provider, self.from_model
            ),
            FallbackReason::Overload => format!(
                "{} is overloaded, switching to {}",
                self.from_model, self.to_model
            ),
            FallbackReason::Error => format!(
                "{}: no usable API key for {}, switching to {}",
                self.provider, self.from_model, self.to_model
            ),
            FallbackReason::Transport => format!(
                "Streaming from {} failed, retrying without streaming",
                self.from_model
            ),
        }
    }
}
