//! Telemetry metric name constants.
//!
//! Centralised metric names for orchestrator operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `summarizerrrr_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider` — provider id (e.g. "gemini", "ollama")
//! - `status` — outcome: "ok" or "error"
//! - `transport` — "stream" or "block"
//! - `reason` — fallback reason ("key_rotation", "overload", "error", "transport")

/// Logical generate requests handled by the orchestrator.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "summarizerrrr_requests_total";

/// Wall time of a logical request, all attempts included.
///
/// Labels: `provider`.
pub const REQUEST_DURATION_SECONDS: &str = "summarizerrrr_request_duration_seconds";

/// Individual provider calls.
///
/// Labels: `provider`, `transport`, `outcome` ("ok" or a failure class).
pub const ATTEMPTS_TOTAL: &str = "summarizerrrr_attempts_total";

/// Downgrade steps taken.
///
/// Labels: `provider`, `reason`.
pub const FALLBACKS_TOTAL: &str = "summarizerrrr_fallbacks_total";

/// Calls routed through the privileged proxy.
///
/// Labels: `provider`, `status`.
pub const PROXY_CALLS_TOTAL: &str = "summarizerrrr_proxy_calls_total";

/// Total tokens consumed.
///
/// Labels: `provider`, `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "summarizerrrr_tokens_total";
