//! Notification bridge: fallback events to user-visible toasts.
//!
//! The fallback loop publishes one [`FallbackEvent`] per downgrade. The
//! bridge hands it to the registered listener and returns immediately. It
//! never fails: a listener that panics is contained and logged, and with no
//! listener the event is dropped.
//!
//! ```rust
//! # use summarizerrrr::notify::{FnListener, NotificationBridge};
//! let bridge = NotificationBridge::new(FnListener::new(|event| {
//!     eprintln!("{}", event.toast_message());
//! }));
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::warn;

use crate::types::FallbackEvent;

/// Receives fallback events. Must return quickly.
pub trait FallbackListener: Send + Sync {
    fn on_fallback(&self, event: &FallbackEvent);
}

/// Listener backed by a closure.
pub struct FnListener<F>(F);

impl<F> FnListener<F>
where
    F: Fn(&FallbackEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> FallbackListener for FnListener<F>
where
    F: Fn(&FallbackEvent) + Send + Sync,
{
    fn on_fallback(&self, event: &FallbackEvent) {
        (self.0)(event)
    }
}

/// Listener that forwards events into an unbounded tokio channel.
///
/// Sending never waits. Once the receiver is dropped, events are discarded.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<FallbackEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FallbackEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Create a listener whose events arrive as a `Stream`.
    pub fn stream() -> (Self, UnboundedReceiverStream<FallbackEvent>) {
        let (listener, rx) = Self::new();
        (listener, UnboundedReceiverStream::new(rx))
    }
}

impl FallbackListener for ChannelListener {
    fn on_fallback(&self, event: &FallbackEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Fire-and-forget delivery of fallback events.
#[derive(Clone, Default)]
pub struct NotificationBridge {
    listener: Option<Arc<dyn FallbackListener>>,
}

impl NotificationBridge {
    pub fn new(listener: impl FallbackListener + 'static) -> Self {
        Self {
            listener: Some(Arc::new(listener)),
        }
    }

    pub fn from_arc(listener: Arc<dyn FallbackListener>) -> Self {
        Self {
            listener: Some(listener),
        }
    }

    /// Bridge with no listener; every event is dropped.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    /// Deliver an event to the listener, if any.
    pub fn publish(&self, event: &FallbackEvent) {
        let Some(listener) = &self.listener else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| listener.on_fallback(event))).is_err() {
            warn!(
                provider = %event.provider,
                reason = %event.reason,
                "fallback listener panicked; event dropped"
            );
        }
    }
}

impl std::fmt::Debug for NotificationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBridge")
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FallbackReason;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn event() -> FallbackEvent {
        FallbackEvent::new("demo", "heavy", "light", FallbackReason::Overload)
    }

    #[test]
    fn closure_listener_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let bridge = NotificationBridge::new(FnListener::new(move |e: &FallbackEvent| {
            sink.lock().unwrap().push(e.reason);
        }));
        bridge.publish(&event());
        assert_eq!(*seen.lock().unwrap(), vec![FallbackReason::Overload]);
    }

    #[test]
    fn silent_bridge_drops_events() {
        let bridge = NotificationBridge::silent();
        assert!(!bridge.has_listener());
        bridge.publish(&event());
    }

    #[test]
    fn panicking_listener_is_contained() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let bridge = NotificationBridge::new(FnListener::new(move |_: &FallbackEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("toast renderer crashed");
        }));
        bridge.publish(&event());
        bridge.publish(&event());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn channel_listener_forwards_and_tolerates_dropped_receiver() {
        let (listener, mut rx) = ChannelListener::new();
        let bridge = NotificationBridge::new(listener);
        bridge.publish(&event());
        assert_eq!(rx.recv().await.unwrap().to_model, "light");

        drop(rx);
        bridge.publish(&event());
    }
}
