//! Page-wide broadcast bus.
//!
//! Every script in the page sees every posted message, exactly like
//! `window.postMessage`. Receivers filter by [`Envelope::target`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Messages buffered per subscriber before it is considered lagging.
const DEFAULT_CAPACITY: usize = 1024;

// ============================================================================
// Envelope
// ============================================================================

/// A message as posted on the page.
///
/// # Format
///
/// ```json
/// { "target": "opn-contentscript", "data": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Name of the intended receiver.
    pub target: String,

    /// Payload.
    pub data: Value,
}

impl Envelope {
    /// Creates a new envelope.
    #[inline]
    #[must_use]
    pub fn new(target: impl Into<String>, data: Value) -> Self {
        Self {
            target: target.into(),
            data,
        }
    }
}

// ============================================================================
// MessageBus
// ============================================================================

/// Shared `postMessage` bus of one page.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct MessageBus {
    /// `None` once the page is torn down.
    sender: Arc<RwLock<Option<broadcast::Sender<Envelope>>>>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    /// Creates a bus with the default per-subscriber capacity.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a bus with a specific per-subscriber capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(RwLock::new(Some(sender))),
        }
    }

    /// Posts an envelope to every current subscriber.
    ///
    /// Posting with nobody listening is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the bus has been closed.
    pub fn post(&self, envelope: Envelope) -> Result<()> {
        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            return Err(Error::ConnectionClosed);
        };

        trace!(target_name = %envelope.target, "post");
        let _ = sender.send(envelope);
        Ok(())
    }

    /// Subscribes to all envelopes posted from now on.
    ///
    /// Subscribing to a closed bus yields a receiver that is already closed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        match self.sender.read().as_ref() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Closes the bus, as page teardown does.
    ///
    /// Subscribers drain what was already posted, then observe the end.
    pub fn close(&self) {
        if self.sender.write().take().is_some() {
            debug!("Message bus closed");
        }
    }

    /// Returns `true` if the bus has been closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_every_subscriber_sees_posts() {
        let bus = MessageBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.post(Envelope::new("x", json!(1))).expect("post");

        assert_eq!(a.recv().await.expect("recv").data, json!(1));
        assert_eq!(b.recv().await.expect("recv").target, "x");
    }

    #[test]
    fn test_post_without_subscribers_is_ok() {
        let bus = MessageBus::new();
        assert!(bus.post(Envelope::new("nobody", Value::Null)).is_ok());
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe();

        bus.post(Envelope::new("x", json!("last"))).expect("post");
        bus.close();

        assert!(bus.is_closed());
        assert_eq!(rx.recv().await.expect("recv").data, json!("last"));
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
        assert!(matches!(
            bus.post(Envelope::new("x", Value::Null)),
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_subscribe_after_close_is_closed() {
        let bus = MessageBus::new();
        bus.close();
        let mut rx = bus.subscribe();
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }

    #[test]
    fn test_envelope_format() {
        let json = serde_json::to_value(Envelope::new("opn-inpage", json!({"a": 1})))
            .expect("serialize");
        assert_eq!(json, json!({"target": "opn-inpage", "data": {"a": 1}}));
    }
}
