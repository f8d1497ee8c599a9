//! Named duplex stream over the page message bus.
//!
//! A stream is identified by its own `name` and the peer's `target`. It
//! only receives envelopes addressed to its name and posts everything to
//! its target.
//!
//! # Handshake
//!
//! Either side may start first, so both announce themselves:
//!
//! ```text
//!   A                      B
//!   │──── SYN ────►(lost)  │   B not listening yet
//!   │                      │
//!   │◄──── SYN ────────────│   B starts
//!   │───── ACK ───────────►│   A has seen SYN
//!   │◄──── ACK ────────────│   B connected, B never saw SYN
//!   │                      │
//!   A connected
//! ```
//!
//! Writes issued before the handshake completes are held back and flushed
//! in order once it does.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

use super::bus::{Envelope, MessageBus};

// ============================================================================
// Constants
// ============================================================================

/// Handshake opener.
pub const SYN: &str = "SYN";

/// Handshake acknowledgement.
pub const ACK: &str = "ACK";

// ============================================================================
// Handshake
// ============================================================================

/// Handshake state shared by both halves.
#[derive(Debug, Default)]
struct Handshake {
    /// Handshake complete; writes go straight to the bus.
    init: bool,
    /// Peer's SYN was observed.
    have_syn: bool,
    /// Writes waiting for the handshake.
    corked: VecDeque<Value>,
}

/// Addressing shared by both halves.
#[derive(Debug)]
struct Endpoint {
    name: String,
    target: String,
}

impl Endpoint {
    fn post(&self, bus: &MessageBus, data: Value) -> Result<()> {
        bus.post(Envelope::new(self.target.clone(), data))
            .map_err(|_| Error::transport(&self.name, "message bus closed"))
    }
}

// ============================================================================
// PostMessageStream
// ============================================================================

/// Duplex stream between two named page endpoints.
///
/// Use [`PostMessageStream::split`] to obtain independently owned read
/// and write halves.
pub struct PostMessageStream {
    bus: MessageBus,
    endpoint: Arc<Endpoint>,
    state: Arc<Mutex<Handshake>>,
    inbox: broadcast::Receiver<Envelope>,
}

impl PostMessageStream {
    /// Opens a stream named `name` talking to `target` and posts `SYN`.
    ///
    /// Each call creates an independent stream.
    pub fn new(bus: &MessageBus, name: impl Into<String>, target: impl Into<String>) -> Self {
        let endpoint = Arc::new(Endpoint {
            name: name.into(),
            target: target.into(),
        });

        // Subscribe before announcing so the peer's answer cannot be missed.
        let inbox = bus.subscribe();

        if let Err(e) = endpoint.post(bus, Value::from(SYN)) {
            warn!(name = %endpoint.name, error = %e, "Failed to post SYN");
        }

        debug!(name = %endpoint.name, target_name = %endpoint.target, "PostMessageStream opened");

        Self {
            bus: bus.clone(),
            endpoint,
            state: Arc::new(Mutex::new(Handshake::default())),
            inbox,
        }
    }

    /// This stream's name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.endpoint.name
    }

    /// The peer's name.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &str {
        &self.endpoint.target
    }

    /// Returns `true` once the handshake has completed.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.lock().init
    }

    /// Splits the stream into read and write halves.
    #[must_use]
    pub fn split(self) -> (PostMessageReader, PostMessageWriter) {
        let writer = PostMessageWriter {
            bus: self.bus.clone(),
            endpoint: Arc::clone(&self.endpoint),
            state: Arc::clone(&self.state),
        };

        let reader = PostMessageReader {
            bus: self.bus,
            endpoint: self.endpoint,
            state: self.state,
            inbox: self.inbox,
        };

        (reader, writer)
    }
}

// ============================================================================
// PostMessageWriter
// ============================================================================

/// Write half of a [`PostMessageStream`].
#[derive(Clone)]
pub struct PostMessageWriter {
    bus: MessageBus,
    endpoint: Arc<Endpoint>,
    state: Arc<Mutex<Handshake>>,
}

impl PostMessageWriter {
    /// Writes a message to the peer, holding it back until connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the bus has been closed.
    pub fn write(&self, data: Value) -> Result<()> {
        let mut state = self.state.lock();

        if !state.init {
            trace!(name = %self.endpoint.name, "Write corked until handshake");
            state.corked.push_back(data);
            return Ok(());
        }

        self.endpoint.post(&self.bus, data)
    }

    /// Writes queued before the handshake.
    #[inline]
    #[must_use]
    pub fn corked_len(&self) -> usize {
        self.state.lock().corked.len()
    }
}

// ============================================================================
// PostMessageReader
// ============================================================================

/// Read half of a [`PostMessageStream`].
///
/// Also drives the handshake, so a stream must be read for writes to flow.
pub struct PostMessageReader {
    bus: MessageBus,
    endpoint: Arc<Endpoint>,
    state: Arc<Mutex<Handshake>>,
    inbox: broadcast::Receiver<Envelope>,
}

impl PostMessageReader {
    /// Stream name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.endpoint.name
    }

    /// Reads the next data message addressed to this stream.
    ///
    /// Returns `None` when the bus has closed. Falling behind the bus is
    /// logged and skipped.
    pub async fn read(&mut self) -> Option<Value> {
        loop {
            let envelope = match self.inbox.recv().await {
                Ok(envelope) => envelope,
                Err(RecvError::Closed) => {
                    debug!(name = %self.endpoint.name, "Message bus ended");
                    return None;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(name = %self.endpoint.name, skipped, "Stream lagged behind the message bus");
                    continue;
                }
            };

            if envelope.target != self.endpoint.name {
                continue;
            }

            if let Some(data) = self.on_data(envelope.data) {
                return Some(data);
            }
        }
    }

    /// Applies handshake rules; returns the payload if it is data.
    fn on_data(&self, data: Value) -> Option<Value> {
        let mut state = self.state.lock();

        if state.init {
            return Some(data);
        }

        match data.as_str() {
            Some(SYN) => {
                state.have_syn = true;
                self.post_control(ACK);
            }
            Some(ACK) => {
                state.init = true;
                if !state.have_syn {
                    self.post_control(ACK);
                }
                self.flush(&mut state);
                debug!(name = %self.endpoint.name, "Handshake complete");
            }
            _ => {
                trace!(name = %self.endpoint.name, "Dropping data received before handshake");
            }
        }

        None
    }

    fn post_control(&self, message: &str) {
        if let Err(e) = self.endpoint.post(&self.bus, Value::from(message)) {
            warn!(name = %self.endpoint.name, error = %e, message, "Failed to post control message");
        }
    }

    fn flush(&self, state: &mut Handshake) {
        while let Some(data) = state.corked.pop_front() {
            if let Err(e) = self.endpoint.post(&self.bus, data) {
                warn!(name = %self.endpoint.name, error = %e, "Failed to flush corked write");
                state.corked.clear();
                return;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::time::{Duration, timeout};

    const STEP: Duration = Duration::from_secs(1);

    async fn read(reader: &mut PostMessageReader) -> Value {
        timeout(STEP, reader.read())
            .await
            .expect("read in time")
            .expect("stream open")
    }

    #[tokio::test]
    async fn test_handshake_flushes_corked_writes_in_order() {
        let bus = MessageBus::new();

        let page = PostMessageStream::new(&bus, "page", "content");
        let (mut page_rx, page_tx) = page.split();

        page_tx.write(json!(1)).expect("write");
        page_tx.write(json!(2)).expect("write");
        assert_eq!(page_tx.corked_len(), 2);

        let content = PostMessageStream::new(&bus, "content", "page");
        let (mut content_rx, _content_tx) = content.split();

        // Page sees SYN, answers ACK; content sees ACK and answers ACK.
        let page_task = tokio::spawn(async move {
            let _ = timeout(STEP, page_rx.read()).await;
            page_rx
        });

        assert_eq!(read(&mut content_rx).await, json!(1));
        assert_eq!(read(&mut content_rx).await, json!(2));
        assert_eq!(page_tx.corked_len(), 0);

        let _ = page_task.await;
    }

    #[tokio::test]
    async fn test_streams_ignore_other_targets() {
        let bus = MessageBus::new();

        let a = PostMessageStream::new(&bus, "a", "b");
        let b = PostMessageStream::new(&bus, "b", "a");
        let (mut a_rx, a_tx) = a.split();
        let (mut b_rx, b_tx) = b.split();

        // Drive both handshakes.
        let a_task = tokio::spawn(async move { read(&mut a_rx).await });

        bus.post(Envelope::new("someone-else", json!("noise")))
            .expect("post");
        a_tx.write(json!("hello")).expect("write");

        assert_eq!(read(&mut b_rx).await, json!("hello"));

        b_tx.write(json!("back")).expect("write");
        assert_eq!(a_task.await.expect("join"), json!("back"));
    }

    #[tokio::test]
    async fn test_closed_bus_ends_reader() {
        let bus = MessageBus::new();
        let stream = PostMessageStream::new(&bus, "a", "b");
        let (mut reader, writer) = stream.split();

        bus.close();

        assert!(reader.read().await.is_none());

        // Corked writes are accepted; nothing can flush them.
        assert!(writer.write(json!(1)).is_ok());
    }

    #[tokio::test]
    async fn test_lag_is_skipped_and_reading_continues() {
        let bus = MessageBus::with_capacity(4);
        let stream = PostMessageStream::new(&bus, "a", "b");
        let (mut reader, _writer) = stream.split();

        for i in 0..16 {
            bus.post(Envelope::new("some-other-widget", json!(i)))
                .expect("post");
        }
        bus.post(Envelope::new("a", json!(ACK))).expect("post");

        // Lag, noise and the handshake are consumed; nothing is readable yet.
        assert!(
            timeout(Duration::from_millis(50), reader.read())
                .await
                .is_err()
        );

        bus.post(Envelope::new("a", json!("after"))).expect("post");
        assert_eq!(read(&mut reader).await, json!("after"));
    }

    #[test]
    fn test_names() {
        let bus = MessageBus::new();
        let stream = PostMessageStream::new(&bus, "opn-inpage", "opn-contentscript");
        assert_eq!(stream.name(), "opn-inpage");
        assert_eq!(stream.target(), "opn-contentscript");
        assert!(!stream.is_connected());
    }
}
