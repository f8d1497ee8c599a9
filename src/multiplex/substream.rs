//! Named logical channel of an [`ObjectMultiplex`](super::ObjectMultiplex).

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

use super::frame::Frame;

// ============================================================================
// Substream
// ============================================================================

/// A named channel carried over the shared transport.
///
/// Obtained from [`ObjectMultiplex::create_stream`](super::ObjectMultiplex::create_stream).
pub struct Substream {
    sender: SubstreamSender,
    receiver: SubstreamReceiver,
}

impl Substream {
    pub(crate) fn new(
        name: Arc<str>,
        outbound: mpsc::UnboundedSender<Frame>,
        inbound: mpsc::UnboundedReceiver<Value>,
    ) -> Self {
        Self {
            sender: SubstreamSender {
                name: Arc::clone(&name),
                outbound,
            },
            receiver: SubstreamReceiver { name, inbound },
        }
    }

    /// Sub-stream name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.sender.name
    }

    /// Sends a message to the peer's sub-stream of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the multiplexer is gone.
    #[inline]
    pub fn send(&self, data: Value) -> Result<()> {
        self.sender.send(data)
    }

    /// Receives the next message for this sub-stream.
    #[inline]
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }

    /// Splits into independently owned halves.
    #[inline]
    #[must_use]
    pub fn into_split(self) -> (SubstreamSender, SubstreamReceiver) {
        (self.sender, self.receiver)
    }
}

// ============================================================================
// SubstreamSender
// ============================================================================

/// Write half of a [`Substream`]. Cheap to clone.
#[derive(Clone)]
pub struct SubstreamSender {
    name: Arc<str>,
    outbound: mpsc::UnboundedSender<Frame>,
}

impl SubstreamSender {
    /// Sub-stream name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends a message, tagged with this sub-stream's name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the multiplexer is gone.
    pub fn send(&self, data: Value) -> Result<()> {
        self.outbound
            .send(Frame::new(self.name.as_ref(), data))
            .map_err(|_| Error::ConnectionClosed)
    }
}

// ============================================================================
// SubstreamReceiver
// ============================================================================

/// Read half of a [`Substream`].
pub struct SubstreamReceiver {
    name: Arc<str>,
    inbound: mpsc::UnboundedReceiver<Value>,
}

impl SubstreamReceiver {
    /// Sub-stream name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receives the next message, or `None` once the sub-stream is ended.
    #[inline]
    pub async fn recv(&mut self) -> Option<Value> {
        self.inbound.recv().await
    }
}

impl Stream for SubstreamReceiver {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Value>> {
        self.inbound.poll_recv(cx)
    }
}
