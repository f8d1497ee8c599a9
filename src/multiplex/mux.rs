//! Multiplexer routing table.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

use super::frame::Frame;
use super::substream::Substream;

// ============================================================================
// Types
// ============================================================================

/// Where frames for a name go.
enum Route {
    /// Deliver to a live sub-stream.
    Stream(mpsc::UnboundedSender<Value>),
    /// Drop silently.
    Ignored,
    /// The transport stopped; the sub-stream's receiver has ended.
    Ended,
}

/// Outcome of routing one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Delivered to a sub-stream.
    Delivered,
    /// Name is ignored on purpose.
    Ignored,
    /// No sub-stream by that name, its receiver is gone, or the transport
    /// stopped.
    Orphaned,
    /// Not a frame.
    Malformed,
}

// ============================================================================
// ObjectMultiplex
// ============================================================================

/// Routes frames between one transport and many named sub-streams.
///
/// Cloning yields another handle to the same routing table.
///
/// # Example
///
/// ```ignore
/// let mux = ObjectMultiplex::new();
/// let provider = mux.create_stream("opn-provider")?;
/// mux.ignore_stream("opn-multichain-provider")?;
/// pipeline(transport, &mux, |err| warn!(?err, "lost"));
/// ```
#[derive(Clone)]
pub struct ObjectMultiplex {
    inner: Arc<Inner>,
}

struct Inner {
    routes: RwLock<FxHashMap<Arc<str>, Route>>,
    outbound_tx: mpsc::UnboundedSender<Frame>,
    /// Taken once by the pipeline that pumps this multiplexer.
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Frame>>>,
}

impl fmt::Debug for ObjectMultiplex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes = self.inner.routes.read();
        let mut names: Vec<&str> = routes.keys().map(|name| &**name).collect();
        names.sort_unstable();

        f.debug_struct("ObjectMultiplex")
            .field("routes", &names)
            .field("piped", &self.inner.outbound_rx.lock().is_none())
            .finish()
    }
}

impl Default for ObjectMultiplex {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectMultiplex {
    /// Creates an empty multiplexer.
    #[must_use]
    pub fn new() -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(Inner {
                routes: RwLock::new(FxHashMap::default()),
                outbound_tx,
                outbound_rx: Mutex::new(Some(outbound_rx)),
            }),
        }
    }

    /// Creates the sub-stream `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubstreamExists`] if `name` is already a sub-stream
    /// or ignored.
    pub fn create_stream(&self, name: &str) -> Result<Substream> {
        let mut routes = self.inner.routes.write();

        if routes.contains_key(name) {
            return Err(Error::substream_exists(name));
        }

        let name: Arc<str> = Arc::from(name);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        routes.insert(Arc::clone(&name), Route::Stream(inbound_tx));

        debug!(name = %name, "Substream created");

        Ok(Substream::new(
            name,
            self.inner.outbound_tx.clone(),
            inbound_rx,
        ))
    }

    /// Silently drops every frame addressed to `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubstreamExists`] if `name` is already registered.
    pub fn ignore_stream(&self, name: &str) -> Result<()> {
        let mut routes = self.inner.routes.write();

        if routes.contains_key(name) {
            return Err(Error::substream_exists(name));
        }

        routes.insert(Arc::from(name), Route::Ignored);
        debug!(name, "Substream ignored");
        Ok(())
    }

    /// Returns `true` if `name` is a live or ignored sub-stream.
    #[inline]
    #[must_use]
    pub fn has_stream(&self, name: &str) -> bool {
        self.inner.routes.read().contains_key(name)
    }

    /// Routes one inbound transport message to its sub-stream.
    pub fn dispatch(&self, message: Value) -> Routed {
        let frame = match Frame::decode(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "ObjectMultiplex - malformed chunk");
                return Routed::Malformed;
            }
        };

        let routes = self.inner.routes.read();

        match routes.get(frame.name.as_str()) {
            Some(Route::Stream(tx)) => {
                if tx.send(frame.data).is_err() {
                    warn!(name = %frame.name, "ObjectMultiplex - substream receiver dropped");
                    return Routed::Orphaned;
                }
                trace!(name = %frame.name, "Frame delivered");
                Routed::Delivered
            }
            Some(Route::Ignored) => Routed::Ignored,
            Some(Route::Ended) => {
                trace!(name = %frame.name, "Frame for ended substream dropped");
                Routed::Orphaned
            }
            None => {
                warn!(
                    name = %frame.name,
                    "ObjectMultiplex - orphaned data for stream \"{}\"",
                    frame.name
                );
                Routed::Orphaned
            }
        }
    }

    /// Ends every live sub-stream's inbound side.
    ///
    /// Receivers drain what was already delivered and then yield `None`.
    /// Names stay registered, and sub-stream senders are left alone.
    pub(crate) fn end_streams(&self) {
        let mut routes = self.inner.routes.write();
        let mut ended = 0usize;

        for route in routes.values_mut() {
            if matches!(route, Route::Stream(_)) {
                *route = Route::Ended;
                ended += 1;
            }
        }

        debug!(ended, "Substreams ended");
    }

    /// Hands out the outbound frame queue. Only the first call succeeds.
    pub(crate) fn take_outbound(&self) -> Option<mpsc::UnboundedReceiver<Frame>> {
        self.inner.outbound_rx.lock().take()
    }
}

// ============================================================================
// Tests
// ============================================================================
