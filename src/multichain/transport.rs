//! Multichain transport over the page message bus.
//!
//! Requests bypass the page's [`PostMessageStream`](crate::transport::PostMessageStream):
//! they are posted straight to the content script, wrapped in a multiplexer
//! frame, and answers are picked out of everything addressed to the inpage
//! context by frame name.
//!
//! ```text
//!   page ──► { target: "opn-contentscript",
//!              data: { name: "opn-multichain-provider", data: <request> } }
//!
//!   page ◄── { target: "opn-inpage",
//!              data: { name: "opn-multichain-provider", data: <response> } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::constants::{CONTENT_SCRIPT, METAMASK_CAIP_MULTICHAIN_PROVIDER, METAMASK_INPAGE};
use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::multiplex::Frame;
use crate::provider::{Incoming, JsonRpcNotification, JsonRpcRequest};
use crate::transport::{Envelope, MessageBus};

// ============================================================================
// Constants
// ============================================================================

/// Notification fan-out capacity.
const NOTIFICATION_CAPACITY: usize = 64;

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Value>>>;

// ============================================================================
// Transport
// ============================================================================

/// Request/response channel used by the multichain client.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Starts listening for responses. Idempotent.
    async fn connect(&self) -> Result<()>;

    /// Sends a JSON-RPC request and waits for its result.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value>;

    /// Returns `true` once [`connect`](Self::connect) has succeeded.
    fn is_connected(&self) -> bool;
}

// ============================================================================
// DefaultTransport
// ============================================================================

/// [`Transport`] posting to the content script over a [`MessageBus`].
pub struct DefaultTransport {
    bus: MessageBus,
    correlation: Arc<Mutex<CorrelationMap>>,
    notifications: broadcast::Sender<JsonRpcNotification>,
    connected: AtomicBool,
    request_timeout: Option<Duration>,
}

impl fmt::Debug for DefaultTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultTransport")
            .field("connected", &self.is_connected())
            .field("pending", &self.correlation.lock().len())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl DefaultTransport {
    /// Creates a transport on `bus`. Nothing is posted until a request.
    #[must_use]
    pub fn new(bus: &MessageBus) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            bus: bus.clone(),
            correlation: Arc::new(Mutex::new(CorrelationMap::default())),
            notifications,
            connected: AtomicBool::new(false),
            request_timeout: None,
        }
    }

    /// Bounds every request by `request_timeout`.
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = Some(request_timeout);
        self
    }

    /// Subscribes to wallet notifications (`wallet_notify`, session changes).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JsonRpcNotification> {
        self.notifications.subscribe()
    }

    /// Number of requests awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Listens on the bus until it closes.
    async fn run_listener(
        mut inbox: broadcast::Receiver<Envelope>,
        correlation: Arc<Mutex<CorrelationMap>>,
        notifications: broadcast::Sender<JsonRpcNotification>,
    ) {
        loop {
            let envelope = match inbox.recv().await {
                Ok(envelope) => envelope,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Multichain listener lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let Some(payload) = Self::unwrap_envelope(envelope) else {
                continue;
            };

            match Incoming::parse(payload) {
                Ok(Incoming::Response(response)) => {
                    let tx = correlation.lock().remove(&response.id);

                    if let Some(tx) = tx {
                        let _ = tx.send(response.into_result());
                    } else {
                        trace!(id = %response.id, "Response for unknown multichain request");
                    }
                }

                Ok(Incoming::Notification(notification)) => {
                    trace!(method = %notification.method, "Multichain notification");
                    let _ = notifications.send(notification);
                }

                Err(e) => warn!(error = %e, "Unparseable multichain message"),
            }
        }

        let pending: Vec<_> = correlation.lock().drain().collect();
        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        debug!("Multichain listener terminated");
    }

    /// Returns the inner payload of a multichain frame addressed to us.
    fn unwrap_envelope(envelope: Envelope) -> Option<Value> {
        if envelope.target != METAMASK_INPAGE {
            return None;
        }

        match Frame::decode(envelope.data) {
            Ok(frame) if frame.name == METAMASK_CAIP_MULTICHAIN_PROVIDER => Some(frame.data),
            _ => None,
        }
    }

    fn post(&self, request: &JsonRpcRequest) -> Result<()> {
        let frame = Frame::new(METAMASK_CAIP_MULTICHAIN_PROVIDER, serde_json::to_value(request)?);
        self.bus.post(Envelope::new(CONTENT_SCRIPT, frame.encode()))
    }
}

#[async_trait]
impl Transport for DefaultTransport {
    async fn connect(&self) -> Result<()> {
        if self.connected.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if self.bus.is_closed() {
            self.connected.store(false, Ordering::Release);
            return Err(Error::ConnectionClosed);
        }

        tokio::spawn(Self::run_listener(
            self.bus.subscribe(),
            Arc::clone(&self.correlation),
            self.notifications.clone(),
        ));

        debug!("Multichain transport connected");
        Ok(())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.connect().await?;

        let request = JsonRpcRequest::new(method, params);
        let request_id = request.id;
        let (tx, rx) = oneshot::channel();

        self.correlation.lock().insert(request_id, tx);

        if let Err(e) = self.post(&request) {
            self.correlation.lock().remove(&request_id);
            return Err(e);
        }

        trace!(%request_id, method, "Multichain request sent");

        let outcome = match self.request_timeout {
            Some(limit) => match timeout(limit, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.correlation.lock().remove(&request_id);
                    return Err(Error::request_timeout(request_id, limit));
                }
            },
            None => rx.await,
        };

        match outcome {
            Ok(result) => result,
            Err(_) => {
                self.correlation.lock().remove(&request_id);
                Err(Error::ConnectionClosed)
            }
        }
    }

    #[inline]
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

// ============================================================================
// Tests
// ============================================================================
