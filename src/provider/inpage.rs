//! EIP-1193 provider bound to one multiplexer sub-stream.
//!
//! # Event Loop
//!
//! Construction spawns a tokio task that handles:
//!
//! - Responses from the wallet, correlated to requests by id
//! - Wallet notifications, applied to cached state and rebroadcast
//! - Failing every pending request once the sub-stream ends

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::multiplex::{Substream, SubstreamReceiver, SubstreamSender};

use super::info::{Provider, ProviderInfo};
use super::rpc::{Incoming, JsonRpcNotification, JsonRpcRequest};

// ============================================================================
// Constants
// ============================================================================

/// Suggested bound for calls that do not need the user.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending requests before rejecting new ones.
const MAX_PENDING_REQUESTS: usize = 100;

/// Event fan-out capacity.
const EVENT_CAPACITY: usize = 64;

/// Wallet notification names.
const CHAIN_CHANGED: &str = "metamask_chainChanged";
const ACCOUNTS_CHANGED: &str = "metamask_accountsChanged";
const UNLOCK_STATE_CHANGED: &str = "metamask_unlockStateChanged";

/// Initial state request.
const GET_PROVIDER_STATE: &str = "metamask_getProviderState";

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Value>>>;

/// EIP-1193 events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// First chain id learned.
    Connect {
        /// Hex chain id.
        chain_id: String,
    },
    /// The sub-stream ended.
    Disconnect,
    /// Chain switched.
    ChainChanged(String),
    /// Exposed accounts changed.
    AccountsChanged(Vec<String>),
}

/// Cached wallet state.
#[derive(Debug, Clone, Default)]
struct State {
    chain_id: Option<String>,
    network_version: Option<String>,
    accounts: Vec<String>,
    is_unlocked: bool,
    is_connected: bool,
    /// The sub-stream ended; no request can be answered any more.
    is_closed: bool,
}

// ============================================================================
// InpageProvider
// ============================================================================

/// This wallet's provider object.
///
/// Cloning yields another handle to the same provider.
///
/// # Thread Safety
///
/// `InpageProvider` is `Send + Sync`; requests may be issued from any task.
#[derive(Clone)]
pub struct InpageProvider {
    inner: Arc<Inner>,
}

struct Inner {
    info: ProviderInfo,
    sender: SubstreamSender,
    correlation: Arc<Mutex<CorrelationMap>>,
    state: Arc<RwLock<State>>,
    events: broadcast::Sender<ProviderEvent>,
    is_metamask: AtomicBool,
    is_opn: AtomicBool,
}

impl fmt::Debug for InpageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InpageProvider")
            .field("info", &self.inner.info)
            .field("stream", &self.inner.sender.name())
            .field("is_opn", &self.is_opn())
            .finish_non_exhaustive()
    }
}

impl InpageProvider {
    /// Binds a provider to `substream` and spawns its event loop.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new(substream: Substream, info: ProviderInfo) -> Self {
        let (sender, receiver) = substream.into_split();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let state = Arc::new(RwLock::new(State::default()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        tokio::spawn(Self::run_event_loop(
            receiver,
            Arc::clone(&correlation),
            Arc::clone(&state),
            events.clone(),
        ));

        Self {
            inner: Arc::new(Inner {
                info,
                sender,
                correlation,
                state,
                events,
                is_metamask: AtomicBool::new(true),
                is_opn: AtomicBool::new(false),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    /// EIP-6963 identity.
    #[inline]
    #[must_use]
    pub fn provider_info(&self) -> &ProviderInfo {
        &self.inner.info
    }

    /// Name of the bound sub-stream.
    #[inline]
    #[must_use]
    pub fn stream_name(&self) -> &str {
        self.inner.sender.name()
    }

    /// Sets the "looks like MetaMask" compatibility flag.
    #[inline]
    pub fn set_is_metamask(&self, value: bool) {
        self.inner.is_metamask.store(value, Ordering::Relaxed);
    }

    /// Marks this provider as the OPN wallet's own.
    #[inline]
    pub fn set_is_opn(&self, value: bool) {
        self.inner.is_opn.store(value, Ordering::Relaxed);
    }

    /// Returns `true` if `other` is a handle to this same provider.
    #[inline]
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------------
    // Cached state
    // ------------------------------------------------------------------------

    /// Current chain id, once known.
    #[must_use]
    pub fn chain_id(&self) -> Option<String> {
        self.inner.state.read().chain_id.clone()
    }

    /// Current network version, once known.
    #[must_use]
    pub fn network_version(&self) -> Option<String> {
        self.inner.state.read().network_version.clone()
    }

    /// Exposed accounts.
    #[must_use]
    pub fn accounts(&self) -> Vec<String> {
        self.inner.state.read().accounts.clone()
    }

    /// First exposed account.
    #[must_use]
    pub fn selected_address(&self) -> Option<String> {
        self.inner.state.read().accounts.first().cloned()
    }

    /// Whether the wallet reported itself unlocked.
    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.inner.state.read().is_unlocked
    }

    /// Whether a chain id has been received and the stream is still open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.state.read().is_connected
    }

    /// Subscribes to provider events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.inner.events.subscribe()
    }

    /// Number of requests awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.correlation.lock().len()
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    /// Sends a JSON-RPC request and waits for its response.
    ///
    /// No deadline: wallet confirmations wait on the user.
    ///
    /// # Errors
    ///
    /// - [`Error::Rpc`] if the wallet answered with an error
    /// - [`Error::ConnectionClosed`] if the sub-stream ended, before or
    ///   while waiting
    /// - [`Error::TooManyPending`] if too many requests are in flight
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let (request_id, rx) = self.dispatch(method, params)?;

        match rx.await {
            Ok(result) => result,
            Err(_) => {
                self.inner.correlation.lock().remove(&request_id);
                Err(Error::ConnectionClosed)
            }
        }
    }

    /// Sends a JSON-RPC request and waits at most `request_timeout`.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request), plus [`Error::RequestTimeout`].
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        request_timeout: Duration,
    ) -> Result<Value> {
        let (request_id, rx) = self.dispatch(method, params)?;

        match timeout(request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                // Timeout - clean up correlation entry
                self.inner.correlation.lock().remove(&request_id);

                Err(Error::request_timeout(request_id, request_timeout))
            }
        }
    }

    /// Fetches and applies the wallet's initial state.
    ///
    /// Emits [`ProviderEvent::Connect`] once a chain id is known.
    ///
    /// # Errors
    ///
    /// Returns any error from the `metamask_getProviderState` request.
    pub async fn initialize(&self) -> Result<()> {
        let provider_state = self.request(GET_PROVIDER_STATE, None).await?;

        if let Some(accounts) = provider_state.get("accounts") {
            Self::apply_accounts(&self.inner.state, &self.inner.events, accounts);
        }

        if let Some(unlocked) = provider_state.get("isUnlocked").and_then(Value::as_bool) {
            self.inner.state.write().is_unlocked = unlocked;
        }

        Self::apply_chain(&self.inner.state, &self.inner.events, &provider_state);

        debug!(chain_id = ?self.chain_id(), "Provider state initialized");
        Ok(())
    }

    /// Registers a correlation entry and writes the request.
    fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(RequestId, oneshot::Receiver<Result<Value>>)> {
        let request = JsonRpcRequest::new(method, params);
        let request_id = request.id;
        let (tx, rx) = oneshot::channel();

        // Check pending request limit and store correlation before sending
        {
            let mut correlation = self.inner.correlation.lock();
            if self.inner.state.read().is_closed {
                return Err(Error::ConnectionClosed);
            }
            if correlation.len() >= MAX_PENDING_REQUESTS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_REQUESTS,
                    "Too many pending requests"
                );
                return Err(Error::TooManyPending {
                    pending: correlation.len(),
                    max: MAX_PENDING_REQUESTS,
                });
            }
            correlation.insert(request_id, tx);
        }

        let message = serde_json::to_value(&request)?;

        if let Err(e) = self.inner.sender.send(message) {
            self.inner.correlation.lock().remove(&request_id);
            return Err(e);
        }

        trace!(%request_id, method, "Request sent");
        Ok((request_id, rx))
    }

    // ------------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------------

    /// Reads the sub-stream until it ends.
    async fn run_event_loop(
        mut receiver: SubstreamReceiver,
        correlation: Arc<Mutex<CorrelationMap>>,
        state: Arc<RwLock<State>>,
        events: broadcast::Sender<ProviderEvent>,
    ) {
        while let Some(message) = receiver.recv().await {
            match Incoming::parse(message) {
                Ok(Incoming::Response(response)) => {
                    let tx = correlation.lock().remove(&response.id);

                    if let Some(tx) = tx {
                        let _ = tx.send(response.into_result());
                    } else {
                        warn!(id = %response.id, "Response for unknown request");
                    }
                }

                Ok(Incoming::Notification(notification)) => {
                    Self::handle_notification(&state, &events, notification);
                }

                Err(e) => {
                    warn!(error = %e, stream = receiver.name(), "Unparseable provider message");
                }
            }
        }

        state.write().is_connected = false;
        let _ = events.send(ProviderEvent::Disconnect);

        Self::fail_pending_requests(&correlation, &state);

        debug!("Provider event loop terminated");
    }

    fn handle_notification(
        state: &RwLock<State>,
        events: &broadcast::Sender<ProviderEvent>,
        notification: JsonRpcNotification,
    ) {
        match notification.method.as_str() {
            CHAIN_CHANGED => Self::apply_chain(state, events, &notification.params),

            ACCOUNTS_CHANGED => Self::apply_accounts(state, events, &notification.params),

            UNLOCK_STATE_CHANGED => {
                if let Some(unlocked) = notification.params.get("isUnlocked").and_then(Value::as_bool)
                {
                    state.write().is_unlocked = unlocked;
                }
                if let Some(accounts) = notification.params.get("accounts") {
                    Self::apply_accounts(state, events, accounts);
                }
            }

            other => trace!(method = other, "Ignoring notification"),
        }
    }

    /// Applies `{ chainId, networkVersion }`.
    fn apply_chain(state: &RwLock<State>, events: &broadcast::Sender<ProviderEvent>, params: &Value) {
        let Some(chain_id) = params.get("chainId").and_then(Value::as_str) else {
            return;
        };

        let (first_connect, changed) = {
            let mut state = state.write();
            let first_connect = !state.is_connected;
            let changed = state.chain_id.as_deref() != Some(chain_id);

            state.chain_id = Some(chain_id.to_string());
            state.is_connected = true;
            if let Some(version) = params.get("networkVersion").and_then(Value::as_str) {
                state.network_version = Some(version.to_string());
            }

            (first_connect, changed)
        };

        if first_connect {
            let _ = events.send(ProviderEvent::Connect {
                chain_id: chain_id.to_string(),
            });
        } else if changed {
            let _ = events.send(ProviderEvent::ChainChanged(chain_id.to_string()));
        }
    }

    /// Applies an accounts array.
    fn apply_accounts(
        state: &RwLock<State>,
        events: &broadcast::Sender<ProviderEvent>,
        accounts: &Value,
    ) {
        let Some(list) = accounts.as_array() else {
            warn!("Accounts payload is not an array");
            return;
        };

        let accounts: Vec<String> = list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_lowercase)
            .collect();

        let changed = {
            let mut state = state.write();
            let changed = state.accounts != accounts;
            state.accounts.clone_from(&accounts);
            changed
        };

        if changed {
            let _ = events.send(ProviderEvent::AccountsChanged(accounts));
        }
    }

    /// Closes the provider and fails all pending requests with
    /// ConnectionClosed error.
    fn fail_pending_requests(correlation: &Mutex<CorrelationMap>, state: &RwLock<State>) {
        // Closed under the correlation lock so no request slips in after the drain
        let pending: Vec<_> = {
            let mut correlation = correlation.lock();
            state.write().is_closed = true;
            correlation.drain().collect()
        };
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on disconnect");
        }
    }
}

impl Provider for InpageProvider {
    fn info(&self) -> Option<&ProviderInfo> {
        Some(&self.inner.info)
    }

    fn is_metamask(&self) -> bool {
        self.inner.is_metamask.load(Ordering::Relaxed)
    }

    fn is_opn(&self) -> bool {
        self.inner.is_opn.load(Ordering::Relaxed)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio::time::timeout;

    use crate::multiplex::{ObjectMultiplex, Routed};

    const STEP: Duration = Duration::from_secs(2);

    /// A provider plus the multiplexer side that plays the wallet.
    struct Harness {
        provider: InpageProvider,
        mux: ObjectMultiplex,
        wallet_rx: tokio::sync::mpsc::UnboundedReceiver<crate::multiplex::Frame>,
    }

    impl Harness {
        fn new() -> Self {
            let mux = ObjectMultiplex::new();
            let substream = mux.create_stream("opn-provider").expect("substream");
            let wallet_rx = mux.take_outbound().expect("outbound");
            let info = ProviderInfo::new("OPN Wallet", "data:,", "io.iopn.wallet");

            Self {
                provider: InpageProvider::new(substream, info),
                mux,
                wallet_rx,
            }
        }

        /// Next request the provider wrote.
        async fn next_request(&mut self) -> Value {
            let frame = timeout(STEP, self.wallet_rx.recv())
                .await
                .expect("in time")
                .expect("frame");
            assert_eq!(frame.name, "opn-provider");
            frame.data
        }

        /// Delivers a wallet message to the provider.
        fn deliver(&self, data: Value) {
            let routed = self.mux.dispatch(json!({"name": "opn-provider", "data": data}));
            assert_eq!(routed, Routed::Delivered);
        }
    }

    #[tokio::test]
    async fn test_request_response_correlation() {
        let mut harness = Harness::new();
        let provider = harness.provider.clone();

        let call = tokio::spawn(async move { provider.request("eth_chainId", None).await });

        let request = harness.next_request().await;
        assert_eq!(request["method"], "eth_chainId");
        assert_eq!(harness.provider.pending_count(), 1);

        harness.deliver(json!({"jsonrpc": "2.0", "id": request["id"], "result": "0x3d9"}));

        let result = timeout(STEP, call).await.expect("in time").expect("join");
        assert_eq!(result.expect("ok"), json!("0x3d9"));
        assert_eq!(harness.provider.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_error_response_maps_to_rpc_error() {
        let mut harness = Harness::new();
        let provider = harness.provider.clone();

        let call =
            tokio::spawn(async move { provider.request("eth_requestAccounts", None).await });

        let request = harness.next_request().await;
        harness.deliver(json!({
            "id": request["id"],
            "error": {"code": 4001, "message": "User rejected the request."}
        }));

        let result = timeout(STEP, call).await.expect("in time").expect("join");
        assert!(matches!(result, Err(Error::Rpc { code: 4001, .. })));
    }

    #[tokio::test]
    async fn test_request_timeout_cleans_up() {
        let harness = Harness::new();

        let result = harness
            .provider
            .request_with_timeout("eth_blockNumber", None, Duration::from_millis(20))
            .await;

        assert!(matches!(result, Err(Error::RequestTimeout { .. })));
        assert_eq!(harness.provider.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_initialize_applies_state_and_connects() {
        let mut harness = Harness::new();
        let mut events = harness.provider.subscribe();
        let provider = harness.provider.clone();

        let init = tokio::spawn(async move { provider.initialize().await });

        let request = harness.next_request().await;
        assert_eq!(request["method"], "metamask_getProviderState");
        harness.deliver(json!({
            "id": request["id"],
            "result": {
                "accounts": ["0xABC"],
                "chainId": "0x3d9",
                "isUnlocked": true,
                "networkVersion": "985"
            }
        }));

        timeout(STEP, init).await.expect("in time").expect("join").expect("ok");

        assert_eq!(harness.provider.chain_id().as_deref(), Some("0x3d9"));
        assert_eq!(harness.provider.network_version().as_deref(), Some("985"));
        assert_eq!(harness.provider.selected_address().as_deref(), Some("0xabc"));
        assert!(harness.provider.is_unlocked());
        assert!(harness.provider.is_connected());

        assert_eq!(
            events.recv().await.expect("event"),
            ProviderEvent::AccountsChanged(vec!["0xabc".into()])
        );
        assert_eq!(
            events.recv().await.expect("event"),
            ProviderEvent::Connect {
                chain_id: "0x3d9".into()
            }
        );
    }

    #[tokio::test]
    async fn test_notifications_update_state() {
        let harness = Harness::new();
        let mut events = harness.provider.subscribe();

        harness.deliver(json!({
            "method": "metamask_chainChanged",
            "params": {"chainId": "0x1", "networkVersion": "1"}
        }));
        harness.deliver(json!({
            "method": "metamask_chainChanged",
            "params": {"chainId": "0x3d9", "networkVersion": "985"}
        }));
        harness.deliver(json!({
            "method": "metamask_accountsChanged",
            "params": ["0x1111"]
        }));

        assert_eq!(
            events.recv().await.expect("event"),
            ProviderEvent::Connect {
                chain_id: "0x1".into()
            }
        );
        assert_eq!(
            events.recv().await.expect("event"),
            ProviderEvent::ChainChanged("0x3d9".into())
        );
        assert_eq!(
            events.recv().await.expect("event"),
            ProviderEvent::AccountsChanged(vec!["0x1111".into()])
        );
        assert_eq!(harness.provider.accounts(), vec!["0x1111".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_end_fails_pending_and_disconnects() {
        let mut harness = Harness::new();
        let mut events = harness.provider.subscribe();
        let provider = harness.provider.clone();

        let call = tokio::spawn(async move { provider.request("eth_accounts", None).await });
        let _ = harness.next_request().await;
        assert_eq!(harness.provider.pending_count(), 1);

        harness.mux.end_streams();

        let result = timeout(STEP, call).await.expect("in time").expect("join");
        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert_eq!(harness.provider.pending_count(), 0);
        assert!(!harness.provider.is_connected());
        assert_eq!(
            timeout(STEP, events.recv()).await.expect("in time").expect("event"),
            ProviderEvent::Disconnect
        );

        let late = harness.provider.request("eth_chainId", None).await;
        assert!(matches!(late, Err(Error::ConnectionClosed)));
        assert_eq!(harness.provider.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_limit() {
        let harness = Harness::new();

        for _ in 0..MAX_PENDING_REQUESTS {
            let _ = harness.provider.dispatch("eth_blockNumber", None).expect("dispatch");
        }

        let err = harness.provider.dispatch("eth_blockNumber", None).unwrap_err();
        assert!(matches!(err, Error::TooManyPending { max: 100, .. }));
    }

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_REQUEST_TIMEOUT.as_secs(), 30);
        assert_eq!(MAX_PENDING_REQUESTS, 100);
    }

    #[tokio::test]
    async fn test_flags() {
        let harness = Harness::new();
        let provider = &harness.provider;

        assert!(provider.is_metamask());
        assert!(!provider.is_opn());

        provider.set_is_opn(true);
        provider.set_is_metamask(false);

        assert!(provider.is_opn());
        assert!(!provider.is_metamask());
        assert_eq!(provider.stream_name(), "opn-provider");
    }
}
