//! CAIP-25 multichain session client.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::Result;

use super::transport::Transport;

// ============================================================================
// Constants
// ============================================================================

const WALLET_CREATE_SESSION: &str = "wallet_createSession";
const WALLET_GET_SESSION: &str = "wallet_getSession";
const WALLET_REVOKE_SESSION: &str = "wallet_revokeSession";
const WALLET_INVOKE_METHOD: &str = "wallet_invokeMethod";

// ============================================================================
// Types
// ============================================================================

/// Permissions requested or granted for one CAIP-2 chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Callable methods.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Subscribable notifications.
    #[serde(default)]
    pub notifications: Vec<String>,

    /// CAIP-10 account ids (`namespace:reference:address`).
    #[serde(default)]
    pub accounts: Vec<String>,
}

impl Scope {
    /// Addresses of this scope's accounts, without the chain prefix.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.accounts
            .iter()
            .filter_map(|account| account.rsplit_once(':').map(|(_, address)| address))
    }
}

/// Scopes keyed by CAIP-2 chain id.
pub type Scopes = FxHashMap<String, Scope>;

/// An authorized session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// Granted scopes.
    #[serde(default)]
    pub session_scopes: Scopes,
}

// ============================================================================
// MultichainClient
// ============================================================================

/// Client for the wallet's CAIP-25 session API.
///
/// Cloning yields another handle on the same transport.
#[derive(Debug, Clone)]
pub struct MultichainClient {
    transport: Arc<dyn Transport>,
}

impl MultichainClient {
    /// Creates a client on `transport`.
    #[inline]
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Requests a session over `scopes` (`wallet_createSession`).
    ///
    /// # Errors
    ///
    /// Returns the wallet's error, or a transport error.
    pub async fn create_session(&self, scopes: Scopes) -> Result<SessionData> {
        let result = self
            .call(WALLET_CREATE_SESSION, json!({ "optionalScopes": scopes }))
            .await?;

        let session: SessionData = serde_json::from_value(result)?;
        debug!(scopes = session.session_scopes.len(), "Session created");
        Ok(session)
    }

    /// Current session, if any (`wallet_getSession`).
    ///
    /// # Errors
    ///
    /// Returns the wallet's error, or a transport error.
    pub async fn get_session(&self) -> Result<Option<SessionData>> {
        let result = self.call(WALLET_GET_SESSION, json!({})).await?;

        if result.is_null() {
            return Ok(None);
        }

        let session: SessionData = serde_json::from_value(result)?;
        if session.session_scopes.is_empty() {
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Ends the session (`wallet_revokeSession`).
    ///
    /// # Errors
    ///
    /// Returns the wallet's error, or a transport error.
    pub async fn revoke_session(&self) -> Result<()> {
        self.call(WALLET_REVOKE_SESSION, json!({})).await?;
        debug!("Session revoked");
        Ok(())
    }

    /// Runs `request` (`{ method, params }`) on the chain `scope`
    /// (`wallet_invokeMethod`).
    ///
    /// # Errors
    ///
    /// Returns the wallet's error, or a transport error.
    pub async fn invoke_method(&self, scope: &str, request: Value) -> Result<Value> {
        self.call(WALLET_INVOKE_METHOD, json!({ "scope": scope, "request": request }))
            .await
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.transport.connect().await?;
        self.transport.request(method, Some(params)).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::time::timeout;

    use crate::error::Error;
    use crate::multichain::DefaultTransport;
    use crate::multichain::transport::tests::spawn_wallet;
    use crate::transport::MessageBus;

    const STEP: Duration = Duration::from_secs(2);
    const MAINNET: &str = "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp";

    fn client(bus: &MessageBus) -> MultichainClient {
        MultichainClient::new(Arc::new(DefaultTransport::new(bus)))
    }

    #[test]
    fn test_scope_addresses() {
        let scope = Scope {
            accounts: vec![format!("{MAINNET}:AbC123"), "malformed".into()],
            ..Scope::default()
        };
        assert_eq!(scope.addresses().collect::<Vec<_>>(), vec!["AbC123"]);
    }

    #[tokio::test]
    async fn test_create_session_sends_optional_scopes() {
        let bus = MessageBus::new();
        let _wallet = spawn_wallet(&bus, |method, params| {
            assert_eq!(method, "wallet_createSession");
            let requested = params["optionalScopes"].clone();
            Ok(json!({ "sessionScopes": requested }))
        });

        let mut scopes = Scopes::default();
        scopes.insert(MAINNET.into(), Scope::default());

        let session = timeout(STEP, client(&bus).create_session(scopes))
            .await
            .expect("in time")
            .expect("session");
        assert!(session.session_scopes.contains_key(MAINNET));
    }

    #[tokio::test]
    async fn test_get_session_empty_is_none() {
        let bus = MessageBus::new();
        let _wallet = spawn_wallet(&bus, |_, _| Ok(json!({ "sessionScopes": {} })));

        let session = timeout(STEP, client(&bus).get_session())
            .await
            .expect("in time")
            .expect("ok");
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_invoke_method_wraps_request() {
        let bus = MessageBus::new();
        let _wallet = spawn_wallet(&bus, |method, params| {
            assert_eq!(method, "wallet_invokeMethod");
            Ok(json!({ "scope": params["scope"], "inner": params["request"]["method"] }))
        });

        let result = timeout(
            STEP,
            client(&bus).invoke_method(MAINNET, json!({ "method": "getGenesisHash" })),
        )
        .await
        .expect("in time")
        .expect("ok");

        assert_eq!(result, json!({ "scope": MAINNET, "inner": "getGenesisHash" }));
    }

    #[tokio::test]
    async fn test_revoke_error_propagates() {
        let bus = MessageBus::new();
        let _wallet = spawn_wallet(&bus, |_, _| Err((4100, "Unauthorized".into())));

        let err = timeout(STEP, client(&bus).revoke_session())
            .await
            .expect("in time")
            .unwrap_err();
        assert!(matches!(err, Error::Rpc { code: 4100, .. }));
    }
}
