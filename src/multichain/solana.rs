//! Solana wallet-standard adapter backed by the multichain client.
//!
//! # Wire Format
//!
//! Methods run through `wallet_invokeMethod` on a Solana CAIP-2 scope.
//! Message and transaction bytes travel base64-encoded:
//!
//! ```json
//! { "method": "signMessage",
//!   "params": { "account": { "address": "..." }, "message": "aGVsbG8=" } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::window::{Window, WindowEvent};

use super::client::{MultichainClient, Scope, Scopes, SessionData};
use super::wallet_standard::{Registration, Wallet};

// ============================================================================
// Constants
// ============================================================================

/// Solana mainnet.
pub const SOLANA_MAINNET: &str = "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp";

/// Solana devnet.
pub const SOLANA_DEVNET: &str = "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1";

/// Solana testnet.
pub const SOLANA_TESTNET: &str = "solana:4uhcVJyU9pJkvQyS88uRDiswHXSCkY3z";

/// Chains the adapter can serve.
pub const SOLANA_CHAINS: [&str; 3] = [SOLANA_MAINNET, SOLANA_DEVNET, SOLANA_TESTNET];

/// Advertised wallet-standard features.
pub const SOLANA_FEATURES: [&str; 7] = [
    "standard:connect",
    "standard:disconnect",
    "standard:events",
    "solana:signMessage",
    "solana:signTransaction",
    "solana:signAndSendTransaction",
    "solana:signIn",
];

/// EIP-1193 "unauthorized".
const UNAUTHORIZED: i64 = 4100;

const EVENT_CAPACITY: usize = 16;

// ============================================================================
// Types
// ============================================================================

/// A connected Solana account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolanaAccount {
    /// Base58 address.
    pub address: String,

    /// Chains the account is authorized on.
    pub chains: Vec<String>,
}

/// Result of `solana:signMessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    /// The bytes that were signed.
    pub signed_message: Vec<u8>,

    /// Signature, as returned by the wallet.
    pub signature: String,
}

/// `solana:signIn` input (Sign In With Solana).
///
/// Unset fields are left for the wallet to fill in. Without `address` the
/// first connected account signs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInInput {
    /// Requesting domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Account that should sign.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Human-readable statement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,

    /// Replay-protection nonce.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// ISO 8601 issue time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
}

/// Result of `solana:signIn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOutput {
    /// Account that signed.
    pub account: SolanaAccount,

    /// The sign-in message bytes.
    pub signed_message: Vec<u8>,

    /// Signature, as returned by the wallet.
    pub signature: String,
}

/// `standard:events` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// The connected accounts changed.
    Change {
        /// New account list.
        accounts: Vec<SolanaAccount>,
    },
}

// ============================================================================
// SolanaWallet
// ============================================================================

/// Solana wallet adapter.
#[derive(Debug)]
pub struct SolanaWallet {
    name: String,
    icon: String,
    client: MultichainClient,
    accounts: RwLock<Vec<SolanaAccount>>,
    events: broadcast::Sender<WalletEvent>,
}

impl SolanaWallet {
    /// Creates a disconnected adapter.
    #[must_use]
    pub fn new(client: MultichainClient, name: impl Into<String>, icon: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            name: name.into(),
            icon: icon.into(),
            client,
            accounts: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Connected accounts.
    #[must_use]
    pub fn accounts(&self) -> Vec<SolanaAccount> {
        self.accounts.read().clone()
    }

    /// Subscribes to `standard:events`.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    /// `standard:connect`.
    ///
    /// Reuses an existing session that grants Solana accounts, otherwise
    /// requests a new one over every Solana chain.
    ///
    /// # Errors
    ///
    /// Returns the wallet's error, or a transport error.
    pub async fn connect(&self) -> Result<Vec<SolanaAccount>> {
        let session = match self.client.get_session().await? {
            Some(session) if !Self::collect_accounts(&session).is_empty() => session,
            _ => self.client.create_session(Self::requested_scopes()).await?,
        };

        let accounts = Self::collect_accounts(&session);
        info!(count = accounts.len(), "Solana wallet connected");
        self.update_accounts(accounts.clone());
        Ok(accounts)
    }

    /// `standard:disconnect`.
    ///
    /// # Errors
    ///
    /// Returns the wallet's error, or a transport error.
    pub async fn disconnect(&self) -> Result<()> {
        self.client.revoke_session().await?;
        self.update_accounts(Vec::new());
        debug!("Solana wallet disconnected");
        Ok(())
    }

    /// `solana:signMessage`.
    ///
    /// # Errors
    ///
    /// - [`Error::Rpc`] with code 4100 if `address` is not connected
    /// - [`Error::Protocol`] if the wallet's answer is malformed
    pub async fn sign_message(&self, address: &str, message: &[u8]) -> Result<SignedMessage> {
        let scope = self.scope_for(address, None)?;
        let result = self
            .client
            .invoke_method(
                &scope,
                json!({
                    "method": "signMessage",
                    "params": {
                        "account": { "address": address },
                        "message": Base64Standard.encode(message),
                    }
                }),
            )
            .await?;

        Ok(SignedMessage {
            signed_message: decode_field(&result, "signedMessage")?,
            signature: string_field(&result, "signature")?,
        })
    }

    /// `solana:signTransaction`. Returns the signed transaction bytes.
    ///
    /// # Errors
    ///
    /// As [`sign_message`](Self::sign_message).
    pub async fn sign_transaction(
        &self,
        address: &str,
        transaction: &[u8],
        chain: Option<&str>,
    ) -> Result<Vec<u8>> {
        let scope = self.scope_for(address, chain)?;
        let result = self
            .client
            .invoke_method(
                &scope,
                json!({
                    "method": "signTransaction",
                    "params": {
                        "account": { "address": address },
                        "transaction": Base64Standard.encode(transaction),
                        "scope": scope,
                    }
                }),
            )
            .await?;

        decode_field(&result, "signedTransaction")
    }

    /// `solana:signAndSendTransaction`. Returns the transaction signature.
    ///
    /// # Errors
    ///
    /// As [`sign_message`](Self::sign_message).
    pub async fn sign_and_send_transaction(
        &self,
        address: &str,
        transaction: &[u8],
        chain: Option<&str>,
    ) -> Result<String> {
        let scope = self.scope_for(address, chain)?;
        let result = self
            .client
            .invoke_method(
                &scope,
                json!({
                    "method": "signAndSendTransaction",
                    "params": {
                        "account": { "address": address },
                        "transaction": Base64Standard.encode(transaction),
                        "scope": scope,
                    }
                }),
            )
            .await?;

        string_field(&result, "signature")
    }

    /// `solana:signIn`. Connects first if no account is connected yet.
    ///
    /// # Errors
    ///
    /// - [`Error::Rpc`] with code 4100 if the signing account is not
    ///   connected
    /// - [`Error::Protocol`] if the wallet's answer is malformed
    pub async fn sign_in(&self, mut input: SignInInput) -> Result<SignInOutput> {
        let connected = !self.accounts.read().is_empty();
        if !connected {
            self.connect().await?;
        }

        let address = match input.address.clone() {
            Some(address) => address,
            None => self
                .accounts
                .read()
                .first()
                .map(|account| account.address.clone())
                .ok_or_else(|| Error::rpc(UNAUTHORIZED, "No connected account to sign in with"))?,
        };
        let scope = self.scope_for(&address, None)?;
        input.address = Some(address.clone());

        let result = self
            .client
            .invoke_method(
                &scope,
                json!({
                    "method": "signIn",
                    "params": serde_json::to_value(&input)?,
                }),
            )
            .await?;

        let account = self
            .accounts
            .read()
            .iter()
            .find(|a| a.address == address)
            .cloned()
            .unwrap_or_else(|| SolanaAccount {
                address,
                chains: vec![scope],
            });

        debug!(address = %account.address, "Solana sign-in complete");

        Ok(SignInOutput {
            account,
            signed_message: decode_field(&result, "signedMessage")?,
            signature: string_field(&result, "signature")?,
        })
    }

    fn requested_scopes() -> Scopes {
        SOLANA_CHAINS
            .iter()
            .map(|chain| ((*chain).to_string(), Scope::default()))
            .collect()
    }

    /// Flattens the session's Solana accounts, merging chains per address.
    fn collect_accounts(session: &SessionData) -> Vec<SolanaAccount> {
        let mut accounts: Vec<SolanaAccount> = Vec::new();

        for chain in SOLANA_CHAINS {
            let Some(scope) = session.session_scopes.get(chain) else {
                continue;
            };

            for address in scope.addresses() {
                match accounts.iter_mut().find(|a| a.address == address) {
                    Some(account) => account.chains.push(chain.to_string()),
                    None => accounts.push(SolanaAccount {
                        address: address.to_string(),
                        chains: vec![chain.to_string()],
                    }),
                }
            }
        }

        accounts
    }

    /// Picks the scope for `address`: `chain` if authorized, else its first.
    fn scope_for(&self, address: &str, chain: Option<&str>) -> Result<String> {
        let accounts = self.accounts.read();

        let Some(account) = accounts.iter().find(|a| a.address == address) else {
            return Err(Error::rpc(
                UNAUTHORIZED,
                format!("Account {address} is not connected"),
            ));
        };

        match chain {
            Some(chain) if account.chains.iter().any(|c| c == chain) => Ok(chain.to_string()),
            Some(chain) => Err(Error::rpc(
                UNAUTHORIZED,
                format!("Account {address} is not authorized on {chain}"),
            )),
            None => account
                .chains
                .first()
                .cloned()
                .ok_or_else(|| Error::rpc(UNAUTHORIZED, "Account has no authorized chain")),
        }
    }

    fn update_accounts(&self, accounts: Vec<SolanaAccount>) {
        let changed = {
            let mut current = self.accounts.write();
            let changed = *current != accounts;
            current.clone_from(&accounts);
            changed
        };

        if changed {
            let _ = self.events.send(WalletEvent::Change { accounts });
        }
    }
}

impl Wallet for SolanaWallet {
    fn name(&self) -> &str {
        &self.name
    }

    fn icon(&self) -> &str {
        &self.icon
    }

    fn chains(&self) -> &[&'static str] {
        &SOLANA_CHAINS
    }

    fn features(&self) -> &[&'static str] {
        &SOLANA_FEATURES
    }
}

fn string_field(result: &Value, field: &str) -> Result<String> {
    result
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::protocol(format!("missing `{field}` in wallet response")))
}

fn decode_field(result: &Value, field: &str) -> Result<Vec<u8>> {
    let encoded = string_field(result, field)?;
    Base64Standard
        .decode(&encoded)
        .map_err(|e| Error::protocol(format!("invalid base64 in `{field}`: {e}")))
}

// ============================================================================
// Registration
// ============================================================================

/// Registers a Solana adapter named `wallet_name` in the page's
/// wallet-standard registry.
pub fn register_solana_wallet_standard(
    window: &Window,
    client: MultichainClient,
    wallet_name: &str,
    icon: &str,
) -> (Arc<SolanaWallet>, Registration) {
    let wallet = Arc::new(SolanaWallet::new(client, wallet_name, icon));
    let registration = window.wallets().register(Arc::clone(&wallet) as Arc<dyn Wallet>);

    window.dispatch_event(WindowEvent::RegisterWallet(wallet_name.to_string()));

    (wallet, registration)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::time::timeout;

    use crate::multichain::DefaultTransport;
    use crate::multichain::transport::tests::spawn_wallet;
    use crate::transport::MessageBus;

    const STEP: Duration = Duration::from_secs(2);
    const ADDRESS: &str = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T";

    fn session_with_account() -> Value {
        json!({
            "sessionScopes": {
                SOLANA_MAINNET: { "accounts": [format!("{SOLANA_MAINNET}:{ADDRESS}")] },
                SOLANA_DEVNET: { "accounts": [format!("{SOLANA_DEVNET}:{ADDRESS}")] },
                "eip155:1": { "accounts": ["eip155:1:0xabc"] }
            }
        })
    }

    /// Wallet that has no session yet, grants one on request and signs by
    /// echoing the input.
    fn spawn_solana_wallet(bus: &MessageBus) {
        let _ = spawn_wallet(bus, |method, params| match method {
            "wallet_getSession" => Ok(json!({ "sessionScopes": {} })),
            "wallet_createSession" => Ok(session_with_account()),
            "wallet_revokeSession" => Ok(Value::Bool(true)),
            "wallet_invokeMethod" => {
                let request = &params["request"];
                match request["method"].as_str() {
                    Some("signMessage") => Ok(json!({
                        "signedMessage": request["params"]["message"],
                        "signature": "sig",
                    })),
                    Some("signTransaction") => Ok(json!({
                        "signedTransaction": request["params"]["transaction"],
                    })),
                    Some("signAndSendTransaction") => Ok(json!({ "signature": params["scope"] })),
                    Some("signIn") => {
                        let input = &request["params"];
                        let text = format!(
                            "{} wants you to sign in with {}",
                            input["domain"].as_str().unwrap_or_default(),
                            input["address"].as_str().unwrap_or_default(),
                        );
                        Ok(json!({
                            "signedMessage": Base64Standard.encode(text),
                            "signature": "siws",
                        }))
                    }
                    _ => Err((-32601, "Method not found".into())),
                }
            }
            _ => Err((-32601, "Method not found".into())),
        });
    }

    fn wallet(bus: &MessageBus) -> SolanaWallet {
        let client = MultichainClient::new(Arc::new(DefaultTransport::new(bus)));
        SolanaWallet::new(client, "OPN Wallet", "data:,")
    }

    #[test]
    fn test_chains_and_features() {
        let bus = MessageBus::new();
        let wallet = wallet(&bus);

        assert_eq!(wallet.name(), "OPN Wallet");
        assert_eq!(wallet.chains().len(), 3);
        assert!(wallet.has_feature("solana:signAndSendTransaction"));
        assert!(wallet.has_feature("standard:events"));
    }

    #[tokio::test]
    async fn test_connect_creates_session_and_merges_chains() {
        let bus = MessageBus::new();
        spawn_solana_wallet(&bus);
        let wallet = wallet(&bus);
        let mut events = wallet.subscribe();

        let accounts = timeout(STEP, wallet.connect()).await.expect("in time").expect("ok");

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].address, ADDRESS);
        assert_eq!(accounts[0].chains, vec![SOLANA_MAINNET.to_string(), SOLANA_DEVNET.to_string()]);
        assert_eq!(
            events.recv().await.expect("event"),
            WalletEvent::Change { accounts }
        );
    }

    #[tokio::test]
    async fn test_sign_message_round_trips_bytes() {
        let bus = MessageBus::new();
        spawn_solana_wallet(&bus);
        let wallet = wallet(&bus);
        timeout(STEP, wallet.connect()).await.expect("in time").expect("ok");

        let signed = timeout(STEP, wallet.sign_message(ADDRESS, b"hello"))
            .await
            .expect("in time")
            .expect("ok");

        assert_eq!(signed.signed_message, b"hello");
        assert_eq!(signed.signature, "sig");
    }

    #[tokio::test]
    async fn test_sign_transaction_uses_requested_chain() {
        let bus = MessageBus::new();
        spawn_solana_wallet(&bus);
        let wallet = wallet(&bus);
        timeout(STEP, wallet.connect()).await.expect("in time").expect("ok");

        let signed = timeout(STEP, wallet.sign_transaction(ADDRESS, &[1, 2, 3], Some(SOLANA_DEVNET)))
            .await
            .expect("in time")
            .expect("ok");
        assert_eq!(signed, vec![1, 2, 3]);

        let signature = timeout(STEP, wallet.sign_and_send_transaction(ADDRESS, &[1], None))
            .await
            .expect("in time")
            .expect("ok");
        assert_eq!(signature, SOLANA_MAINNET);
    }

    #[tokio::test]
    async fn test_unknown_account_or_chain_is_unauthorized() {
        let bus = MessageBus::new();
        spawn_solana_wallet(&bus);
        let wallet = wallet(&bus);

        let err = wallet.sign_message(ADDRESS, b"x").await.unwrap_err();
        assert!(matches!(err, Error::Rpc { code: 4100, .. }));

        timeout(STEP, wallet.connect()).await.expect("in time").expect("ok");
        let err = wallet
            .sign_transaction(ADDRESS, &[0], Some(SOLANA_TESTNET))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Rpc { code: 4100, .. }));
    }

    #[tokio::test]
    async fn test_sign_in_connects_and_signs() {
        let bus = MessageBus::new();
        spawn_solana_wallet(&bus);
        let wallet = wallet(&bus);
        assert!(wallet.has_feature("solana:signIn"));

        let input = SignInInput {
            domain: Some("app.example.com".into()),
            ..SignInInput::default()
        };
        let output = timeout(STEP, wallet.sign_in(input))
            .await
            .expect("in time")
            .expect("ok");

        assert_eq!(output.account.address, ADDRESS);
        assert_eq!(output.account.chains.len(), 2);
        assert_eq!(
            output.signed_message,
            format!("app.example.com wants you to sign in with {ADDRESS}").into_bytes()
        );
        assert_eq!(output.signature, "siws");
        assert_eq!(wallet.accounts().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_with_unknown_address_is_unauthorized() {
        let bus = MessageBus::new();
        spawn_solana_wallet(&bus);
        let wallet = wallet(&bus);

        let input = SignInInput {
            address: Some("UnknownAddress1111111111111111111111111111".into()),
            ..SignInInput::default()
        };
        let err = timeout(STEP, wallet.sign_in(input))
            .await
            .expect("in time")
            .unwrap_err();
        assert!(matches!(err, Error::Rpc { code: 4100, .. }));
    }

    #[test]
    fn test_sign_in_input_omits_unset_fields() {
        let input = SignInInput {
            domain: Some("app.example.com".into()),
            issued_at: Some("2026-01-01T00:00:00Z".into()),
            ..SignInInput::default()
        };

        assert_eq!(
            serde_json::to_value(&input).expect("serialize"),
            json!({"domain": "app.example.com", "issuedAt": "2026-01-01T00:00:00Z"})
        );
    }

    #[tokio::test]
    async fn test_disconnect_clears_accounts() {
        let bus = MessageBus::new();
        spawn_solana_wallet(&bus);
        let wallet = wallet(&bus);
        timeout(STEP, wallet.connect()).await.expect("in time").expect("ok");

        timeout(STEP, wallet.disconnect()).await.expect("in time").expect("ok");
        assert!(wallet.accounts().is_empty());
    }

    #[tokio::test]
    async fn test_register_on_window() {
        let window = Window::new();
        let mut events = window.subscribe();
        let client = MultichainClient::new(Arc::new(DefaultTransport::new(window.bus())));

        let (wallet, registration) =
            register_solana_wallet_standard(&window, client, "OPN Wallet", "data:,");

        assert_eq!(window.wallets().len(), 1);
        assert_eq!(window.wallets().wallets()[0].name(), wallet.name());
        assert_eq!(events.recv().await.expect("event").name(), "wallet-standard:register-wallet");

        assert!(registration.unregister());
        assert!(window.wallets().is_empty());
    }
}
