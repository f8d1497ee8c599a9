//! Multichain (CAIP-25) access for non-EVM wallets.
//!
//! A second channel next to the EIP-1193 provider. It does not use the
//! bridge's multiplexer: requests go straight onto the page bus, framed for
//! the content script's `opn-multichain-provider` sub-stream.
//!
//! ```text
//!   SolanaWallet ──► MultichainClient ──► DefaultTransport ──► MessageBus
//!        │                wallet_*
//!        └── registered in WalletStandardRegistry
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | Session API: create, get, revoke, invoke |
//! | `solana` | Solana wallet-standard adapter |
//! | `transport` | `Transport` trait and the bus-backed default |
//! | `wallet_standard` | Page-wide wallet registry |

// ============================================================================
// Submodules
// ============================================================================

/// CAIP-25 session client.
pub mod client;

/// Solana adapter.
pub mod solana;

/// Request transport.
pub mod transport;

/// Wallet-standard registry.
pub mod wallet_standard;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::{MultichainClient, Scope, Scopes, SessionData};
pub use solana::{
    SOLANA_CHAINS, SOLANA_DEVNET, SOLANA_FEATURES, SOLANA_MAINNET, SOLANA_TESTNET, SignInInput,
    SignInOutput, SignedMessage, SolanaAccount, SolanaWallet, WalletEvent,
    register_solana_wallet_standard,
};
pub use transport::{DefaultTransport, Transport};
pub use wallet_standard::{Registration, Wallet, WalletStandardRegistry};
