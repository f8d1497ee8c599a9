//! Page events.

// ============================================================================
// Imports
// ============================================================================

use crate::provider::ProviderDetail;

// ============================================================================
// Constants
// ============================================================================

/// Fired once `window.ethereum` is installed.
pub const ETHEREUM_INITIALIZED: &str = "ethereum#initialized";

/// EIP-6963 announcement.
pub const ANNOUNCE_PROVIDER: &str = "eip6963:announceProvider";

/// EIP-6963 discovery request.
pub const REQUEST_PROVIDER: &str = "eip6963:requestProvider";

/// Wallet-standard registration.
pub const REGISTER_WALLET: &str = "wallet-standard:register-wallet";

// ============================================================================
// WindowEvent
// ============================================================================

/// An event dispatched on the page window.
#[derive(Debug, Clone)]
pub enum WindowEvent {
    /// `ethereum#initialized`.
    EthereumInitialized,

    /// `eip6963:announceProvider`.
    AnnounceProvider(ProviderDetail),

    /// `eip6963:requestProvider`.
    RequestProvider,

    /// `wallet-standard:register-wallet`, carrying the wallet name.
    RegisterWallet(String),
}

impl WindowEvent {
    /// DOM event type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::EthereumInitialized => ETHEREUM_INITIALIZED,
            Self::AnnounceProvider(_) => ANNOUNCE_PROVIDER,
            Self::RequestProvider => REQUEST_PROVIDER,
            Self::RegisterWallet(_) => REGISTER_WALLET,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
