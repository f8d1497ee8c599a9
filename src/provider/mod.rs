//! Wallet providers exposed to page scripts.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`InpageProvider`] | This wallet's EIP-1193 provider, bound to one sub-stream |
//! | [`Provider`] | Anything that can occupy a slot in the provider registry |
//! | [`ExternalProvider`] | A competing wallet's provider assigned by page code |
//! | [`ProviderInfo`] | EIP-6963 identity record |
//!
//! # Example
//!
//! ```ignore
//! let provider = initialize_provider(&window, substream, info, ProviderOptions::default());
//! let chain_id = provider.request("eth_chainId", None).await?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// EIP-6963 identity and the registry trait.
pub mod info;

/// EIP-1193 provider over a sub-stream.
pub mod inpage;

/// Provider installation on a page window.
pub mod initialize;

/// JSON-RPC 2.0 message types.
pub mod rpc;

// ============================================================================
// Re-exports
// ============================================================================

pub use info::{ExternalProvider, Provider, ProviderDetail, ProviderInfo};
pub use initialize::{ProviderOptions, initialize_provider};
pub use inpage::{DEFAULT_REQUEST_TIMEOUT, InpageProvider, ProviderEvent};
pub use rpc::{Incoming, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
