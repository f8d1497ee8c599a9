//! OPN Inpage - page-context provider bridge for the OPN Wallet extension.
//!
//! This library implements the half of the wallet's communication channel
//! that lives inside a web page: it opens a message stream toward the
//! extension's content script, multiplexes it into named sub-streams, and
//! installs an EIP-1193 provider as the page's primary `ethereum` global
//! while keeping every competing provider enumerable.
//!
//! # Architecture
//!
//! ```text
//!   Window (page realm)
//!     │  postMessage bus
//!     ▼
//!   PostMessageStream "opn-inpage" ⇄ "opn-contentscript"
//!     │
//!   ObjectMultiplex ── "opn-provider" ──► InpageProvider ──► window.ethereum
//!     │
//!     └─ "opn-multichain-provider" (ignored; served by DefaultTransport)
//! ```
//!
//! Key design principles:
//!
//! - The primary provider slot cannot be taken over; assignments register
//! - One transport per page load, never torn down from the page side
//! - Nothing the bridge does surfaces as an error to page code
//!
//! # Quick Start
//!
//! ```no_run
//! use opn_inpage::{Bootstrap, BuildConfig, PageContext, Result, Window};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let window = Window::new();
//!     let page = PageContext::html(Url::parse("https://app.example.com/")?);
//!
//!     if let Some(bridge) = Bootstrap::new(&window, BuildConfig::from_env(), page).inject() {
//!         let chain_id = bridge.provider().request("eth_chainId", None).await?;
//!         println!("Chain: {chain_id}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Build-time configuration |
//! | [`constants`] | Stream names and the marketing whitelist |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`inpage`] | Bridge bootstrap |
//! | [`injection`] | Page eligibility checks |
//! | [`multichain`] | CAIP-25 client and Solana wallet-standard adapter |
//! | [`multiplex`] | Named sub-streams over one transport |
//! | [`provider`] | EIP-1193 provider and EIP-6963 identity |
//! | [`transport`] | Page message bus and post-message streams |
//! | [`window`] | Page realm model |

// ============================================================================
// Modules
// ============================================================================

/// Build-time configuration.
pub mod config;

/// Stream channel names and the marketing whitelist.
pub mod constants;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Bridge bootstrap.
pub mod inpage;

/// Page eligibility checks.
pub mod injection;

/// Multichain (CAIP-25) access.
pub mod multichain;

/// Object multiplexer.
///
/// Splits one transport into named sub-streams.
pub mod multiplex;

/// Wallet providers.
pub mod provider;

/// Page message transport.
pub mod transport;

/// Page realm model: globals, events, provider registry.
pub mod window;

// ============================================================================
// Re-exports
// ============================================================================

// Bootstrap
pub use inpage::{Bootstrap, Bridge, BridgeState, connection_lost_message};

// Configuration
pub use config::BuildConfig;
pub use injection::{DefaultInjectionPolicy, InjectionPolicy, PageContext};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ProviderUuid, RequestId};

// Transport types
pub use multiplex::{ObjectMultiplex, Substream};
pub use transport::{MessageBus, PostMessageStream, pipeline};

// Provider types
pub use provider::{InpageProvider, Provider, ProviderEvent, ProviderInfo};

// Window types
pub use window::{Ethereum, GlobalValue, ProviderRegistry, Window};
