//! Provider installation on a page window.
//!
//! # Sequence
//!
//! ```text
//!   substream ──► InpageProvider::new
//!                   │
//!                   ├─► announce (eip6963:announceProvider)
//!                   ├─► window.ethereum = provider   (should_set_on_window)
//!                   │     └─► ethereum#initialized
//!                   ├─► window.web3 = Web3Shim       (should_shim_web3)
//!                   └─► spawn initialize()           metamask_getProviderState
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::multiplex::Substream;
use crate::window::{ETHEREUM, GlobalValue, Property, Window, WindowEvent};

use super::info::{Provider, ProviderDetail, ProviderInfo};
use super::inpage::InpageProvider;

// ============================================================================
// Constants
// ============================================================================

/// Global holding the legacy web3 shim.
pub const WEB3: &str = "web3";

const WEB3_DEPRECATION: &str = "You are accessing the window.web3.currentProvider shim. \
     This property is deprecated; use window.ethereum instead.";

// ============================================================================
// ProviderOptions
// ============================================================================

/// Installation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderOptions {
    /// Install a `web3` global pointing at the provider.
    pub should_shim_web3: bool,

    /// Assign the provider to `window.ethereum`.
    pub should_set_on_window: bool,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            should_shim_web3: false,
            should_set_on_window: true,
        }
    }
}

impl ProviderOptions {
    /// Enables or disables the web3 shim.
    #[inline]
    #[must_use]
    pub fn with_shim_web3(mut self, enabled: bool) -> Self {
        self.should_shim_web3 = enabled;
        self
    }

    /// Enables or disables assignment to `window.ethereum`.
    #[inline]
    #[must_use]
    pub fn with_set_on_window(mut self, enabled: bool) -> Self {
        self.should_set_on_window = enabled;
        self
    }
}

// ============================================================================
// initialize_provider
// ============================================================================

/// Creates a provider on `substream` and installs it on `window`.
///
/// The wallet's initial state is fetched in the background; a failure
/// there is logged and leaves the provider disconnected.
///
/// Must be called within a tokio runtime.
pub fn initialize_provider(
    window: &Window,
    substream: Substream,
    info: ProviderInfo,
    options: ProviderOptions,
) -> Arc<InpageProvider> {
    let provider = Arc::new(InpageProvider::new(substream, info.clone()));

    window.announce_provider(ProviderDetail {
        info,
        provider: Arc::clone(&provider) as Arc<dyn Provider>,
    });

    if options.should_set_on_window {
        set_global_provider(window, &provider);
    }

    if options.should_shim_web3 {
        shim_web3(window, &provider);
    }

    let background = Arc::clone(&provider);
    tokio::spawn(async move {
        if let Err(e) = background.initialize().await {
            debug!(error = %e, "Failed to get initial provider state");
        }
    });

    provider
}

/// Assigns `window.ethereum` and fires `ethereum#initialized`.
fn set_global_provider(window: &Window, provider: &Arc<InpageProvider>) {
    let value = GlobalValue::Provider(Arc::clone(provider) as Arc<dyn Provider>);

    if let Err(e) = window.set(ETHEREUM, value) {
        warn!(error = %e, "Could not set window.ethereum");
        return;
    }

    window.dispatch_event(WindowEvent::EthereumInitialized);
}

/// Installs the web3 shim unless the page already has a `web3`.
fn shim_web3(window: &Window, provider: &Arc<InpageProvider>) {
    if window.has(WEB3) {
        debug!("window.web3 already present, not shimming");
        return;
    }

    let shim = Property::Data {
        value: GlobalValue::object(Web3Shim::new(Arc::clone(provider))),
        writable: true,
        configurable: true,
        enumerable: false,
    };

    if let Err(e) = window.define_property(WEB3, shim) {
        warn!(error = %e, "Could not shim window.web3");
    }
}

// ============================================================================
// Web3Shim
// ============================================================================

/// Legacy `window.web3` object exposing only `currentProvider`.
#[derive(Debug)]
pub struct Web3Shim {
    provider: Arc<InpageProvider>,
    warned: AtomicBool,
}

impl Web3Shim {
    /// Wraps `provider`.
    #[must_use]
    pub fn new(provider: Arc<InpageProvider>) -> Self {
        Self {
            provider,
            warned: AtomicBool::new(false),
        }
    }

    /// `web3.currentProvider`. The first access logs a deprecation warning.
    #[must_use]
    pub fn current_provider(&self) -> &Arc<InpageProvider> {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!("{WEB3_DEPRECATION}");
        }
        &self.provider
    }

    /// Returns `true` once the deprecation warning has been logged.
    #[inline]
    #[must_use]
    pub fn has_warned(&self) -> bool {
        self.warned.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Tests
// ============================================================================
