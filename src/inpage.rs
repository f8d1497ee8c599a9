//! Provider bridge bootstrap.
//!
//! Runs once per page load:
//!
//! ```text
//!   suspend `define` ─► imports ─► restore `define`
//!        │
//!   InjectionPolicy ── false ──► Uninitialized (no side effects)
//!        │ true
//!   PostMessageStream("opn-inpage" → "opn-contentscript")
//!        │
//!   ObjectMultiplex ─► pipeline(stream, mux, stream, on_close)
//!        │
//!        ├─► "opn-provider" ─► InpageProvider ─► window.ethereum accessor
//!        └─► MultichainClient ─► Solana wallet-standard adapter
//!        │
//!   Active
//! ```
//!
//! There is no closed state. A lost connection is reported once and the
//! bridge stays as it is until the page goes away.

// ============================================================================
// Imports
// ============================================================================

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BuildConfig;
use crate::constants::{
    CONTENT_SCRIPT, METAMASK_CAIP_MULTICHAIN_PROVIDER, METAMASK_EIP_1193_PROVIDER, METAMASK_INPAGE,
};
use crate::error::{Error, Result};
use crate::injection::{DefaultInjectionPolicy, InjectionPolicy, PageContext};
use crate::multichain::{
    DefaultTransport, MultichainClient, Registration, SolanaWallet, register_solana_wallet_standard,
};
use crate::multiplex::ObjectMultiplex;
use crate::provider::{
    InpageProvider, Provider, ProviderInfo, ProviderOptions, initialize_provider,
};
use crate::transport::{PostMessageStream, pipeline};
use crate::window::{
    ETHEREUM, EthereumAccessor, GlobalValue, OPN_PROVIDER, OPN_PROVIDERS, Property,
    ProviderRegistry, Window,
};

// ============================================================================
// Constants
// ============================================================================

/// AMD loader global suspended during imports.
pub const DEFINE: &str = "define";

// ============================================================================
// Types
// ============================================================================

/// Receives the connection-lost message.
pub type ConnectionLostHandler = Box<dyn FnOnce(String) + Send + 'static>;

/// Code run while `define` is suspended.
pub type ImportHook<'w> = Box<dyn FnOnce(&Window) + 'w>;

/// Bridge lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Nothing created yet, or the page was not eligible.
    Uninitialized,
    /// Transport, multiplexer and provider are live.
    Active,
}

// ============================================================================
// connection_lost_message
// ============================================================================

/// Warning emitted when the pipeline stops.
///
/// ```text
/// Lost connection to "opn-provider".
/// Premature close
/// ```
#[must_use]
pub fn connection_lost_message(error: Option<&Error>) -> String {
    let mut message = format!("Lost connection to \"{METAMASK_EIP_1193_PROVIDER}\".");

    if let Some(error) = error {
        message.push('\n');
        message.push_str(&error.to_string());

        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str("\nCaused by: ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
    }

    message
}

fn warn_connection_lost(message: String) {
    warn!("{message}");
}

// ============================================================================
// Bootstrap
// ============================================================================

/// One-shot bridge setup for a page.
///
/// # Example
///
/// ```ignore
/// let window = Window::new();
/// let page = PageContext::html(Url::parse("https://app.example")?);
///
/// if let Some(bridge) = Bootstrap::new(&window, BuildConfig::from_env(), page).inject() {
///     let chain_id = bridge.provider().request("eth_chainId", None).await?;
/// }
/// ```
pub struct Bootstrap<'w> {
    window: &'w Window,
    config: BuildConfig,
    page: PageContext,
    policy: Box<dyn InjectionPolicy>,
    on_connection_lost: ConnectionLostHandler,
    import_hook: Option<ImportHook<'w>>,
}

impl fmt::Debug for Bootstrap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("config", &self.config)
            .field("page", &self.page)
            .finish_non_exhaustive()
    }
}

impl<'w> Bootstrap<'w> {
    /// Creates a bootstrap using [`DefaultInjectionPolicy`] and logging
    /// connection loss as a warning.
    #[must_use]
    pub fn new(window: &'w Window, config: BuildConfig, page: PageContext) -> Self {
        Self {
            window,
            config,
            page,
            policy: Box::new(DefaultInjectionPolicy),
            on_connection_lost: Box::new(warn_connection_lost),
            import_hook: None,
        }
    }

    /// Replaces the eligibility predicate.
    #[must_use]
    pub fn with_policy(mut self, policy: impl InjectionPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Replaces the connection-lost handler.
    #[must_use]
    pub fn on_connection_lost(mut self, handler: impl FnOnce(String) + Send + 'static) -> Self {
        self.on_connection_lost = Box::new(handler);
        self
    }

    /// Runs `hook` during the import phase, while `define` is suspended.
    #[must_use]
    pub fn with_import_hook(mut self, hook: impl FnOnce(&Window) + 'w) -> Self {
        self.import_hook = Some(Box::new(hook));
        self
    }

    /// Always [`BridgeState::Uninitialized`]; see [`Bridge::state`].
    #[inline]
    #[must_use]
    pub fn state(&self) -> BridgeState {
        BridgeState::Uninitialized
    }

    /// Sets up the bridge, logging instead of failing.
    ///
    /// Page code never sees an error from the bridge.
    #[must_use]
    pub fn inject(self) -> Option<Bridge> {
        match self.run() {
            Ok(bridge) => bridge,
            Err(e) => {
                warn!(error = %e, "Provider bridge setup failed");
                None
            }
        }
    }

    /// Sets up the bridge.
    ///
    /// Returns `Ok(None)` if the page is not eligible; nothing is created
    /// then.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// An incomplete build configuration is logged; the provider is still
    /// injected with whatever identity it has.
    ///
    /// # Errors
    ///
    /// - [`Error::PropertyRedefinition`] if the page locked `ethereum` first
    /// - [`Error::BindingNotWritable`] if a side-channel global is read-only
    pub fn run(self) -> Result<Option<Bridge>> {
        let Self {
            window,
            config,
            page,
            policy,
            on_connection_lost,
            import_hook,
        } = self;

        {
            let _define = window.suspend_global(DEFINE);
            if let Some(hook) = import_hook {
                hook(window);
            }
            if let Err(e) = config.validate() {
                warn!(error = %e, "Incomplete build configuration");
            }
        }

        debug!(level = %config.log_level(), "Inpage script loaded");

        if !policy.should_inject(&page) {
            debug!(url = %page.url, "Page not eligible for provider injection");
            return Ok(None);
        }

        // Transport and multiplexer
        let stream = PostMessageStream::new(window.bus(), METAMASK_INPAGE, CONTENT_SCRIPT);
        let mux = ObjectMultiplex::new();
        mux.ignore_stream(METAMASK_CAIP_MULTICHAIN_PROVIDER)?;
        let substream = mux.create_stream(METAMASK_EIP_1193_PROVIDER)?;

        let pipeline = pipeline(stream, &mux, move |error| {
            on_connection_lost(connection_lost_message(error.as_ref()));
        });

        // Provider
        let info = ProviderInfo::new(&config.name, &config.icon, &config.app_id);
        let provider = initialize_provider(
            window,
            substream,
            info,
            ProviderOptions::default().with_shim_web3(true),
        );
        provider.set_is_opn(true);

        let registry = install_default_provider(window, &provider)?;

        // Secondary channel
        let multichain = MultichainClient::new(Arc::new(DefaultTransport::new(window.bus())));
        let (solana, registration) =
            register_solana_wallet_standard(window, multichain.clone(), &config.name, &config.icon);

        info!(name = %config.name, url = %page.url, "Provider bridge active");

        Ok(Some(Bridge {
            provider,
            registry,
            mux,
            pipeline,
            multichain,
            solana,
            registration,
        }))
    }
}

/// Publishes the side-channel globals and locks `window.ethereum`.
fn install_default_provider(
    window: &Window,
    provider: &Arc<InpageProvider>,
) -> Result<ProviderRegistry> {
    let primary = Arc::clone(provider) as Arc<dyn Provider>;
    let registry = ProviderRegistry::with_primary(Arc::clone(&primary));

    window.set(OPN_PROVIDER, GlobalValue::Provider(primary))?;
    window.set(OPN_PROVIDERS, GlobalValue::Providers(registry.clone()))?;

    window.define_property(
        ETHEREUM,
        Property::Ethereum(EthereumAccessor::new(Arc::clone(provider), registry.clone())),
    )?;

    Ok(registry)
}

// ============================================================================
// Bridge
// ============================================================================

/// A live bridge.
#[derive(Debug)]
pub struct Bridge {
    provider: Arc<InpageProvider>,
    registry: ProviderRegistry,
    mux: ObjectMultiplex,
    pipeline: JoinHandle<()>,
    multichain: MultichainClient,
    solana: Arc<SolanaWallet>,
    registration: Registration,
}

impl Bridge {
    /// Always [`BridgeState::Active`].
    #[inline]
    #[must_use]
    pub fn state(&self) -> BridgeState {
        BridgeState::Active
    }

    /// The primary provider.
    #[inline]
    #[must_use]
    pub fn provider(&self) -> &Arc<InpageProvider> {
        &self.provider
    }

    /// Every provider that claimed `window.ethereum`, primary first.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The page-side multiplexer.
    #[inline]
    #[must_use]
    pub fn mux(&self) -> &ObjectMultiplex {
        &self.mux
    }

    /// The multichain client.
    #[inline]
    #[must_use]
    pub fn multichain(&self) -> &MultichainClient {
        &self.multichain
    }

    /// The registered Solana adapter.
    #[inline]
    #[must_use]
    pub fn solana(&self) -> &Arc<SolanaWallet> {
        &self.solana
    }

    /// Returns `true` once the pipeline has stopped.
    #[inline]
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.pipeline.is_finished()
    }

    /// Removes the Solana adapter from the wallet-standard registry.
    pub fn unregister_wallet(self) -> bool {
        self.registration.unregister()
    }
}

// ============================================================================
// Tests
// ============================================================================
