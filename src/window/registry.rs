//! Provider registry and the `ethereum` accessor.
//!
//! The primary slot and the registry are separate: the accessor's getter
//! always answers with the primary provider, and its setter only appends
//! to the registry. No write path can reach the primary reference.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::ops::Deref;
use std::ptr;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::provider::{InpageProvider, Provider};

// ============================================================================
// ProviderRegistry
// ============================================================================

/// Append-only list of every provider that claimed `window.ethereum`.
///
/// Cloning yields another handle to the same list.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    entries: Arc<RwLock<Vec<Arc<dyn Provider>>>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `primary` as its first entry.
    #[must_use]
    pub fn with_primary(primary: Arc<dyn Provider>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(vec![primary])),
        }
    }

    /// Appends a provider.
    pub fn push(&self, provider: Arc<dyn Provider>) {
        let mut entries = self.entries.write();
        entries.push(provider);
        debug!(len = entries.len(), "Provider registered");
    }

    /// Number of registered providers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Current contents.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<dyn Provider>> {
        self.entries.read().clone()
    }

    /// Number of entries that are `provider` itself.
    #[must_use]
    pub fn count_of(&self, provider: &Arc<dyn Provider>) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|p| ptr::addr_eq(Arc::as_ptr(p), Arc::as_ptr(provider)))
            .count()
    }

    /// Returns `true` if both handles share one list.
    #[inline]
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.read().iter()).finish()
    }
}

// ============================================================================
// Ethereum
// ============================================================================

/// Result of reading `window.ethereum`.
///
/// Dereferences to the primary provider; [`providers`](Self::providers)
/// is the registry as it was at read time.
#[derive(Clone, Debug)]
pub struct Ethereum {
    provider: Arc<InpageProvider>,
    providers: Vec<Arc<dyn Provider>>,
}

impl Ethereum {
    /// The primary provider.
    #[inline]
    #[must_use]
    pub fn provider(&self) -> &Arc<InpageProvider> {
        &self.provider
    }

    /// Every registered provider, primary included.
    #[inline]
    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }
}

impl Deref for Ethereum {
    type Target = InpageProvider;

    fn deref(&self) -> &InpageProvider {
        &self.provider
    }
}

// ============================================================================
// EthereumAccessor
// ============================================================================

/// Getter/setter pair installed as `window.ethereum`.
#[derive(Clone)]
pub struct EthereumAccessor {
    primary: Arc<InpageProvider>,
    registry: ProviderRegistry,
}

impl EthereumAccessor {
    /// Creates an accessor answering with `primary` and appending to
    /// `registry`.
    #[inline]
    #[must_use]
    pub fn new(primary: Arc<InpageProvider>, registry: ProviderRegistry) -> Self {
        Self { primary, registry }
    }

    /// Getter: the primary provider, never flagged as MetaMask.
    #[must_use]
    pub fn get(&self) -> Ethereum {
        self.primary.set_is_metamask(false);

        Ethereum {
            provider: Arc::clone(&self.primary),
            providers: self.registry.snapshot(),
        }
    }

    /// Setter: registers `provider` without touching the primary slot.
    pub fn set(&self, provider: Arc<dyn Provider>) {
        self.registry.push(provider);
    }

    /// The registry this accessor appends to.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }
}

impl fmt::Debug for EthereumAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EthereumAccessor")
            .field("primary", &self.primary)
            .field("registered", &self.registry.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    use crate::multiplex::ObjectMultiplex;
    use crate::provider::{ExternalProvider, ProviderInfo};
    use crate::window::{ETHEREUM, GlobalValue, Property, Window};

    /// Installs an accessor the way the bridge does.
    fn install(window: &Window) -> (Arc<InpageProvider>, ProviderRegistry) {
        let mux = ObjectMultiplex::new();
        let substream = mux.create_stream("opn-provider").expect("substream");
        let info = ProviderInfo::new("OPN Wallet", "data:,", "io.iopn.wallet");
        let primary = Arc::new(InpageProvider::new(substream, info));

        let as_dyn: Arc<dyn Provider> = primary.clone();
        let registry = ProviderRegistry::with_primary(as_dyn);

        window
            .define_property(
                ETHEREUM,
                Property::Ethereum(EthereumAccessor::new(primary.clone(), registry.clone())),
            )
            .expect("define");

        (primary, registry)
    }

    fn foreign(is_metamask: bool) -> Arc<dyn Provider> {
        Arc::new(ExternalProvider {
            is_metamask,
            ..ExternalProvider::default()
        })
    }

    #[tokio::test]
    async fn test_read_forces_metamask_flag_false() {
        let window = Window::new();
        let (primary, _) = install(&window);
        primary.set_is_metamask(true);

        let ethereum = window.ethereum().expect("installed");
        assert!(!ethereum.is_metamask());
        assert!(ethereum.provider().same_as(&primary));
    }

    #[tokio::test]
    async fn test_assignment_appends_without_replacing() {
        let window = Window::new();
        let (primary, registry) = install(&window);

        window.set_ethereum(foreign(true)).expect("assign");
        window
            .set(ETHEREUM, GlobalValue::Json(json!({"isMetaMask": true})))
            .expect("assign");

        let ethereum = window.ethereum().expect("installed");
        assert!(ethereum.provider().same_as(&primary));
        assert_eq!(ethereum.providers().len(), 3);
        assert_eq!(registry.len(), 3);
        assert!(ethereum.providers()[2].is_metamask());
    }

    #[tokio::test]
    async fn test_accessor_is_locked_and_enumerable() {
        let window = Window::new();
        install(&window);

        assert!(
            window
                .define_property(ETHEREUM, Property::data(GlobalValue::Undefined))
                .is_err()
        );
        assert!(window.delete(ETHEREUM).is_err());
        assert!(window.keys().contains(&ETHEREUM.to_string()));
    }

    #[tokio::test]
    async fn test_generic_read_returns_primary() {
        let window = Window::new();
        let (primary, _) = install(&window);
        window.set_ethereum(foreign(false)).expect("assign");

        let Some(GlobalValue::Provider(read)) = window.get(ETHEREUM) else {
            panic!("expected provider");
        };
        let primary: Arc<dyn Provider> = primary;
        assert!(ptr::addr_eq(Arc::as_ptr(&read), Arc::as_ptr(&primary)));
    }

    #[tokio::test]
    async fn test_snapshot_is_taken_at_read_time() {
        let window = Window::new();
        install(&window);

        let before = window.ethereum().expect("installed");
        window.set_ethereum(foreign(false)).expect("assign");
        let after = window.ethereum().expect("installed");

        assert_eq!(before.providers().len(), 1);
        assert_eq!(after.providers().len(), 2);
    }

    proptest! {
        #[test]
        fn prop_assignments_never_move_primary(flags in proptest::collection::vec(any::<bool>(), 0..32)) {
            let runtime = tokio::runtime::Runtime::new().expect("runtime");
            let _enter = runtime.enter();

            let window = Window::new();
            let (primary, registry) = install(&window);
            let primary_dyn: Arc<dyn Provider> = primary.clone();
            let first = window.ethereum().expect("installed");

            let mut last_len = first.providers().len();
            for is_metamask in &flags {
                window.set_ethereum(foreign(*is_metamask)).expect("assign");

                let read = window.ethereum().expect("installed");
                prop_assert!(read.provider().same_as(&primary));
                prop_assert!(!read.is_metamask());
                prop_assert_eq!(read.providers().len(), last_len + 1);
                prop_assert_eq!(read.provider_info(), first.provider_info());
                last_len = read.providers().len();
            }

            prop_assert_eq!(registry.len(), flags.len() + 1);
            prop_assert_eq!(registry.count_of(&primary_dyn), 1);
        }
    }
}
