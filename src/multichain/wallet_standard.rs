//! Wallet-standard registry.
//!
//! The page-wide list that dapps enumerate to discover non-EVM wallets.
//! Registering returns a [`Registration`] that can later remove the wallet.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

// ============================================================================
// Wallet
// ============================================================================

/// A wallet as seen through the wallet standard.
pub trait Wallet: Send + Sync + fmt::Debug {
    /// Display name.
    fn name(&self) -> &str;

    /// Icon data URI.
    fn icon(&self) -> &str;

    /// Wallet-standard version.
    fn version(&self) -> &str {
        "1.0.0"
    }

    /// Supported chains, as CAIP-2 ids.
    fn chains(&self) -> &[&'static str];

    /// Supported feature names.
    fn features(&self) -> &[&'static str];

    /// Returns `true` if `feature` is supported.
    fn has_feature(&self, feature: &str) -> bool {
        self.features().contains(&feature)
    }
}

// ============================================================================
// WalletStandardRegistry
// ============================================================================

/// Registered wallets, in registration order.
///
/// Cloning yields another handle to the same list.
#[derive(Clone, Default)]
pub struct WalletStandardRegistry {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    wallets: RwLock<Vec<(u64, Arc<dyn Wallet>)>>,
    next_id: AtomicU64,
}

impl WalletStandardRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `wallet`.
    pub fn register(&self, wallet: Arc<dyn Wallet>) -> Registration {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(name = wallet.name(), id, "Wallet registered");

        self.inner.wallets.write().push((id, wallet));

        Registration {
            registry: self.clone(),
            id,
        }
    }

    /// Registered wallets.
    #[must_use]
    pub fn wallets(&self) -> Vec<Arc<dyn Wallet>> {
        self.inner
            .wallets
            .read()
            .iter()
            .map(|(_, wallet)| Arc::clone(wallet))
            .collect()
    }

    /// Number of registered wallets.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.wallets.read().len()
    }

    /// Returns `true` if no wallet is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.wallets.read().is_empty()
    }

    fn remove(&self, id: u64) -> bool {
        let mut wallets = self.inner.wallets.write();
        let before = wallets.len();
        wallets.retain(|(entry, _)| *entry != id);
        wallets.len() != before
    }
}

impl fmt::Debug for WalletStandardRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.inner.wallets.read().iter().map(|(_, w)| w.name().to_string()))
            .finish()
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Handle returned by [`WalletStandardRegistry::register`].
///
/// Dropping the handle keeps the wallet registered.
#[derive(Debug)]
pub struct Registration {
    registry: WalletStandardRegistry,
    id: u64,
}

impl Registration {
    /// Removes the wallet. Returns `false` if it was already gone.
    pub fn unregister(self) -> bool {
        let removed = self.registry.remove(self.id);
        debug!(id = self.id, removed, "Wallet unregistered");
        removed
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Dummy(&'static str);

    impl Wallet for Dummy {
        fn name(&self) -> &str {
            self.0
        }

        fn icon(&self) -> &str {
            "data:,"
        }

        fn chains(&self) -> &[&'static str] {
            &["test:1"]
        }

        fn features(&self) -> &[&'static str] {
            &["standard:connect"]
        }
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = WalletStandardRegistry::new();

        let a = registry.register(Arc::new(Dummy("a")));
        let _b = registry.register(Arc::new(Dummy("b")));
        assert_eq!(registry.len(), 2);

        assert!(a.unregister());
        let names: Vec<_> = registry.wallets().iter().map(|w| w.name().to_string()).collect();
        assert_eq!(names, vec!["b".to_string()]);
    }

    #[test]
    fn test_dropping_registration_keeps_wallet() {
        let registry = WalletStandardRegistry::new();
        drop(registry.register(Arc::new(Dummy("a"))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_feature_lookup() {
        let wallet = Dummy("a");
        assert!(wallet.has_feature("standard:connect"));
        assert!(!wallet.has_feature("solana:signIn"));
        assert_eq!(wallet.version(), "1.0.0");
    }
}
