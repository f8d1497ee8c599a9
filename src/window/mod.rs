//! Page realm model.
//!
//! A [`Window`] stands in for the page's global object: named globals with
//! JavaScript property semantics (writable, configurable, enumerable,
//! accessors), the page `postMessage` bus, page events, and the
//! wallet-standard registry.
//!
//! # Ethereum Slot
//!
//! ```text
//!   window.ethereum (accessor, non-configurable, enumerable)
//!        │
//!   get ─┼─► primary provider (isMetaMask forced false)
//!        │     + providers = registry snapshot
//!   set ─┴─► registry.push(value)        primary unchanged
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `events` | Page events and EIP-6963 announcements |
//! | `globals` | Global values and property descriptors |
//! | `guard` | Suspend/restore a global around imports |
//! | `registry` | Provider registry and the `ethereum` accessor |

// ============================================================================
// Submodules
// ============================================================================

/// Page events.
pub mod events;

/// Global values and property descriptors.
pub mod globals;

/// Scoped global suspension.
pub mod guard;

/// Provider registry and `ethereum` accessor.
pub mod registry;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::multichain::WalletStandardRegistry;
use crate::provider::{ExternalProvider, Provider, ProviderDetail};
use crate::transport::MessageBus;

// ============================================================================
// Re-exports
// ============================================================================

pub use events::WindowEvent;
pub use globals::{GlobalValue, Property};
pub use guard::GlobalGuard;
pub use registry::{Ethereum, EthereumAccessor, ProviderRegistry};

// ============================================================================
// Constants
// ============================================================================

/// The conventional injected-provider global.
pub const ETHEREUM: &str = "ethereum";

/// Side-channel global holding this wallet's provider.
pub const OPN_PROVIDER: &str = "__OPN_PROVIDER__";

/// Side-channel global holding every registered provider.
pub const OPN_PROVIDERS: &str = "__OPN_PROVIDERS__";

/// Page event fan-out capacity.
const EVENT_CAPACITY: usize = 64;

// ============================================================================
// Window
// ============================================================================

/// The page's global object.
pub struct Window {
    properties: RwLock<FxHashMap<String, Property>>,
    bus: MessageBus,
    events: broadcast::Sender<WindowEvent>,
    announced: Mutex<Vec<ProviderDetail>>,
    wallets: WalletStandardRegistry,
}

impl Default for Window {
    fn default() -> Self {
        Self::new()
    }
}

impl Window {
    /// Creates an empty page with its own message bus.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bus(MessageBus::new())
    }

    /// Creates an empty page sharing `bus`.
    #[must_use]
    pub fn with_bus(bus: MessageBus) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            properties: RwLock::new(FxHashMap::default()),
            bus,
            events,
            announced: Mutex::new(Vec::new()),
            wallets: WalletStandardRegistry::new(),
        }
    }

    /// The page's `postMessage` bus.
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// The page's wallet-standard registry.
    #[inline]
    #[must_use]
    pub fn wallets(&self) -> &WalletStandardRegistry {
        &self.wallets
    }
}

// ============================================================================
// Window - Globals
// ============================================================================

impl Window {
    /// Reads a global.
    ///
    /// Accessors are evaluated; a missing global reads as `None`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<GlobalValue> {
        let properties = self.properties.read();

        match properties.get(name)? {
            Property::Data { value, .. } => Some(value.clone()),
            Property::Ethereum(accessor) => {
                let ethereum = accessor.get();
                let primary: Arc<dyn Provider> = ethereum.provider().clone();
                Some(GlobalValue::Provider(primary))
            }
        }
    }

    /// Assigns a global, as `window[name] = value` does.
    ///
    /// Missing globals are created writable, configurable and enumerable.
    /// Assigning to the `ethereum` accessor registers the value instead of
    /// replacing the primary provider.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BindingNotWritable`] for read-only data properties.
    pub fn set(&self, name: &str, value: GlobalValue) -> Result<()> {
        let mut properties = self.properties.write();

        match properties.get_mut(name) {
            Some(Property::Data {
                value: slot,
                writable,
                ..
            }) => {
                if !*writable {
                    return Err(Error::binding_not_writable(name));
                }
                *slot = value;
            }

            Some(Property::Ethereum(accessor)) => {
                let provider = match value {
                    GlobalValue::Provider(provider) => provider,
                    GlobalValue::Json(raw) => Arc::new(ExternalProvider::from_value(raw)),
                    other => Arc::new(ExternalProvider {
                        raw: other.to_json(),
                        ..ExternalProvider::default()
                    }),
                };
                accessor.set(provider);
            }

            None => {
                properties.insert(name.to_string(), Property::data(value));
            }
        }

        trace!(name, "Global assigned");
        Ok(())
    }

    /// Defines or redefines a property, as `Object.defineProperty` does.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PropertyRedefinition`] if the existing property is
    /// non-configurable.
    pub fn define_property(&self, name: &str, property: Property) -> Result<()> {
        let mut properties = self.properties.write();

        if let Some(existing) = properties.get(name)
            && !existing.is_configurable()
        {
            return Err(Error::property_redefinition(name));
        }

        properties.insert(name.to_string(), property);
        debug!(name, "Property defined");
        Ok(())
    }

    /// Deletes a property.
    ///
    /// Deleting a missing property succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PropertyRedefinition`] if the property is
    /// non-configurable.
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut properties = self.properties.write();

        if let Some(existing) = properties.get(name)
            && !existing.is_configurable()
        {
            return Err(Error::property_redefinition(name));
        }

        properties.remove(name);
        Ok(())
    }

    /// Returns `true` if the global exists (`name in window`).
    #[inline]
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.properties.read().contains_key(name)
    }

    /// Enumerable global names, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .properties
            .read()
            .iter()
            .filter(|(_, p)| p.is_enumerable())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Suspends a global until the returned guard drops.
    ///
    /// See [`GlobalGuard`].
    #[must_use]
    pub fn suspend_global(&self, name: &str) -> GlobalGuard<'_> {
        GlobalGuard::new(self, name)
    }
}

// ============================================================================
// Window - Ethereum
// ============================================================================

impl Window {
    /// Reads `window.ethereum` through the installed accessor.
    ///
    /// Returns `None` if no accessor is installed.
    #[must_use]
    pub fn ethereum(&self) -> Option<Ethereum> {
        match self.properties.read().get(ETHEREUM)? {
            Property::Ethereum(accessor) => Some(accessor.get()),
            Property::Data { .. } => None,
        }
    }

    /// Assigns `window.ethereum = provider`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BindingNotWritable`] if `ethereum` is read-only data.
    #[inline]
    pub fn set_ethereum(&self, provider: Arc<dyn Provider>) -> Result<()> {
        self.set(ETHEREUM, GlobalValue::Provider(provider))
    }

    /// Reads the `__OPN_PROVIDER__` side-channel global.
    #[must_use]
    pub fn opn_provider(&self) -> Option<Arc<dyn Provider>> {
        match self.get(OPN_PROVIDER)? {
            GlobalValue::Provider(provider) => Some(provider),
            _ => None,
        }
    }

    /// Reads the `__OPN_PROVIDERS__` side-channel global.
    #[must_use]
    pub fn opn_providers(&self) -> Option<ProviderRegistry> {
        match self.get(OPN_PROVIDERS)? {
            GlobalValue::Providers(registry) => Some(registry),
            _ => None,
        }
    }
}

// ============================================================================
// Window - Events
// ============================================================================

impl Window {
    /// Subscribes to page events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WindowEvent> {
        self.events.subscribe()
    }

    /// Dispatches a page event.
    pub fn dispatch_event(&self, event: WindowEvent) {
        trace!(event = event.name(), "Dispatch");
        let _ = self.events.send(event);
    }

    /// Announces a provider (`eip6963:announceProvider`) and keeps it for
    /// later discovery requests.
    pub fn announce_provider(&self, detail: ProviderDetail) {
        self.announced.lock().push(detail.clone());
        self.dispatch_event(WindowEvent::AnnounceProvider(detail));
    }

    /// Runs EIP-6963 discovery (`eip6963:requestProvider`).
    ///
    /// Every announced provider answers again; the answers are returned.
    #[must_use]
    pub fn request_providers(&self) -> Vec<ProviderDetail> {
        self.dispatch_event(WindowEvent::RequestProvider);

        let announced = self.announced.lock().clone();
        for detail in &announced {
            self.dispatch_event(WindowEvent::AnnounceProvider(detail.clone()));
        }
        announced
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_assignment_creates_plain_global() {
        let window = Window::new();
        window.set("foo", GlobalValue::Json(json!(1))).expect("set");

        assert!(window.has("foo"));
        assert_eq!(window.get("foo"), Some(GlobalValue::Json(json!(1))));
        assert_eq!(window.keys(), vec!["foo".to_string()]);
    }

    #[test]
    fn test_read_only_global_rejects_assignment() {
        let window = Window::new();
        window
            .define_property("define", Property::read_only(GlobalValue::Json(json!("amd"))))
            .expect("define");

        let err = window.set("define", GlobalValue::Undefined).unwrap_err();
        assert!(matches!(err, Error::BindingNotWritable { .. }));
    }

    #[test]
    fn test_non_configurable_cannot_be_redefined_or_deleted() {
        let window = Window::new();
        window
            .define_property("locked", Property::read_only(GlobalValue::Undefined))
            .expect("define");

        assert!(window.define_property("locked", Property::data(GlobalValue::Undefined)).is_err());
        assert!(window.delete("locked").is_err());
        assert!(window.has("locked"));
    }

    #[test]
    fn test_delete_configurable() {
        let window = Window::new();
        window.set("tmp", GlobalValue::Undefined).expect("set");
        window.delete("tmp").expect("delete");
        assert!(!window.has("tmp"));
        assert!(window.delete("never-existed").is_ok());
    }

    #[test]
    fn test_hidden_globals_are_not_enumerated() {
        let window = Window::new();
        window
            .define_property(
                "hidden",
                Property::Data {
                    value: GlobalValue::Undefined,
                    writable: true,
                    configurable: true,
                    enumerable: false,
                },
            )
            .expect("define");

        assert!(window.has("hidden"));
        assert!(window.keys().is_empty());
    }

    #[test]
    fn test_ethereum_is_none_without_accessor() {
        let window = Window::new();
        let provider: Arc<dyn Provider> = Arc::new(ExternalProvider::default());
        window.set_ethereum(provider).expect("set");

        assert!(window.ethereum().is_none());
        assert!(matches!(window.get(ETHEREUM), Some(GlobalValue::Provider(_))));
    }
}
