//! Provider identity and the registry trait.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::ProviderUuid;

// ============================================================================
// ProviderInfo
// ============================================================================

/// EIP-6963 provider identity.
///
/// # Format
///
/// ```json
/// {
///   "uuid": "350670db-19fa-4704-a166-e52e178b59d2",
///   "name": "OPN Wallet",
///   "icon": "data:image/svg+xml,...",
///   "rdns": "io.iopn.wallet"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Fresh per page load.
    pub uuid: ProviderUuid,

    /// Display name.
    pub name: String,

    /// Icon data URI.
    pub icon: String,

    /// Reverse-DNS app identifier.
    pub rdns: String,
}

impl ProviderInfo {
    /// Creates an identity record with a fresh uuid.
    #[must_use]
    pub fn new(name: impl Into<String>, icon: impl Into<String>, rdns: impl Into<String>) -> Self {
        Self {
            uuid: ProviderUuid::generate(),
            name: name.into(),
            icon: icon.into(),
            rdns: rdns.into(),
        }
    }
}

// ============================================================================
// Provider
// ============================================================================

/// A provider object that can be registered on a page.
///
/// Implemented by this wallet's [`InpageProvider`](super::InpageProvider)
/// and by [`ExternalProvider`] for everything else page code assigns.
pub trait Provider: Any + Send + Sync + fmt::Debug {
    /// EIP-6963 identity, when the provider has one.
    fn info(&self) -> Option<&ProviderInfo> {
        None
    }

    /// The legacy "looks like MetaMask" flag.
    fn is_metamask(&self) -> bool {
        false
    }

    /// Set on this wallet's provider.
    fn is_opn(&self) -> bool {
        false
    }

    /// Upcast for downcasting to the concrete provider type.
    fn as_any(&self) -> &dyn Any;
}

// ============================================================================
// ExternalProvider
// ============================================================================

/// A provider injected by some other script on the page.
///
/// Only the detection flags are interpreted; the rest is kept as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalProvider {
    /// Optional identity.
    pub info: Option<ProviderInfo>,

    /// Claims to be MetaMask.
    pub is_metamask: bool,

    /// Raw object as assigned.
    pub raw: Value,
}

impl ExternalProvider {
    /// Wraps an arbitrary assigned value.
    ///
    /// Reads `isMetaMask` and an `info` object when present.
    #[must_use]
    pub fn from_value(raw: Value) -> Self {
        let is_metamask = raw
            .get("isMetaMask")
            .and_then(Value::as_bool)
            .unwrap_or_default();

        let info = raw
            .get("info")
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        Self {
            info,
            is_metamask,
            raw,
        }
    }
}

impl Provider for ExternalProvider {
    fn info(&self) -> Option<&ProviderInfo> {
        self.info.as_ref()
    }

    fn is_metamask(&self) -> bool {
        self.is_metamask
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// ProviderDetail
// ============================================================================

/// EIP-6963 announcement payload.
#[derive(Debug, Clone)]
pub struct ProviderDetail {
    /// Identity.
    pub info: ProviderInfo,

    /// The announced provider.
    pub provider: Arc<dyn Provider>,
}

// ============================================================================
// Tests
// ============================================================================
