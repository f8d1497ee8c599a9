//! Global values and property descriptors.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::ptr;
use std::sync::Arc;

use serde_json::Value;

use crate::provider::Provider;

use super::registry::{EthereumAccessor, ProviderRegistry};

// ============================================================================
// GlobalValue
// ============================================================================

/// A value bound to a page global.
#[derive(Clone)]
pub enum GlobalValue {
    /// `undefined`.
    Undefined,

    /// Plain data.
    Json(Value),

    /// A provider object.
    Provider(Arc<dyn Provider>),

    /// A live provider list.
    Providers(ProviderRegistry),

    /// Any other host object (functions, shims).
    Object(Arc<dyn Any + Send + Sync>),
}

impl GlobalValue {
    /// Wraps a host object.
    #[inline]
    #[must_use]
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Arc::new(value))
    }

    /// Returns the host object as `T`, if it is one.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Object(object) => Arc::clone(object).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Returns `true` for `undefined`.
    #[inline]
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Best-effort JSON view; non-data values read as `null`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            _ => Value::Null,
        }
    }
}

impl PartialEq for GlobalValue {
    /// Data compares by value, objects by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Provider(a), Self::Provider(b)) => ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Self::Providers(a), Self::Providers(b)) => a.same_as(b),
            (Self::Object(a), Self::Object(b)) => ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Debug for GlobalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Json(value) => write!(f, "{value}"),
            Self::Provider(provider) => write!(f, "{provider:?}"),
            Self::Providers(registry) => write!(f, "Providers(len={})", registry.len()),
            Self::Object(_) => f.write_str("[object]"),
        }
    }
}

// ============================================================================
// Property
// ============================================================================

/// A property descriptor on the window.
#[derive(Clone, Debug)]
pub enum Property {
    /// Data property.
    Data {
        /// Bound value.
        value: GlobalValue,
        /// Assignable.
        writable: bool,
        /// Redefinable and deletable.
        configurable: bool,
        /// Listed by [`Window::keys`](super::Window::keys).
        enumerable: bool,
    },

    /// The `ethereum` accessor: always non-configurable and enumerable.
    Ethereum(EthereumAccessor),
}

impl Property {
    /// A property as created by plain assignment.
    #[inline]
    #[must_use]
    pub fn data(value: GlobalValue) -> Self {
        Self::Data {
            value,
            writable: true,
            configurable: true,
            enumerable: true,
        }
    }

    /// A frozen, enumerable property.
    #[inline]
    #[must_use]
    pub fn read_only(value: GlobalValue) -> Self {
        Self::Data {
            value,
            writable: false,
            configurable: false,
            enumerable: true,
        }
    }

    /// Returns `true` if the property may be redefined or deleted.
    #[inline]
    #[must_use]
    pub fn is_configurable(&self) -> bool {
        match self {
            Self::Data { configurable, .. } => *configurable,
            Self::Ethereum(_) => false,
        }
    }

    /// Returns `true` if the property is enumerable.
    #[inline]
    #[must_use]
    pub fn is_enumerable(&self) -> bool {
        match self {
            Self::Data { enumerable, .. } => *enumerable,
            Self::Ethereum(_) => true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
