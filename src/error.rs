//! Error types for the inpage bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use opn_inpage::{Error, Result};
//!
//! async fn example(provider: &InpageProvider) -> Result<()> {
//!     let chain_id = provider.request("eth_chainId", None).await?;
//!     println!("{chain_id}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::ConnectionClosed`], [`Error::Transport`] |
//! | Multiplexing | [`Error::SubstreamExists`], [`Error::Protocol`] |
//! | RPC | [`Error::Rpc`], [`Error::RequestTimeout`], [`Error::TooManyPending`] |
//! | Page realm | [`Error::PropertyRedefinition`], [`Error::BindingNotWritable`] |
//! | External | [`Error::Json`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;
use std::time::Duration;

use thiserror::Error;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Build configuration error.
    ///
    /// Returned when a required build value is missing or malformed.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport stream failed.
    #[error("Transport error on \"{stream}\": {message}")]
    Transport {
        /// Name of the stream that failed.
        stream: String,
        /// Description of the failure.
        message: String,
    },

    /// Stream closed before the operation could complete.
    #[error("Premature close")]
    ConnectionClosed,

    // ========================================================================
    // Multiplexing Errors
    // ========================================================================
    /// A sub-stream with the same name is already registered.
    #[error("ObjectMultiplex - Substream for name \"{name}\" already exists")]
    SubstreamExists {
        /// The duplicated sub-stream name.
        name: String,
    },

    /// Malformed frame or unexpected message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // RPC Errors
    // ========================================================================
    /// JSON-RPC error response from the wallet.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// Request was not answered in time.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Pending request limit reached.
    #[error("Too many pending requests: {pending}/{max}")]
    TooManyPending {
        /// Requests currently awaiting a response.
        pending: usize,
        /// Configured maximum.
        max: usize,
    },

    // ========================================================================
    // Page Realm Errors
    // ========================================================================
    /// Attempt to redefine or delete a non-configurable property.
    #[error("Cannot redefine property: {name}")]
    PropertyRedefinition {
        /// Property name.
        name: String,
    },

    /// Attempt to write a read-only global binding.
    #[error("Cannot assign to read only property '{name}'")]
    BindingNotWritable {
        /// Binding name.
        name: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Creates a duplicate sub-stream error.
    #[inline]
    pub fn substream_exists(name: impl Into<String>) -> Self {
        Self::SubstreamExists { name: name.into() }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an RPC error.
    #[inline]
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// Creates a request timeout error. Saturates at `u64::MAX` ms.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout: Duration) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Creates a property redefinition error.
    #[inline]
    pub fn property_redefinition(name: impl Into<String>) -> Self {
        Self::PropertyRedefinition { name: name.into() }
    }

    /// Creates a read-only binding error.
    #[inline]
    pub fn binding_not_writable(name: impl Into<String>) -> Self {
        Self::BindingNotWritable { name: name.into() }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::ConnectionClosed)
    }

    /// Returns `true` if the page realm rejected a global mutation.
    #[inline]
    #[must_use]
    pub fn is_realm_error(&self) -> bool {
        matches!(
            self,
            Self::PropertyRedefinition { .. } | Self::BindingNotWritable { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::transport("opn-inpage", "bus closed");
        assert_eq!(
            err.to_string(),
            "Transport error on \"opn-inpage\": bus closed"
        );
    }

    #[test]
    fn test_substream_exists_display() {
        let err = Error::substream_exists("opn-provider");
        assert_eq!(
            err.to_string(),
            "ObjectMultiplex - Substream for name \"opn-provider\" already exists"
        );
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::transport("a", "b").is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_is_timeout() {
        let err = Error::request_timeout(RequestId::generate(), Duration::from_secs(1));
        assert!(err.is_timeout());
        assert!(!Error::rpc(4001, "rejected").is_timeout());
    }

    #[test]
    fn test_request_timeout_saturates() {
        let err = Error::request_timeout(RequestId::generate(), Duration::MAX);
        assert!(matches!(
            err,
            Error::RequestTimeout {
                timeout_ms: u64::MAX,
                ..
            }
        ));

        let err = Error::request_timeout(RequestId::generate(), Duration::from_millis(1500));
        assert!(matches!(err, Error::RequestTimeout { timeout_ms: 1500, .. }));
    }

    #[test]
    fn test_is_realm_error() {
        assert!(Error::property_redefinition("ethereum").is_realm_error());
        assert!(Error::binding_not_writable("define").is_realm_error());
        assert!(!Error::ConnectionClosed.is_realm_error());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
