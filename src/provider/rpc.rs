//! JSON-RPC 2.0 message types.
//!
//! The provider and the multichain transport share these.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// Protocol version tag.
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// JsonRpcRequest
// ============================================================================

/// A request from the page.
///
/// # Format
///
/// ```json
/// { "jsonrpc": "2.0", "id": "uuid", "method": "eth_chainId", "params": [] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,

    /// Correlation id.
    pub id: RequestId,

    /// Method name.
    pub method: String,

    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Creates a request with a fresh id.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: RequestId::generate(),
            method: method.into(),
            params,
        }
    }
}

// ============================================================================
// JsonRpcResponse
// ============================================================================

/// A response from the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Result (if success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error (if failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Extracts the result value, returning error if response was an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] carrying the wallet's code and message.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::rpc(error.code, error.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code (EIP-1193 / JSON-RPC).
    pub code: i64,

    /// Human-readable message.
    pub message: String,

    /// Extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ============================================================================
// JsonRpcNotification
// ============================================================================

/// A message without an id, pushed by the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Notification name.
    pub method: String,

    /// Payload.
    #[serde(default)]
    pub params: Value,
}

// ============================================================================
// Incoming
// ============================================================================

/// Any message the wallet can send to the page.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Answer to a request.
    Response(JsonRpcResponse),
    /// Unsolicited event.
    Notification(JsonRpcNotification),
}

impl Incoming {
    /// Classifies a raw message.
    ///
    /// Messages with an `id` are responses; messages with a `method` and no
    /// `id` are notifications.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for anything else.
    pub fn parse(message: Value) -> Result<Self> {
        let has_id = message.get("id").is_some_and(|id| !id.is_null());

        if has_id {
            return serde_json::from_value(message)
                .map(Self::Response)
                .map_err(|e| Error::protocol(format!("invalid JSON-RPC response: {e}")));
        }

        if message.get("method").is_some() {
            return serde_json::from_value(message)
                .map(Self::Notification)
                .map_err(|e| Error::protocol(format!("invalid JSON-RPC notification: {e}")));
        }

        Err(Error::protocol("message is neither response nor notification"))
    }
}

// ============================================================================
// Tests
// ============================================================================
