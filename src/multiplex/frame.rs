//! Multiplexer wire frame.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Frame
// ============================================================================

/// One message on the shared transport, tagged with its sub-stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Sub-stream name.
    pub name: String,

    /// Sub-stream payload.
    pub data: Value,
}

impl Frame {
    /// Creates a new frame.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Decodes a frame from a transport message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the message is not an object with a
    /// string `name` and a `data` field.
    pub fn decode(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::protocol(format!("malformed multiplex frame: {e}")))
    }

    /// Encodes the frame as a transport message.
    #[must_use]
    pub fn encode(self) -> Value {
        let mut map = serde_json::Map::with_capacity(2);
        map.insert("name".to_string(), Value::String(self.name));
        map.insert("data".to_string(), self.data);
        Value::Object(map)
    }
}

// ============================================================================
// Tests
// ============================================================================
