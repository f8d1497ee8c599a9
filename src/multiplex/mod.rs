//! Object stream multiplexing.
//!
//! Splits one transport stream into independently flowing named
//! sub-streams. Every message on the transport is a [`Frame`]:
//!
//! ```json
//! { "name": "opn-provider", "data": { "jsonrpc": "2.0", ... } }
//! ```
//!
//! Frames are routed by `name`; a message written to one sub-stream is
//! never delivered to another. Within a sub-stream, order is preserved.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Wire frame |
//! | `mux` | [`ObjectMultiplex`] routing table |
//! | `substream` | [`Substream`] halves |

// ============================================================================
// Submodules
// ============================================================================

/// Wire frame.
pub mod frame;

/// Multiplexer routing table.
pub mod mux;

/// Named logical channel.
pub mod substream;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::Frame;
pub use mux::{ObjectMultiplex, Routed};
pub use substream::{Substream, SubstreamReceiver, SubstreamSender};
