//! Page message transport.
//!
//! This module carries JSON messages between the page context and the
//! content script over the page's shared `postMessage` bus.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                          ┌──────────────────┐
//! │  Page (inpage)   │                          │  Content script  │
//! │                  │        MessageBus        │                  │
//! │ PostMessageStream│◄────────────────────────►│ PostMessageStream│
//! │  "opn-inpage"    │   { target, data }       │"opn-contentscript│
//! └────────┬─────────┘                          └──────────────────┘
//!          │ pipeline
//!          ▼
//!   ObjectMultiplex ──► Substream("opn-provider") ──► InpageProvider
//! ```
//!
//! # Stream Lifecycle
//!
//! 1. `PostMessageStream::new` - Subscribe to the bus and post `SYN`
//! 2. Peer answers `ACK` - Buffered writes are flushed in order
//! 3. `pipeline` - Route frames between the stream and a multiplexer
//! 4. Bus closes - Sub-streams end, pipeline reports once; the stream is never ended
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bus` | Page-wide broadcast bus |
//! | `post_message` | Named duplex stream with handshake |
//! | `pipeline` | Stream ⇄ multiplexer pump |

// ============================================================================
// Submodules
// ============================================================================

/// Page-wide broadcast bus.
pub mod bus;

/// Named duplex stream over the bus.
pub mod post_message;

/// Stream ⇄ multiplexer pump.
pub mod pipeline;

// ============================================================================
// Re-exports
// ============================================================================

pub use bus::{Envelope, MessageBus};
pub use pipeline::pipeline;
pub use post_message::{PostMessageReader, PostMessageStream, PostMessageWriter};
