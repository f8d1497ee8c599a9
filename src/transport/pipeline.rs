//! Stream ⇄ multiplexer pump.
//!
//! Wires `transport → multiplexer → transport` on a spawned task. The
//! completion callback runs exactly once, when either direction stops.
//!
//! When the pump stops, the multiplexer's sub-streams stop receiving, so
//! their consumers see the end of input and fail what they were waiting
//! on. The transport itself is never ended from here, and nothing reacts
//! to page unload: the realm going away on navigation is the only
//! teardown.

// ============================================================================
// Imports
// ============================================================================

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::multiplex::{Frame, ObjectMultiplex};

use super::post_message::{PostMessageReader, PostMessageStream, PostMessageWriter};

// ============================================================================
// pipeline
// ============================================================================

/// Pumps frames between `stream` and `mux` until the stream ends.
///
/// `on_close` receives the error that stopped the pipeline; an ended bus
/// is reported as [`Error::ConnectionClosed`] ("Premature close"). Every
/// sub-stream of `mux` is ended before `on_close` runs.
///
/// A multiplexer can be piped once; a second attempt completes
/// immediately with [`Error::Protocol`].
pub fn pipeline<F>(stream: PostMessageStream, mux: &ObjectMultiplex, on_close: F) -> JoinHandle<()>
where
    F: FnOnce(Option<Error>) + Send + 'static,
{
    let name = stream.name().to_string();
    let outbound = mux.take_outbound();
    let mux = mux.clone();

    tokio::spawn(async move {
        let Some(mut outbound) = outbound else {
            on_close(Some(Error::protocol("multiplexer is already piped")));
            return;
        };

        let (mut reader, writer) = stream.split();
        let result = pump(&mut reader, &writer, &mux, &mut outbound).await;

        mux.end_streams();
        debug!(name = %name, "Pipeline finished");
        on_close(result.err());
    })
}

/// Runs both directions; returns when one of them stops.
async fn pump(
    reader: &mut PostMessageReader,
    writer: &PostMessageWriter,
    mux: &ObjectMultiplex,
    outbound: &mut tokio::sync::mpsc::UnboundedReceiver<Frame>,
) -> Result<()> {
    loop {
        tokio::select! {
            // Transport → multiplexer
            inbound = reader.read() => {
                match inbound {
                    Some(message) => {
                        let routed = mux.dispatch(message);
                        trace!(?routed, "Inbound frame");
                    }
                    None => return Err(Error::ConnectionClosed),
                }
            }

            // Multiplexer → transport
            frame = outbound.recv() => {
                match frame {
                    Some(frame) => writer.write(frame.encode())?,
                    None => return Ok(()),
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
