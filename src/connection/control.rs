//! Reactions to inbound control frames.

use crate::error::{Error, Result};
use crate::handler::Sender;
use crate::message::CloseFrame;
use crate::protocol::{Frame, OpCode};

/// Handle a Close, Ping or Pong frame received from the server.
///
/// - Close: echo the payload and move to `Closing`, unless a close frame was
///   already sent, in which case nothing is written.
/// - Ping: reply with a Pong carrying the same payload while `Open`.
/// - Pong: nothing to do.
///
/// Reserved control opcodes never get here; the decoder rejects them.
///
/// # Errors
///
/// `Error::ProtocolViolation` for a non-control frame, or the transport error
/// if a reply could not be written.
pub(crate) async fn handle_control(sender: &Sender, frame: Frame) -> Result<()> {
    match frame.opcode {
        OpCode::Close => {
            match CloseFrame::parse(frame.payload()) {
                Some(close) => tracing::info!(code = %close.code, reason = %close.reason, "received close frame"),
                None => tracing::info!("received close frame without status"),
            }
            if sender.shared().begin_close(frame.into_payload()).await? {
                tracing::debug!("close frame echoed");
            } else {
                tracing::debug!(state = %sender.state(), "close already in progress, not echoing");
            }
            Ok(())
        }
        OpCode::Ping => match sender.send(OpCode::Pong, frame.into_payload()).await {
            Ok(()) => Ok(()),
            Err(Error::InvalidState(state)) => {
                tracing::debug!(%state, "not answering ping");
                Ok(())
            }
            Err(err) => Err(err),
        },
        OpCode::Pong => {
            tracing::trace!(len = frame.payload().len(), "pong received");
            Ok(())
        }
        other => Err(Error::ProtocolViolation(format!(
            "Unhandled control frame: {}",
            other
        ))),
    }
}
