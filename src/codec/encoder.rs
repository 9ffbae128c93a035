//! Outbound message encoding: fragmentation and masking.

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWrite;

use crate::connection::MessageFragmenter;
use crate::error::{Error, Result};
use crate::protocol::{MAX_CONTROL_FRAME_PAYLOAD, OpCode, generate_mask};
use crate::transport;

/// Serializes outgoing messages into masked client frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    fragment_size: usize,
}

impl FrameEncoder {
    /// Create an encoder splitting payloads at `fragment_size` bytes per frame.
    #[must_use]
    pub fn new(fragment_size: usize) -> Self {
        Self {
            fragment_size: fragment_size.max(1),
        }
    }

    /// Maximum payload bytes per data frame.
    #[must_use]
    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    /// Check that `payload` may be sent with `opcode`.
    ///
    /// # Errors
    ///
    /// - `Error::EmptyPayload` for an empty Text or Binary payload
    /// - `Error::ControlFrameTooLarge` for a control payload over 125 bytes
    /// - `Error::ProtocolViolation` for a bare Continuation
    pub fn check(opcode: OpCode, payload: &[u8]) -> Result<()> {
        match opcode {
            OpCode::Text | OpCode::Binary if payload.is_empty() => Err(Error::EmptyPayload),
            OpCode::Continuation => Err(Error::ProtocolViolation(
                "Continuation frames are only produced by fragmentation".into(),
            )),
            op if op.is_control() && payload.len() > MAX_CONTROL_FRAME_PAYLOAD => {
                Err(Error::ControlFrameTooLarge(payload.len()))
            }
            _ => Ok(()),
        }
    }

    fn fragmenter(&self, opcode: OpCode, payload: Bytes) -> MessageFragmenter {
        // Control frames are never fragmented.
        let size = if opcode.is_control() {
            MAX_CONTROL_FRAME_PAYLOAD
        } else {
            self.fragment_size
        };
        MessageFragmenter::new(payload, opcode, size)
    }

    /// Encode a whole message into one buffer with the given masking key.
    ///
    /// The same key masks every frame of the message.
    #[must_use]
    pub fn encode(&self, opcode: OpCode, payload: Bytes, mask: [u8; 4]) -> BytesMut {
        let mut buf = BytesMut::new();
        for frame in self.fragmenter(opcode, payload) {
            frame.encode(&mut buf, Some(mask));
        }
        buf
    }

    /// Encode a message and write its frames one after another.
    ///
    /// The caller must hold the send lock for the whole call so frames of two
    /// messages never interleave. One masking key is drawn per call.
    /// Returns the number of frames written.
    ///
    /// # Errors
    ///
    /// The checks of [`check`](Self::check), or `Error::Io` if a write fails.
    pub async fn write_message<W>(
        &self,
        writer: &mut W,
        opcode: OpCode,
        payload: Bytes,
    ) -> Result<usize>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        Self::check(opcode, &payload)?;

        let mask = generate_mask();
        let fragmenter = self.fragmenter(opcode, payload);
        let total = fragmenter.frame_count();
        let mut buf = BytesMut::new();

        for (index, frame) in fragmenter.enumerate() {
            buf.clear();
            frame.encode(&mut buf, Some(mask));
            tracing::debug!(
                opcode = %opcode,
                frame = index + 1,
                of = total,
                fin = frame.fin,
                len = frame.payload().len(),
                "sending frame"
            );
            transport::write_all(writer, &buf).await?;
        }

        Ok(total)
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(16 * 1024)
    }
}
