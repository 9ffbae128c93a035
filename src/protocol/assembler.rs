//! Reassembly of fragmented inbound messages (RFC 6455 Section 5.4).

use bytes::{Bytes, BytesMut};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// A fully assembled WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledMessage {
    /// Opcode of the first fragment (Text or Binary).
    pub opcode: OpCode,
    /// Concatenated payload of all fragments in arrival order.
    pub payload: Bytes,
}

/// Reassembles fragmented data messages into one buffer.
///
/// At most one message is open at a time. Its opcode is set by the first
/// fragment and every later fragment must be a continuation.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    fragment_count: usize,
    opcode: Option<OpCode>,
    limits: Limits,
}

impl MessageAssembler {
    /// Create an assembler enforcing `limits`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            fragment_count: 0,
            opcode: None,
            limits,
        }
    }

    /// Add a data frame to the message being assembled.
    ///
    /// Returns `Some(message)` once a frame with FIN=1 completes it.
    /// Control frames are ignored and leave the open message untouched.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolViolation` for a continuation with nothing open, or a
    ///   new Text/Binary frame while a message is open. The frame is dropped
    ///   and the open message is kept.
    /// - `Error::TooManyFragments` / `Error::MessageTooLarge` when a limit is
    ///   exceeded. The open message is discarded.
    pub fn push(&mut self, frame: Frame) -> Result<Option<AssembledMessage>> {
        if frame.opcode.is_control() {
            return Ok(None);
        }

        let opcode = match (frame.opcode, self.opcode) {
            (OpCode::Continuation, Some(open)) => open,
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolViolation(
                    "Unexpected continuation frame".into(),
                ));
            }
            (_, Some(_)) => {
                return Err(Error::ProtocolViolation(
                    "Expected continuation frame".into(),
                ));
            }
            (opcode, None) => opcode,
        };

        // Unfragmented message: hand the payload through without copying.
        if frame.fin && self.opcode.is_none() {
            self.limits.check_message_size(frame.payload().len())?;
            return Ok(Some(AssembledMessage {
                opcode,
                payload: frame.into_payload(),
            }));
        }

        let checked = self
            .limits
            .check_fragment_count(self.fragment_count + 1)
            .and_then(|()| {
                self.limits
                    .check_message_size(self.buffer.len() + frame.payload().len())
            });
        if let Err(err) = checked {
            self.reset();
            return Err(err);
        }

        self.opcode = Some(opcode);
        self.buffer.extend_from_slice(frame.payload());
        self.fragment_count += 1;

        if frame.fin {
            let payload = self.buffer.split().freeze();
            self.reset();
            Ok(Some(AssembledMessage { opcode, payload }))
        } else {
            Ok(None)
        }
    }

    /// Whether a fragmented message is currently open.
    #[must_use]
    pub fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Number of fragments buffered for the open message.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    /// Discard any open message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.fragment_count = 0;
        self.opcode = None;
    }
}
