//! Splitting outgoing messages into frames.

use bytes::Bytes;

use crate::protocol::{Frame, OpCode};

/// Iterator over the frames of one outgoing message.
///
/// Produces `ceil(len / fragment_size)` frames (one frame for an empty
/// payload). The first frame carries the message opcode, later frames carry
/// `OpCode::Continuation`, and only the last has FIN set. Frames share the
/// payload buffer rather than copying it.
#[derive(Debug, Clone)]
pub struct MessageFragmenter {
    payload: Bytes,
    opcode: OpCode,
    fragment_size: usize,
    offset: usize,
    emitted: bool,
}

impl MessageFragmenter {
    /// Create a fragmenter; a `fragment_size` of zero is treated as one.
    #[inline]
    #[must_use]
    pub fn new(payload: Bytes, opcode: OpCode, fragment_size: usize) -> Self {
        Self {
            payload,
            opcode,
            fragment_size: fragment_size.max(1),
            offset: 0,
            emitted: false,
        }
    }

    /// Total number of frames this message produces.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.payload.len().div_ceil(self.fragment_size).max(1)
    }

    /// Payload bytes not yet handed out.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.payload.len() - self.offset
    }
}

impl Iterator for MessageFragmenter {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted && self.offset >= self.payload.len() {
            return None;
        }

        let end = (self.offset + self.fragment_size).min(self.payload.len());
        let chunk = self.payload.slice(self.offset..end);
        let opcode = if self.emitted {
            OpCode::Continuation
        } else {
            self.opcode
        };

        self.offset = end;
        self.emitted = true;

        Some(Frame::new(end == self.payload.len(), opcode, chunk))
    }
}
