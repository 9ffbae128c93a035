//! WebSocket frame layout and header encoding (RFC 6455 Section 5.2).

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest possible header: 2 fixed bytes, 8 length bytes, 4 mask bytes.
pub const MAX_HEADER_SIZE: usize = 14;

/// The two fixed bytes at the start of every frame.
///
/// The opcode is kept raw so that a frame with a reserved opcode can still be
/// consumed from the stream before it is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHead {
    /// Final fragment flag.
    pub fin: bool,
    /// Low nibble of the first byte.
    pub raw_opcode: u8,
    /// Whether a masking key follows the length.
    pub masked: bool,
    /// The 7-bit length field.
    pub len_code: u8,
}

impl FrameHead {
    /// Split the two fixed header bytes into their fields.
    #[inline]
    #[must_use]
    pub const fn parse(bytes: [u8; 2]) -> Self {
        Self {
            fin: bytes[0] & 0x80 != 0,
            raw_opcode: bytes[0] & 0x0F,
            masked: bytes[1] & 0x80 != 0,
            len_code: bytes[1] & 0x7F,
        }
    }

    /// Number of extended length bytes following the fixed header.
    #[inline]
    #[must_use]
    pub const fn extended_len_size(&self) -> usize {
        match self.len_code {
            126 => 2,
            127 => 8,
            _ => 0,
        }
    }

    /// Payload length given the extended length bytes (empty for short frames).
    #[must_use]
    pub fn payload_len(&self, extended: &[u8]) -> u64 {
        match (self.len_code, extended.len()) {
            (126, 2) => u64::from(u16::from_be_bytes([extended[0], extended[1]])),
            (127, 8) => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(extended);
                u64::from_be_bytes(raw)
            }
            (code, _) => u64::from(code),
        }
    }

    /// Resolve the raw opcode.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedOpcode` for opcodes outside RFC 6455 base framing.
    pub fn opcode(&self) -> Result<OpCode> {
        OpCode::from_u8(self.raw_opcode)
    }
}

/// A single WebSocket frame.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                     Masking key (client frames)               |
/// +---------------------------------------------------------------+
/// |                          Payload data                         |
/// +---------------------------------------------------------------+
/// ```
///
/// Reserved bits are always written as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            opcode,
            payload: payload.into(),
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    /// Create a final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    /// Create a close frame with an optional status code and reason.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = code.to_be_bytes().to_vec();
                data.extend_from_slice(reason.as_bytes());
                data
            }
            None => Vec::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Check the control frame rules of RFC 6455 Section 5.5.
    ///
    /// # Errors
    ///
    /// - `Error::FragmentedControlFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control frame payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len()));
            }
        }
        Ok(())
    }

    /// Append the wire form of this frame to `buf`.
    ///
    /// With `Some(mask)` the mask bit is set, the key is written after the
    /// length and the payload is XORed with it. Client frames always pass a
    /// mask; `None` produces a server-style frame.
    pub fn encode(&self, buf: &mut BytesMut, mask: Option<[u8; 4]>) {
        let payload_len = self.payload.len();
        buf.reserve(self.wire_size(mask.is_some()));

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        buf.put_u8(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        if payload_len <= 125 {
            buf.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= 65535 {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(payload_len as u16);
        } else {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(payload_len as u64);
        }

        match mask {
            Some(key) => {
                buf.put_slice(&key);
                let start = buf.len();
                buf.put_slice(&self.payload);
                apply_mask_fast(&mut buf[start..], key);
            }
            None => buf.put_slice(&self.payload),
        }
    }

    /// Parse one complete frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` if `buf` does not yet hold the whole frame, otherwise
    /// the frame (unmasked) and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// - `Error::ReservedOpcode` if a reserved opcode is used
    /// - `Error::FrameTooLarge` if the declared length does not fit in memory
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>> {
        if buf.len() < 2 {
            return Ok(None);
        }
        let head = FrameHead::parse([buf[0], buf[1]]);
        let opcode = head.opcode()?;

        let ext = head.extended_len_size();
        let mask_len = if head.masked { 4 } else { 0 };
        let header_len = 2 + ext + mask_len;
        if buf.len() < header_len {
            return Ok(None);
        }

        let declared = head.payload_len(&buf[2..2 + ext]);
        let payload_len = usize::try_from(declared).map_err(|_| Error::FrameTooLarge {
            size: declared,
            max: usize::MAX,
        })?;
        let total = header_len
            .checked_add(payload_len)
            .ok_or(Error::FrameTooLarge {
                size: declared,
                max: usize::MAX - header_len,
            })?;
        if buf.len() < total {
            return Ok(None);
        }

        let mut payload = BytesMut::from(&buf[header_len..total]);
        if head.masked {
            let key = [
                buf[2 + ext],
                buf[3 + ext],
                buf[4 + ext],
                buf[5 + ext],
            ];
            apply_mask_fast(&mut payload, key);
        }

        Ok(Some((Self::new(head.fin, opcode, payload.freeze()), total)))
    }

    /// Size of this frame on the wire.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload.len();
        let extended_len_size = if payload_len <= 125 {
            0
        } else if payload_len <= 65535 {
            2
        } else {
            8
        };
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }
}
