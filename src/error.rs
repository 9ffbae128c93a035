//! Error types for the WebSocket client.
//!
//! Every error belongs to one [`ErrorKind`], which decides how the run loop
//! reacts to it: protocol and state errors are reported and the connection
//! carries on, everything else ends the task that hit it.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Result type alias for WebSocket client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The client could not be constructed.
    Construction,
    /// URI, connection establishment, or HTTP upgrade failed.
    Handshake,
    /// Read or write failure on the underlying stream.
    Transport,
    /// The peer sent something the protocol does not allow.
    Protocol,
    /// The operation is not allowed in the current connection state.
    State,
}

/// Errors that can occur during WebSocket client operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Threaded operation was requested outside of a tokio runtime.
    #[error("No tokio runtime available to spawn connection tasks")]
    NoRuntime,

    /// The URI could not be parsed.
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// The URI scheme is neither `ws` nor `wss`.
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// TCP connection could not be established.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// TLS setup or session establishment failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Invalid WebSocket handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake response exceeded the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes read so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// The peer closed the stream.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Control frame fragmented (RFC violation).
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared frame payload size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Text or binary message with no payload.
    #[error("Payload data is empty")]
    EmptyPayload,

    /// Invalid close code.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Operation not allowed in the current state.
    #[error("Operation not allowed while {0}")]
    InvalidState(ConnectionState),
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::NoRuntime => ErrorKind::Construction,
            Error::InvalidUri(_)
            | Error::UnsupportedScheme(_)
            | Error::Connect(_)
            | Error::Tls(_)
            | Error::InvalidHandshake(_)
            | Error::HandshakeTooLarge { .. } => ErrorKind::Handshake,
            Error::Io(_) | Error::ConnectionClosed => ErrorKind::Transport,
            Error::InvalidState(_) => ErrorKind::State,
            Error::ProtocolViolation(_)
            | Error::ReservedOpcode(_)
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. }
            | Error::EmptyPayload
            | Error::InvalidCloseCode(_) => ErrorKind::Protocol,
        }
    }

    /// Whether the task that produced this error must stop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Construction | ErrorKind::Handshake | ErrorKind::Transport
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
