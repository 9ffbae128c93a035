//! Client connection state machine.

/// Lifecycle state of a client connection.
///
/// States are ordered. A connection only ever moves forward through
/// `Connecting -> Open -> Closing -> Quit`, possibly skipping states, and
/// never returns to `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ConnectionState {
    /// Handshake not yet completed.
    #[default]
    Connecting,
    /// Handshake succeeded; messages may flow both ways.
    Open,
    /// A close frame has been sent or echoed; no further sends.
    Closing,
    /// Teardown requested; the run loop exits before its next frame.
    Quit,
}

impl ConnectionState {
    /// Check if sending data is allowed in this state.
    ///
    /// Returns `true` only for `Open` state.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Check if a close frame has already been sent or teardown requested.
    #[must_use]
    #[inline]
    pub const fn is_closing(&self) -> bool {
        matches!(self, ConnectionState::Closing | ConnectionState::Quit)
    }

    /// Move to `next` if it lies ahead of the current state.
    ///
    /// Returns `true` if the state changed.
    pub fn advance(&mut self, next: ConnectionState) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Quit => write!(f, "Quit"),
        }
    }
}
