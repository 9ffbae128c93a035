//! Application callbacks and the handle they use to talk back.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::connection::{ConnectionState, Shared};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame};
use crate::protocol::OpCode;

/// Connection event callbacks.
///
/// Each callback runs on the task that detected the event (handshake, run
/// loop, or periodic task) and delays that task until it returns, so
/// callbacks should not block indefinitely. All methods default to no-ops.
///
/// ```
/// use async_trait::async_trait;
/// use bytes::Bytes;
/// use wsclient::{Handler, OpCode, Sender};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Handler for Echo {
///     async fn on_message(&self, sender: &Sender, opcode: OpCode, payload: Bytes) {
///         let _ = sender.send(opcode, payload).await;
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// The handshake succeeded and the connection is `Open`.
    async fn on_open(&self, _sender: &Sender) {}

    /// A complete Text or Binary message arrived. Fragmented messages are
    /// delivered once, reassembled, with the opcode of the first fragment.
    async fn on_message(&self, _sender: &Sender, _opcode: OpCode, _payload: Bytes) {}

    /// The run loop exited.
    async fn on_close(&self) {}

    /// Something went wrong; see [`Error::kind`] for how it was handled.
    async fn on_error(&self, _error: &Error) {}

    /// The periodic interval elapsed.
    async fn on_periodic(&self, _sender: &Sender) {}
}

/// Handler that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl Handler for NoopHandler {}

/// Cloneable handle for sending on a connection.
///
/// Sends are serialized by the connection's send lock, so a fragmented
/// message from one sender is never interleaved with frames from another.
#[derive(Clone)]
pub struct Sender {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("state", &self.state())
            .finish()
    }
}

impl Sender {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Send a message, fragmenting it if it exceeds the configured frame size.
    ///
    /// Sending a Close frame this way moves the connection to `Closing`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` unless the connection is `Open`; nothing is written
    /// - `Error::EmptyPayload` for an empty Text or Binary message
    /// - `Error::ControlFrameTooLarge` for a control payload over 125 bytes
    /// - `Error::Io` if the transport write fails
    pub async fn send(&self, opcode: OpCode, payload: impl Into<Bytes>) -> Result<()> {
        self.shared.send(opcode, payload.into()).await
    }

    /// Send a Text message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(OpCode::Text, Bytes::from(text.into())).await
    }

    /// Send a Binary message.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_binary(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send(OpCode::Binary, data).await
    }

    /// Send a Ping.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn ping(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send(OpCode::Ping, data).await
    }

    /// Start a graceful close with status 1000 and `reason`, then request
    /// teardown.
    ///
    /// Returns without waiting for the run loop; use
    /// [`Client::close`](crate::Client::close) to wait.
    ///
    /// # Errors
    ///
    /// See [`close_with`](Self::close_with).
    pub async fn close(&self, reason: &str) -> Result<()> {
        self.close_with(CloseCode::Normal, reason).await
    }

    /// Start a graceful close with a chosen status code, then request
    /// teardown.
    ///
    /// The close frame is only sent if no close frame has been sent yet.
    /// The connection moves to `Quit` even if sending fails.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCloseCode` for codes reserved for local use
    /// - `Error::ControlFrameTooLarge` if the reason exceeds 123 bytes
    /// - `Error::Io` if the close frame could not be written
    pub async fn close_with(&self, code: CloseCode, reason: &str) -> Result<()> {
        if code.is_reserved() {
            return Err(Error::InvalidCloseCode(code.as_u16()));
        }
        let payload = CloseFrame::new(code, reason).to_payload();
        crate::codec::FrameEncoder::check(OpCode::Close, &payload)?;

        let sent = self.shared.begin_close(Bytes::from(payload)).await;
        self.stop();
        sent.map(|_| ())
    }

    /// Request teardown without sending a close frame.
    ///
    /// The run loop notices on its next iteration, i.e. after the frame it is
    /// currently waiting for arrives or the stream ends.
    pub fn stop(&self) {
        self.shared.advance(ConnectionState::Quit);
        self.shared.cancel.cancel();
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrameEncoder;
    use crate::protocol::Frame;
    use tokio::io::AsyncReadExt;

    async fn open_sender() -> (Sender, tokio::io::DuplexStream) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (_reader, writer) = crate::transport::split(client, 1024);
        let shared = Arc::new(Shared::new(FrameEncoder::new(16 * 1024)));
        shared.install_writer(writer).await;
        shared.advance(ConnectionState::Open);
        (Sender::new(shared), server)
    }

    async fn read_frame(server: &mut tokio::io::DuplexStream) -> Frame {
        let mut buf = Vec::new();
        loop {
            if let Some((frame, _)) = Frame::parse(&buf).unwrap() {
                return frame;
            }
            let mut chunk = [0u8; 256];
            let n = server.read(&mut chunk).await.unwrap();
            assert!(n > 0, "stream closed");
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    #[tokio::test]
    async fn test_send_text() {
        let (sender, mut server) = open_sender().await;
        sender.send_text("hi").await.unwrap();

        let frame = read_frame(&mut server).await;
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload(), b"hi");
    }

    #[tokio::test]
    async fn test_send_rejected_while_connecting() {
        let shared = Arc::new(Shared::new(FrameEncoder::default()));
        let sender = Sender::new(shared);
        assert_eq!(
            sender.send_text("x").await,
            Err(Error::InvalidState(ConnectionState::Connecting))
        );
    }

    #[tokio::test]
    async fn test_send_after_close_writes_nothing() {
        let (sender, mut server) = open_sender().await;
        sender.close("bye").await.unwrap();
        let close = read_frame(&mut server).await;
        assert_eq!(close.opcode, OpCode::Close);
        assert_eq!(close.payload(), &[0x03, 0xe8, b'b', b'y', b'e']);
        assert_eq!(sender.state(), ConnectionState::Quit);

        assert_eq!(
            sender.send_binary(vec![1u8, 2, 3]).await,
            Err(Error::InvalidState(ConnectionState::Quit))
        );

        // Nothing follows the close frame.
        let pending = tokio::time::timeout(std::time::Duration::from_millis(50), async {
            let mut byte = [0u8; 1];
            server.read(&mut byte).await
        })
        .await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_send_close_opcode_moves_to_closing() {
        let (sender, _server) = open_sender().await;
        sender
            .send(OpCode::Close, CloseFrame::new(CloseCode::Normal, "").to_payload())
            .await
            .unwrap();
        assert_eq!(sender.state(), ConnectionState::Closing);
        assert!(sender.send_text("late").await.is_err());
    }

    #[tokio::test]
    async fn test_close_sent_once() {
        let (sender, mut server) = open_sender().await;
        sender.close("first").await.unwrap();
        sender.close("second").await.unwrap();

        let frame = read_frame(&mut server).await;
        assert_eq!(&frame.payload()[2..], b"first");
        let pending =
            tokio::time::timeout(std::time::Duration::from_millis(50), read_frame(&mut server))
                .await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_close_with_reserved_code() {
        let (sender, _server) = open_sender().await;
        assert_eq!(
            sender.close_with(CloseCode::Other(1006), "").await,
            Err(Error::InvalidCloseCode(1006))
        );
        assert_eq!(sender.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_stop_without_close_frame() {
        let (sender, _server) = open_sender().await;
        sender.stop();
        assert_eq!(sender.state(), ConnectionState::Quit);
        assert!(sender.shared().cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let (sender, _server) = open_sender().await;
        assert_eq!(sender.send_text("").await, Err(Error::EmptyPayload));
        assert!(sender.ping(Bytes::new()).await.is_ok());
    }
}
