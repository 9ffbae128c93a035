//! Connection lifecycle: handshake, run loop, periodic task and teardown.
//!
//! ```text
//!  Client::new ──spawn──> handshake task ──> Open, on_open
//!  Client::start ──join──┘        │
//!                                 ├──spawn──> run loop: read frame ─> control handler
//!                                 │              │                  └> assembler ─> on_message
//!                                 │              └─ exit: on_close, stop periodic, shut down writer
//!                                 └──spawn──> periodic task: sleep ─> on_periodic
//! ```
//!
//! With `Config::threaded` off, the handshake and run loop execute inside
//! [`Client::start`] and the periodic callback is polled alongside the run
//! loop on the same task.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::{FrameDecoder, FrameEncoder};
use crate::config::Config;
use crate::connection::ConnectionState;
use crate::connection::control::handle_control;
use crate::error::{Error, Result};
use crate::handler::{Handler, Sender};
use crate::message::CloseCode;
use crate::protocol::handshake::read_response_head;
use crate::protocol::{Frame, HandshakeRequest, HandshakeResponse, MessageAssembler, OpCode};
use crate::transport::{self, BoxedReader, BoxedWriter, FrameReader};
use crate::uri::Target;

/// State shared by the client, its tasks, and every [`Sender`].
///
/// The state lock is never held across an await. Writers take the send lock
/// first and read the state while holding it; close paths claim `Closing`
/// under the state lock first and then take the send lock.
pub(crate) struct Shared {
    state: Mutex<ConnectionState>,
    writer: AsyncMutex<Option<BoxedWriter>>,
    encoder: FrameEncoder,
    pub(crate) cancel: CancellationToken,
}

impl Shared {
    pub(crate) fn new(encoder: FrameEncoder) -> Self {
        Self {
            state: Mutex::new(ConnectionState::Connecting),
            writer: AsyncMutex::new(None),
            encoder,
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub(crate) fn advance(&self, next: ConnectionState) -> bool {
        let changed = self.state.lock().advance(next);
        if changed {
            tracing::debug!(state = %next, "connection state changed");
        }
        changed
    }

    /// Move to `Closing` unless a close is already under way.
    fn claim_close(&self) -> bool {
        let mut state = self.state.lock();
        !state.is_closing() && state.advance(ConnectionState::Closing)
    }

    pub(crate) async fn install_writer(&self, writer: BoxedWriter) {
        *self.writer.lock().await = Some(writer);
    }

    pub(crate) async fn send(&self, opcode: OpCode, payload: Bytes) -> Result<()> {
        FrameEncoder::check(opcode, &payload)?;

        if opcode == OpCode::Close {
            let state = self.state();
            if !state.can_send() || !self.claim_close() {
                return Err(Error::InvalidState(self.state()));
            }
            return self.write_unchecked(opcode, payload).await;
        }

        let mut guard = self.writer.lock().await;
        let state = self.state();
        if !state.can_send() {
            return Err(Error::InvalidState(state));
        }
        let writer = guard.as_mut().ok_or(Error::InvalidState(state))?;
        self.encoder.write_message(writer, opcode, payload).await?;
        Ok(())
    }

    /// Send a close frame with `payload` if none has been sent yet.
    ///
    /// Returns whether a close frame was written.
    pub(crate) async fn begin_close(&self, payload: Bytes) -> Result<bool> {
        if !self.claim_close() {
            return Ok(false);
        }
        tracing::info!("closing connection");
        self.write_unchecked(OpCode::Close, payload).await?;
        Ok(true)
    }

    async fn write_unchecked(&self, opcode: OpCode, payload: Bytes) -> Result<()> {
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(writer) => {
                self.encoder.write_message(writer, opcode, payload).await?;
            }
            None => tracing::debug!(%opcode, "no transport yet, frame dropped"),
        }
        Ok(())
    }

    /// Shut down and drop the write half. Idempotent.
    pub(crate) async fn shutdown_transport(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(err) = writer.shutdown().await {
                tracing::debug!(error = %err, "transport shutdown failed");
            }
        }
    }
}

/// Handshake over an already-connected stream.
///
/// On success the write half is installed in `shared` and the buffered read
/// half is returned for the run loop.
pub(crate) async fn upgrade<S>(
    stream: S,
    target: &Target,
    config: &Config,
    shared: &Shared,
) -> Result<FrameReader<BoxedReader>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = transport::split(stream, config.read_chunk_size);

    let request = HandshakeRequest::new(target.host_header.clone(), target.path.clone())?;
    let mut buf = Vec::with_capacity(256);
    request.write(&mut buf);
    transport::write_all(&mut writer, &buf).await?;

    let head = read_response_head(&mut reader, config.limits.max_handshake_size)
        .await
        .map_err(|err| match err {
            Error::ConnectionClosed => {
                Error::InvalidHandshake("Connection closed before handshake completed".into())
            }
            other => other,
        })?;
    HandshakeResponse::parse(&head)?.validate(&request.expected_accept())?;

    shared.install_writer(writer).await;
    Ok(reader)
}

async fn open(uri: &str, config: &Config, shared: &Shared) -> Result<FrameReader<BoxedReader>> {
    let target = Target::parse(uri)?;
    tracing::debug!(host = %target.host, port = target.port, secure = target.secure, "connecting");
    let stream = transport::connect(&target, config).await?;
    upgrade(stream, &target, config, shared).await
}

/// The handshake task: open the transport, upgrade, then report the outcome.
async fn handshake(
    uri: String,
    config: Config,
    shared: Arc<Shared>,
    handler: Arc<dyn Handler>,
) -> Result<FrameReader<BoxedReader>> {
    let outcome = open(&uri, &config, &shared).await;
    finish_handshake(&uri, shared, handler, outcome).await
}

/// Move to `Open` and call `on_open`, or report the handshake failure.
///
/// If teardown was requested while the handshake ran, the connection never
/// opens: the transport is released and `Error::InvalidState` is returned
/// without invoking any callback.
async fn finish_handshake(
    uri: &str,
    shared: Arc<Shared>,
    handler: Arc<dyn Handler>,
    outcome: Result<FrameReader<BoxedReader>>,
) -> Result<FrameReader<BoxedReader>> {
    match outcome {
        Ok(reader) => {
            if !shared.advance(ConnectionState::Open) {
                let state = shared.state();
                tracing::debug!(%uri, %state, "teardown requested during handshake");
                shared.shutdown_transport().await;
                return Err(Error::InvalidState(state));
            }
            tracing::info!(%uri, "handshake complete");
            handler.on_open(&Sender::new(shared)).await;
            Ok(reader)
        }
        Err(err) => {
            tracing::error!(%uri, error = %err, "handshake failed");
            handler.on_error(&err).await;
            Err(err)
        }
    }
}

/// Read frames and dispatch them until teardown is requested or the stream ends.
///
/// Teardown is only noticed between frames: a read in progress is not
/// interrupted by [`Client::stop`] or the cancellation token.
pub(crate) async fn run_loop<R>(
    shared: Arc<Shared>,
    handler: Arc<dyn Handler>,
    mut reader: FrameReader<R>,
    config: &Config,
) where
    R: AsyncRead + Unpin,
{
    let sender = Sender::new(shared.clone());
    let decoder = FrameDecoder::new(config.limits.clone());
    let mut assembler = MessageAssembler::new(config.limits.clone());

    loop {
        if shared.cancel.is_cancelled() || shared.state() == ConnectionState::Quit {
            tracing::debug!("teardown requested");
            break;
        }

        let outcome = match decoder.read_frame(&mut reader).await {
            Ok(frame) => dispatch(&sender, handler.as_ref(), &mut assembler, frame).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {}
            Err(err) if err.is_fatal() => {
                let state = shared.state();
                if state.is_closing() {
                    tracing::debug!(error = %err, %state, "stream ended during close");
                } else {
                    tracing::error!(error = %err, "run loop terminated");
                    handler.on_error(&err).await;
                }
                break;
            }
            Err(err) => {
                tracing::warn!(error = %err, "protocol error");
                handler.on_error(&err).await;
            }
        }
    }

    shared.advance(ConnectionState::Quit);
    shared.cancel.cancel();
    tracing::info!("run loop exited");
    handler.on_close().await;
    shared.shutdown_transport().await;
}

async fn dispatch(
    sender: &Sender,
    handler: &dyn Handler,
    assembler: &mut MessageAssembler,
    frame: Frame,
) -> Result<()> {
    if frame.opcode.is_control() {
        return handle_control(sender, frame).await;
    }
    if let Some(message) = assembler.push(frame)? {
        tracing::debug!(opcode = %message.opcode, len = message.payload.len(), "message received");
        handler
            .on_message(sender, message.opcode, message.payload)
            .await;
    }
    Ok(())
}

/// Invoke `on_periodic` every `interval` until the token is cancelled.
async fn periodic_loop(shared: Arc<Shared>, handler: Arc<dyn Handler>, interval: Duration) {
    let sender = Sender::new(shared.clone());
    loop {
        tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => handler.on_periodic(&sender).await,
        }
    }
    tracing::debug!("periodic task stopped");
}

/// Run loop plus periodic callback, as one future.
async fn session(
    shared: Arc<Shared>,
    handler: Arc<dyn Handler>,
    reader: FrameReader<BoxedReader>,
    config: Config,
) {
    let Some(interval) = config.periodic() else {
        run_loop(shared, handler, reader, &config).await;
        return;
    };

    if config.threaded {
        let periodic = tokio::spawn(periodic_loop(shared.clone(), handler.clone(), interval));
        run_loop(shared, handler, reader, &config).await;
        periodic.abort();
    } else {
        let periodic = async {
            periodic_loop(shared.clone(), handler.clone(), interval).await;
            std::future::pending::<()>().await;
        };
        tokio::select! {
            () = run_loop(shared.clone(), handler.clone(), reader, &config) => {}
            () = periodic => {}
        }
    }
}

/// A client-side WebSocket connection.
///
/// ```no_run
/// use wsclient::{Client, Config, NoopHandler};
///
/// # async fn demo() -> wsclient::Result<()> {
/// let mut client = Client::new("ws://127.0.0.1:9001/echo", Config::default(), NoopHandler)?;
/// client.start().await?;
/// client.send_text("hello").await?;
/// client.close("bye").await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    uri: String,
    config: Config,
    handler: Arc<dyn Handler>,
    shared: Arc<Shared>,
    handshake: Option<JoinHandle<Result<FrameReader<BoxedReader>>>>,
    run: Option<JoinHandle<()>>,
    started: bool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("uri", &self.uri)
            .field("state", &self.state())
            .field("threaded", &self.config.threaded)
            .finish()
    }
}

impl Client {
    /// Create a client for `uri` in state `Connecting`.
    ///
    /// With `config.threaded` the handshake task is spawned immediately;
    /// otherwise it runs inside [`start`](Self::start). URI and connection
    /// errors are reported through `on_error` and returned by `start`.
    ///
    /// # Errors
    ///
    /// `Error::NoRuntime` if threaded operation is requested outside a tokio
    /// runtime.
    pub fn new(uri: impl Into<String>, config: Config, handler: impl Handler) -> Result<Self> {
        let uri = uri.into();
        let handler: Arc<dyn Handler> = Arc::new(handler);
        let shared = Arc::new(Shared::new(FrameEncoder::new(config.fragment_size)));

        let handshake_task = if config.threaded {
            let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
            Some(runtime.spawn(handshake(
                uri.clone(),
                config.clone(),
                shared.clone(),
                handler.clone(),
            )))
        } else {
            None
        };

        Ok(Self {
            uri,
            config,
            handler,
            shared,
            handshake: handshake_task,
            run: None,
            started: false,
        })
    }

    /// Finish the handshake and start the run loop.
    ///
    /// Threaded: waits for the handshake task, spawns the run loop and the
    /// periodic task, and returns. Inline: performs the handshake and then
    /// runs the loop to completion before returning.
    ///
    /// # Errors
    ///
    /// The handshake error (already passed to `on_error`), after which the
    /// client must not be used. `Error::InvalidState` if called twice, or if
    /// [`stop`](Self::stop) or [`close`](Self::close) ran before the handshake
    /// finished; `on_open` is not called in that case.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::InvalidState(self.state()));
        }
        self.started = true;

        let reader = match self.handshake.take() {
            Some(task) => task
                .await
                .map_err(|e| Error::Io(format!("handshake task failed: {}", e)))??,
            None => {
                handshake(
                    self.uri.clone(),
                    self.config.clone(),
                    self.shared.clone(),
                    self.handler.clone(),
                )
                .await?
            }
        };

        let session = session(
            self.shared.clone(),
            self.handler.clone(),
            reader,
            self.config.clone(),
        );
        if self.config.threaded {
            self.run = Some(tokio::spawn(session));
        } else {
            session.await;
        }
        Ok(())
    }

    /// Wait for the run loop to finish. Returns immediately if it is not running.
    ///
    /// Cancel-safe: if the returned future is dropped, a later call waits again.
    pub async fn wait(&mut self) {
        if let Some(task) = self.run.as_mut() {
            let result = task.await;
            self.run = None;
            if let Err(err) = result {
                tracing::error!(error = %err, "run loop task failed");
            }
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// A cloneable handle for sending from other tasks.
    #[must_use]
    pub fn sender(&self) -> Sender {
        Sender::new(self.shared.clone())
    }

    /// Send a message. See [`Sender::send`].
    ///
    /// # Errors
    ///
    /// See [`Sender::send`].
    pub async fn send(&self, opcode: OpCode, payload: impl Into<Bytes>) -> Result<()> {
        self.shared.send(opcode, payload.into()).await
    }

    /// Send a Text message.
    ///
    /// # Errors
    ///
    /// See [`Sender::send`].
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.sender().send_text(text).await
    }

    /// Send a Binary message.
    ///
    /// # Errors
    ///
    /// See [`Sender::send`].
    pub async fn send_binary(&self, data: impl Into<Bytes>) -> Result<()> {
        self.sender().send_binary(data).await
    }

    /// Send a Ping.
    ///
    /// # Errors
    ///
    /// See [`Sender::send`].
    pub async fn ping(&self, data: impl Into<Bytes>) -> Result<()> {
        self.sender().ping(data).await
    }

    /// Close gracefully with status 1000 and wait for the run loop.
    ///
    /// # Errors
    ///
    /// See [`close_with`](Self::close_with).
    pub async fn close(&mut self, reason: &str) -> Result<()> {
        self.close_with(CloseCode::Normal, reason).await
    }

    /// Close gracefully with a chosen status code and wait for the run loop.
    ///
    /// Sends a close frame unless one was already sent, marks the connection
    /// `Quit`, waits for the run loop and releases the transport. The run
    /// loop exits once the server answers or drops the connection.
    ///
    /// # Errors
    ///
    /// See [`Sender::close_with`]. Teardown happens regardless.
    pub async fn close_with(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        let result = self.sender().close_with(code, reason).await;
        if result.is_err() {
            self.stop();
        }
        if let Some(task) = self.handshake.take() {
            task.abort();
        }
        self.wait().await;
        self.shared.shutdown_transport().await;
        result
    }

    /// Request teardown without a close frame. See [`Sender::stop`].
    pub fn stop(&self) {
        self.sender().stop();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(task) = self.handshake.take() {
            task.abort();
        }
        // A detached run loop ends after its next frame.
        if self.run.is_some() {
            self.stop();
        }
    }
}
