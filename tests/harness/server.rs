//! WebSocket test server.
//!
//! Provides a TestServer that accepts connections on a random port and runs
//! a session closure for each one.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wsclient::Limits;
use wsclient::compute_accept_key;
use wsclient::protocol::{Frame, MessageAssembler, OpCode};

pub trait Io: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

/// Server end of one connection, positioned after the client's request head.
pub struct ServerConn {
    stream: Box<dyn Io>,
    buf: BytesMut,
    pub request: String,
}

impl ServerConn {
    /// Read the upgrade request from `stream`.
    pub async fn read_request(stream: impl Io + 'static) -> Self {
        let mut stream: Box<dyn Io> = Box::new(stream);
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            stream.read_exact(&mut byte).await.unwrap();
            head.push(byte[0]);
        }
        Self {
            stream,
            buf: BytesMut::new(),
            request: String::from_utf8(head).unwrap(),
        }
    }

    /// Value of a request header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }

    /// Answer with a valid 101 response.
    pub async fn accept(&mut self) {
        let key = self.header("Sec-WebSocket-Key").unwrap().to_string();
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
            compute_accept_key(&key)
        );
        self.write_raw(response.as_bytes()).await;
    }

    pub async fn write_raw(&mut self, data: &[u8]) {
        self.stream.write_all(data).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Write one unmasked frame.
    pub async fn write_frame(&mut self, frame: &Frame) {
        let mut buf = BytesMut::new();
        frame.encode(&mut buf, None);
        self.write_raw(&buf).await;
    }

    /// Read one frame, or `None` once the client hangs up.
    pub async fn read_frame(&mut self) -> Option<Frame> {
        loop {
            if let Some((frame, used)) = Frame::parse(&self.buf).unwrap() {
                assert!(self.buf[1] & 0x80 != 0, "client frame not masked");
                let _ = self.buf.split_to(used);
                return Some(frame);
            }
            let mut chunk = [0u8; 4096];
            match self.stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return None,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
            }
        }
    }
}

/// Accept the upgrade, then echo every message until the client closes.
///
/// Pings are answered and a close frame is echoed before returning.
pub async fn echo_session(mut conn: ServerConn) {
    conn.accept().await;
    let mut assembler = MessageAssembler::new(Limits::default());

    while let Some(frame) = conn.read_frame().await {
        match frame.opcode {
            OpCode::Ping => conn.write_frame(&Frame::pong(frame.into_payload())).await,
            OpCode::Pong => {}
            OpCode::Close => {
                conn.write_frame(&Frame::new(true, OpCode::Close, frame.into_payload()))
                    .await;
                return;
            }
            _ => {
                if let Some(message) = assembler.push(frame).unwrap() {
                    conn.write_frame(&Frame::new(true, message.opcode, message.payload))
                        .await;
                }
            }
        }
    }
}

/// Accepts TCP connections and runs a session per connection.
pub struct TestServer {
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Spawn a server on a random local port.
    pub async fn spawn<F, Fut>(session: F) -> (Self, SocketAddr)
    where
        F: Fn(ServerConn) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let session = Arc::new(session);

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let session = session.clone();
                tokio::spawn(async move {
                    let conn = ServerConn::read_request(stream).await;
                    session(conn).await;
                });
            }
        });

        (Self { handle }, addr)
    }

    /// Spawn an echo server.
    pub async fn echo() -> (Self, SocketAddr) {
        Self::spawn(echo_session).await
    }

    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}
