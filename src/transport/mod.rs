//! Byte-stream transport: plain TCP or TLS, chosen once at connect time.
//!
//! After connecting, the stream is split. The read half goes to a
//! [`FrameReader`] owned by the handshake and then the run loop; the write
//! half sits behind the connection's send lock.

mod reader;

pub use reader::FrameReader;

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::uri::Target;

/// Read half of a connected transport.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a connected transport.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A TCP stream, optionally wrapped in TLS.
pub enum MaybeTlsStream {
    /// Unencrypted `ws` connection.
    Plain(TcpStream),
    /// TLS-backed `wss` connection.
    #[cfg(feature = "tls-rustls")]
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl std::fmt::Debug for MaybeTlsStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaybeTlsStream::Plain(_) => f.write_str("MaybeTlsStream::Plain"),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(_) => f.write_str("MaybeTlsStream::Tls"),
        }
    }
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_flush(cx),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            MaybeTlsStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(feature = "tls-rustls")]
            MaybeTlsStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Open the transport for `target`: TCP connect, then TLS for `wss`.
///
/// # Errors
///
/// - `Error::Connect` if DNS resolution or the TCP connect fails
/// - `Error::Tls` if TLS is unavailable or the TLS session cannot be established
pub async fn connect(target: &Target, config: &Config) -> Result<MaybeTlsStream> {
    let address = target.address();
    let tcp = TcpStream::connect(&address)
        .await
        .map_err(|e| Error::Connect(format!("{}: {}", address, e)))?;
    let _ = tcp.set_nodelay(true);

    if !target.secure {
        return Ok(MaybeTlsStream::Plain(tcp));
    }

    #[cfg(feature = "tls-rustls")]
    {
        let tls_config = match &config.tls {
            Some(tls) => tls.clone(),
            None => crate::tls::client_config_with_native_roots(),
        };
        let stream = crate::tls::connect(tls_config, &target.server_name, tcp).await?;
        Ok(MaybeTlsStream::Tls(Box::new(stream)))
    }

    #[cfg(not(feature = "tls-rustls"))]
    {
        let _ = (tcp, config);
        Err(Error::Tls("TLS support not enabled".into()))
    }
}

/// Split a duplex stream into a buffered reader and a boxed write half.
pub fn split<S>(stream: S, chunk_size: usize) -> (FrameReader<BoxedReader>, BoxedWriter)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let reader: BoxedReader = Box::new(read_half);
    let writer: BoxedWriter = Box::new(write_half);
    (FrameReader::new(reader, chunk_size), writer)
}

/// Write all of `data` and flush.
///
/// Short writes are retried until the buffer is drained; a write that makes
/// no progress surfaces as `Error::Io`.
///
/// # Errors
///
/// `Error::Io` if the underlying write or flush fails.
pub async fn write_all<W>(writer: &mut W, data: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}
