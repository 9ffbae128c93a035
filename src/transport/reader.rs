//! Chunk-buffered reading from the transport.

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};

/// Buffered reader over the read half of the transport.
///
/// When the buffer runs dry a single read of at most `chunk_size` bytes is
/// issued; byte requests are served from the buffer until it is exhausted.
/// A read returning zero bytes is end-of-stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    io: R,
    buf: BytesMut,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap `io`, reading at most `chunk_size` bytes per underlying read.
    #[must_use]
    pub fn new(io: R, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            io,
            buf: BytesMut::with_capacity(chunk_size),
            chunk_size,
        }
    }

    /// Bytes already received but not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    async fn fill(&mut self) -> Result<()> {
        self.buf.reserve(self.chunk_size);
        let n = (&mut self.io)
            .take(self.chunk_size as u64)
            .read_buf(&mut self.buf)
            .await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    /// Read a single byte.
    ///
    /// # Errors
    ///
    /// `Error::ConnectionClosed` at end-of-stream, `Error::Io` on read failure.
    pub async fn read_byte(&mut self) -> Result<u8> {
        if self.buf.is_empty() {
            self.fill().await?;
        }
        Ok(self.buf.get_u8())
    }

    /// Read exactly `n` bytes, issuing as many underlying reads as needed.
    ///
    /// # Errors
    ///
    /// `Error::ConnectionClosed` if the stream ends first, `Error::Io` on read failure.
    pub async fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        while self.buf.len() < n {
            // Large payloads: grow straight to the target to avoid repeated reallocation.
            if n - self.buf.len() > self.chunk_size {
                self.buf.reserve(n - self.buf.len());
            }
            self.fill().await?;
        }
        Ok(self.buf.split_to(n).freeze())
    }

    /// Read `N` bytes into an array.
    ///
    /// # Errors
    ///
    /// Same as [`read_exact`](Self::read_exact).
    pub async fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        for byte in &mut out {
            *byte = self.read_byte().await?;
        }
        Ok(out)
    }

    /// Discard `n` bytes without buffering them all.
    ///
    /// # Errors
    ///
    /// Same as [`read_exact`](Self::read_exact).
    pub async fn skip(&mut self, mut n: u64) -> Result<()> {
        loop {
            let take = self.buf.len().min(usize::try_from(n).unwrap_or(usize::MAX));
            self.buf.advance(take);
            n -= take as u64;
            if n == 0 {
                return Ok(());
            }
            self.fill().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Reader that records the size of every read request.
    struct CountingReader {
        data: Vec<u8>,
        pos: usize,
        reads: Vec<usize>,
    }

    impl AsyncRead for CountingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let remaining = buf.remaining();
            self.reads.push(remaining);
            let n = remaining.min(self.data.len() - self.pos);
            let start = self.pos;
            buf.put_slice(&self.data[start..start + n]);
            self.pos += n;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_read_byte_serves_from_buffer() {
        let data = vec![1u8, 2, 3, 4, 5];
        let mut reader = FrameReader::new(
            CountingReader {
                data,
                pos: 0,
                reads: Vec::new(),
            },
            1024,
        );

        for expected in 1..=5u8 {
            assert_eq!(reader.read_byte().await.unwrap(), expected);
        }
        assert_eq!(reader.io.reads.len(), 1);
        assert!(reader.io.reads[0] <= 1024);
    }

    #[tokio::test]
    async fn test_read_exact_across_chunks() {
        let data: Vec<u8> = (0..100u8).collect();
        let mut reader = FrameReader::new(&data[..], 16);

        let first = reader.read_exact(40).await.unwrap();
        assert_eq!(&first[..], &data[..40]);
        let second = reader.read_exact(60).await.unwrap();
        assert_eq!(&second[..], &data[40..]);
    }

    #[tokio::test]
    async fn test_chunk_size_bounds_each_read() {
        let mut reader = FrameReader::new(
            CountingReader {
                data: vec![0u8; 50],
                pos: 0,
                reads: Vec::new(),
            },
            8,
        );
        reader.read_exact(3).await.unwrap();
        assert_eq!(reader.buffered(), 5);
        assert!(reader.io.reads.iter().all(|&n| n <= 8));
    }

    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        let data = [1u8, 2];
        let mut reader = FrameReader::new(&data[..], 1024);
        assert_eq!(reader.read_exact(3).await, Err(Error::ConnectionClosed));

        let mut reader = FrameReader::new(&b""[..], 1024);
        assert_eq!(reader.read_byte().await, Err(Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_skip_and_array() {
        let data: Vec<u8> = (0..20u8).collect();
        let mut reader = FrameReader::new(&data[..], 4);

        reader.skip(10).await.unwrap();
        let arr: [u8; 2] = reader.read_array().await.unwrap();
        assert_eq!(arr, [10, 11]);
        reader.skip(0).await.unwrap();
        assert_eq!(reader.read_byte().await.unwrap(), 12);
        assert_eq!(reader.skip(100).await, Err(Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_read_error_is_io() {
        struct Failing;
        impl AsyncRead for Failing {
            fn poll_read(
                self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
                _buf: &mut ReadBuf<'_>,
            ) -> Poll<std::io::Result<()>> {
                Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "reset",
                )))
            }
        }

        let mut reader = FrameReader::new(Failing, 16);
        assert!(matches!(reader.read_byte().await, Err(Error::Io(_))));
    }
}
