//! Inbound frame decoding: exactly one frame per call.

use tokio::io::AsyncRead;

use crate::config::Limits;
use crate::error::Result;
use crate::protocol::{Frame, FrameHead, apply_mask_fast};
use crate::transport::FrameReader;

/// Reads frames from the transport.
///
/// Errors of kind `Protocol` leave the stream positioned at the next frame,
/// so the caller can report them and keep reading. Transport errors mean the
/// stream is unusable.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    limits: Limits,
}

impl FrameDecoder {
    /// Create a decoder enforcing `limits.max_frame_size`.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Read one complete frame.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` / `Error::Io` from the transport
    /// - `Error::FrameTooLarge` if the declared length exceeds the limit; the
    ///   payload is skipped
    /// - `Error::ReservedOpcode` for opcodes outside base framing; the payload
    ///   is skipped
    /// - `Error::FragmentedControlFrame` / `Error::ControlFrameTooLarge` for
    ///   control frames breaking RFC 6455 Section 5.5
    pub async fn read_frame<R>(&self, reader: &mut FrameReader<R>) -> Result<Frame>
    where
        R: AsyncRead + Unpin,
    {
        let head = FrameHead::parse(reader.read_array::<2>().await?);

        let extended = reader.read_exact(head.extended_len_size()).await?;
        let len = head.payload_len(&extended);

        let mask = if head.masked {
            Some(reader.read_array::<4>().await?)
        } else {
            None
        };

        if let Err(err) = self.limits.check_frame_size(len) {
            tracing::warn!(len, max = self.limits.max_frame_size, "skipping oversized frame");
            reader.skip(len).await?;
            return Err(err);
        }

        let opcode = match head.opcode() {
            Ok(opcode) => opcode,
            Err(err) => {
                tracing::warn!(raw_opcode = head.raw_opcode, len, "skipping frame with reserved opcode");
                reader.skip(len).await?;
                return Err(err);
            }
        };

        // Checked against max_frame_size above.
        let len = len as usize;
        let payload = match mask {
            Some(key) => {
                tracing::warn!(%opcode, "server frame is masked");
                let mut data = reader.read_exact(len).await?.to_vec();
                apply_mask_fast(&mut data, key);
                data.into()
            }
            None => reader.read_exact(len).await?,
        };

        let frame = Frame::new(head.fin, opcode, payload);
        tracing::debug!(%opcode, fin = frame.fin, len, "received frame");
        frame.validate()?;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::OpCode;
    use bytes::BytesMut;

    fn server_bytes(frames: &[Frame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            frame.encode(&mut buf, None);
        }
        buf.to_vec()
    }

    #[tokio::test]
    async fn test_read_unmasked_text() {
        let data = [0x81, 0x05, b'H', b'e', b'l', b'l', b'o'];
        let mut reader = FrameReader::new(&data[..], 1024);

        let frame = FrameDecoder::new(Limits::default())
            .read_frame(&mut reader)
            .await
            .unwrap();
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload(), b"Hello");
    }

    #[tokio::test]
    async fn test_read_each_length_class() {
        for len in [0usize, 1, 125, 126, 65535, 65536, 200_000] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
            let data = server_bytes(&[Frame::binary(payload.clone())]);
            let mut reader = FrameReader::new(&data[..], 1024);

            let frame = FrameDecoder::new(Limits::default())
                .read_frame(&mut reader)
                .await
                .unwrap();
            assert_eq!(frame.payload(), &payload[..], "len {}", len);
        }
    }

    #[tokio::test]
    async fn test_reads_one_frame_per_call() {
        let data = server_bytes(&[
            Frame::new(false, OpCode::Text, "Hel"),
            Frame::ping("p"),
            Frame::new(true, OpCode::Continuation, "lo"),
        ]);
        let mut reader = FrameReader::new(&data[..], 1024);
        let decoder = FrameDecoder::new(Limits::default());

        let first = decoder.read_frame(&mut reader).await.unwrap();
        assert!(!first.fin);
        assert_eq!(decoder.read_frame(&mut reader).await.unwrap().opcode, OpCode::Ping);
        let last = decoder.read_frame(&mut reader).await.unwrap();
        assert_eq!(last.opcode, OpCode::Continuation);
        assert_eq!(
            decoder.read_frame(&mut reader).await,
            Err(Error::ConnectionClosed)
        );
    }

    #[tokio::test]
    async fn test_masked_server_frame_is_unmasked() {
        let data = [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
        let mut reader = FrameReader::new(&data[..], 1024);
        let frame = FrameDecoder::new(Limits::default())
            .read_frame(&mut reader)
            .await
            .unwrap();
        assert_eq!(frame.payload(), b"Hello");
    }

    #[tokio::test]
    async fn test_oversized_frame_skipped() {
        let mut data = server_bytes(&[Frame::binary(vec![0u8; 2000])]);
        data.extend(server_bytes(&[Frame::text("next")]));
        let mut reader = FrameReader::new(&data[..], 256);
        let decoder = FrameDecoder::new(Limits::new(1024, 4096, 8, 4096));

        let err = decoder.read_frame(&mut reader).await.unwrap_err();
        assert_eq!(err, Error::FrameTooLarge { size: 2000, max: 1024 });
        assert!(!err.is_fatal());

        let next = decoder.read_frame(&mut reader).await.unwrap();
        assert_eq!(next.payload(), b"next");
    }

    #[tokio::test]
    async fn test_reserved_opcode_skipped() {
        let data = [0x8B, 0x02, 0xAA, 0xBB, 0x8A, 0x00];
        let mut reader = FrameReader::new(&data[..], 1024);
        let decoder = FrameDecoder::new(Limits::default());

        assert_eq!(
            decoder.read_frame(&mut reader).await,
            Err(Error::ReservedOpcode(0xB))
        );
        assert_eq!(decoder.read_frame(&mut reader).await.unwrap().opcode, OpCode::Pong);
    }

    #[tokio::test]
    async fn test_fragmented_control_frame_rejected() {
        let data = [0x09, 0x01, b'x', 0x8A, 0x00];
        let mut reader = FrameReader::new(&data[..], 1024);
        let decoder = FrameDecoder::new(Limits::default());

        assert_eq!(
            decoder.read_frame(&mut reader).await,
            Err(Error::FragmentedControlFrame)
        );
        assert_eq!(decoder.read_frame(&mut reader).await.unwrap().opcode, OpCode::Pong);
    }

    #[tokio::test]
    async fn test_truncated_payload_is_transport_error() {
        let data = [0x82, 0x05, 1, 2];
        let mut reader = FrameReader::new(&data[..], 1024);
        let err = FrameDecoder::new(Limits::default())
            .read_frame(&mut reader)
            .await
            .unwrap_err();
        assert_eq!(err, Error::ConnectionClosed);
        assert!(err.is_fatal());
    }
}
