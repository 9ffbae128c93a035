//! Frame codec over the split transport.
//!
//! The encoder turns one outgoing message into masked frames written under the
//! send lock; the decoder pulls exactly one inbound frame per call.

mod decoder;
mod encoder;

pub use decoder::FrameDecoder;
pub use encoder::FrameEncoder;
