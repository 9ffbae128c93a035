//! Connection lifecycle and the state machine behind it.
//!
//! ## Connection Lifecycle
//!
//! 1. **Connecting** - Created, handshake not finished
//! 2. **Open** - Handshake succeeded, messages flow both ways
//! 3. **Closing** - A close frame was sent or received
//! 4. **Quit** - Teardown requested; the run loop exits after its current frame
//!
//! ## Example
//!
//! ```no_run
//! use wsclient::{Client, Config, NoopHandler};
//!
//! # async fn demo() -> wsclient::Result<()> {
//! let mut client = Client::new("ws://example.com/socket", Config::default(), NoopHandler)?;
//! client.start().await?;
//! client.send_text("Hello").await?;
//! client.close("done").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod control;
mod fragmenter;
mod state;

pub use client::Client;
pub(crate) use client::Shared;
pub use fragmenter::MessageFragmenter;
pub use state::ConnectionState;
