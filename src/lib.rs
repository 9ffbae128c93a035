//! # wsclient - Client-side WebSocket engine
//!
//! `wsclient` connects to a `ws://` or `wss://` endpoint, performs the
//! RFC 6455 opening handshake, and runs the connection on tokio tasks,
//! delivering events to a [`Handler`].
//!
//! ## Features
//!
//! - **Fragmentation** of large outgoing messages, one masking key per message
//! - **Reassembly** of fragmented inbound messages within configurable [`Limits`]
//! - **Automatic control handling**: pings answered, close frames echoed
//! - **Periodic callback** for keepalives and housekeeping
//! - **TLS** via rustls behind the `tls-rustls` feature
//!
//! ## Quick Start
//!
//! ```no_run
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use wsclient::{Client, Config, Handler, OpCode, Sender};
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl Handler for Printer {
//!     async fn on_message(&self, _sender: &Sender, opcode: OpCode, payload: Bytes) {
//!         println!("{}: {} bytes", opcode, payload.len());
//!     }
//! }
//!
//! # async fn demo() -> wsclient::Result<()> {
//! let mut client = Client::new("ws://127.0.0.1:9001/", Config::default(), Printer)?;
//! client.start().await?;
//! client.send_text("Hello").await?;
//! client.close("bye").await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod protocol;
pub mod transport;
pub mod uri;

#[cfg(feature = "tls-rustls")]
pub mod tls;

pub use config::{Config, Limits};
pub use connection::{Client, ConnectionState};
pub use error::{Error, ErrorKind, Result};
pub use handler::{Handler, NoopHandler, Sender};
pub use message::{CloseCode, CloseFrame};
pub use protocol::{OpCode, compute_accept_key};
pub use uri::Target;
