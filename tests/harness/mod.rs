//! Test harness for driving the client against an in-process server.
//!
//! The server side speaks just enough RFC 6455 to exercise the client:
//! it answers the upgrade, reads masked frames and writes unmasked ones.

#![allow(dead_code)]

mod recorder;
mod server;

pub use recorder::{Event, Recorder, next_event};
pub use server::{ServerConn, TestServer, echo_session};

/// Route client logs to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
