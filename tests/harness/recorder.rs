//! Handler that forwards every callback to a channel.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use wsclient::{Error, Handler, OpCode, Sender};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Open,
    Message(OpCode, Vec<u8>),
    Close,
    Error(Error),
    Periodic,
}

pub struct Recorder {
    tx: mpsc::UnboundedSender<Event>,
}

impl Recorder {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Handler for Recorder {
    async fn on_open(&self, _sender: &Sender) {
        let _ = self.tx.send(Event::Open);
    }

    async fn on_message(&self, _sender: &Sender, opcode: OpCode, payload: Bytes) {
        let _ = self.tx.send(Event::Message(opcode, payload.to_vec()));
    }

    async fn on_close(&self) {
        let _ = self.tx.send(Event::Close);
    }

    async fn on_error(&self, error: &Error) {
        let _ = self.tx.send(Event::Error(error.clone()));
    }

    async fn on_periodic(&self, _sender: &Sender) {
        let _ = self.tx.send(Event::Periodic);
    }
}

/// Next recorded event, failing the test after five seconds.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("handler dropped")
}
