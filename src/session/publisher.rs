//! Outbound frame publishing.

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::ServerMessage;

/// Fire-and-forget writer for protocol frames. Serialization problems and
/// failed sends are swallowed; a connection that cannot receive is about to
/// be torn down anyway.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::UnboundedSender<Message>,
}

impl Publisher {
    /// Wraps an existing channel. Tests use this to capture frames without
    /// a socket.
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }

    /// Spawns the writer task draining published frames into the socket.
    pub fn spawn_writer(mut sink: SplitSink<WebSocket, Message>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if sink.send(frame).await.is_err() {
                    debug!("client connection gone, dropping outbound frames");
                    break;
                }
            }
        });
        Self { tx }
    }

    pub fn publish(&self, message: &ServerMessage) {
        if let Ok(json) = serde_json::to_string(message) {
            let _ = self.tx.send(Message::Text(json));
        }
    }
}
