//! WebSocket endpoint: one connection, one session.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::StreamExt;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::state::AppState;
use crate::session::{Publisher, Session, SessionEvent};

pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Runs one session's event loop: client frames and session events (the two
/// transcription channels plus analysis completions) are serialized here,
/// so all per-session state is touched from a single task.
async fn handle_socket(socket: WebSocket, state: AppState) {
    state.active_sessions.fetch_add(1, Ordering::Relaxed);

    let (sink, mut stream) = socket.split();
    let publisher = Publisher::spawn_writer(sink);
    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(256);
    let mut session = Session::new(state.config.clone(), state.llm.clone(), publisher, event_tx);
    info!(session = %session.id(), "client connected");

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => session.handle_frame(&text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(session = %session.id(), "client transport error: {e}");
                    break;
                }
            },
            Some(event) = event_rx.recv() => session.handle_event(event),
        }
    }

    // Dropping the event channel makes any in-flight analysis result
    // unsendable, so it is discarded rather than published after close.
    session.close();
    state.active_sessions.fetch_sub(1, Ordering::Relaxed);
}
