//! Streaming transcription channel adapters.
//!
//! An adapter wraps one provider connection per audio source. Creation
//! returns a send-side [`SttHandle`] plus a channel of typed [`SttEvent`]s;
//! the session consumes the two adapters' event sequences through its own
//! queue, which keeps per-adapter order while letting the sources interleave.

pub mod deepgram;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::TranscriptionConfig;
use crate::protocol::AudioSource;

/// Asynchronous output of one transcription channel.
#[derive(Debug, Clone)]
pub enum SttEvent {
    Transcript {
        text: String,
        is_final: bool,
        timestamp: DateTime<Utc>,
    },
    /// Non-fatal provider error; the channel may keep producing.
    Error(String),
    /// Terminal: no further events, no further sends.
    Closed,
}

#[derive(Debug)]
enum StreamCommand {
    Audio(Vec<u8>),
    Finalize,
}

/// Send side of one transcription channel. Audio is forwarded only while
/// the underlying connection reports open; otherwise chunks are silently
/// dropped. No buffering, no backpressure to the caller.
#[derive(Debug, Clone)]
pub struct SttHandle {
    commands: Option<mpsc::Sender<StreamCommand>>,
    open: Arc<AtomicBool>,
}

impl SttHandle {
    fn live(commands: mpsc::Sender<StreamCommand>, open: Arc<AtomicBool>) -> Self {
        Self {
            commands: Some(commands),
            open,
        }
    }

    /// An adapter that accepts and discards audio and never emits events.
    /// Used when provider credentials are absent, degrading the session to
    /// silence instead of failing the connection.
    pub fn inert() -> (Self, mpsc::Receiver<SttEvent>) {
        let (_tx, rx) = mpsc::channel(1);
        (
            Self {
                commands: None,
                open: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    /// Called by the session when the adapter's `Closed` event arrives.
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Relaxed);
    }

    /// Forwards a PCM chunk. Returns whether the chunk was handed to the
    /// connection; a `false` is an accepted loss, not an error.
    pub fn send_audio(&self, pcm: Vec<u8>) -> bool {
        if !self.is_open() {
            return false;
        }
        match &self.commands {
            Some(tx) => tx.try_send(StreamCommand::Audio(pcm)).is_ok(),
            None => false,
        }
    }

    /// Requests a graceful provider-side finalize if connected, else no-op.
    pub fn close(&self) {
        self.open.store(false, Ordering::Relaxed);
        if let Some(tx) = &self.commands {
            let _ = tx.try_send(StreamCommand::Finalize);
        }
    }
}

/// Opens one transcription channel for `source`, or an inert one when no
/// provider key is configured.
pub fn connect(cfg: &TranscriptionConfig, source: AudioSource) -> (SttHandle, mpsc::Receiver<SttEvent>) {
    match &cfg.api_key {
        Some(key) => deepgram::spawn(cfg.clone(), key.clone(), source),
        None => SttHandle::inert(),
    }
}

/// A handle whose connection is already "open", delivering forwarded audio
/// to the returned channel. Router and session tests use it to observe what
/// actually reaches an adapter.
#[cfg(test)]
pub(crate) fn test_live_handle() -> (SttHandle, mpsc::Receiver<Vec<u8>>) {
    let (command_tx, mut command_rx) = mpsc::channel(16);
    let (audio_tx, audio_rx) = mpsc::channel(16);
    let open = Arc::new(AtomicBool::new(true));
    tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            if let StreamCommand::Audio(pcm) = command {
                if audio_tx.send(pcm).await.is_err() {
                    break;
                }
            }
        }
    });
    (SttHandle::live(command_tx, open), audio_rx)
}
