//! Deepgram live transcription client.
//!
//! One WebSocket connection per audio source, configured for mono 16 kHz
//! linear PCM with interim results. A writer task forwards audio as binary
//! frames and handles graceful finalize; a reader task parses `Results`
//! payloads into [`SttEvent`]s. Lost connections are not retried; the
//! source stays silent until the client restarts the session.

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{SttEvent, SttHandle, StreamCommand};
use crate::config::TranscriptionConfig;
use crate::protocol::AudioSource;

const CLOSE_STREAM_FRAME: &str = r#"{"type":"CloseStream"}"#;

pub(crate) fn spawn(
    cfg: TranscriptionConfig,
    api_key: String,
    source: AudioSource,
) -> (SttHandle, mpsc::Receiver<SttEvent>) {
    let (event_tx, event_rx) = mpsc::channel(64);
    let (command_tx, command_rx) = mpsc::channel(256);
    let open = Arc::new(AtomicBool::new(false));

    let handle = SttHandle::live(command_tx, open.clone());
    tokio::spawn(run(cfg, api_key, source, command_rx, event_tx, open));

    (handle, event_rx)
}

fn listen_url(cfg: &TranscriptionConfig) -> String {
    format!(
        "{}?model={}&language={}&smart_format=true&punctuate=true&interim_results=true&channels=1&encoding=linear16&sample_rate={}",
        cfg.endpoint, cfg.model, cfg.language, cfg.sample_rate
    )
}

async fn run(
    cfg: TranscriptionConfig,
    api_key: String,
    source: AudioSource,
    mut commands: mpsc::Receiver<StreamCommand>,
    event_tx: mpsc::Sender<SttEvent>,
    open: Arc<AtomicBool>,
) {
    let url = listen_url(&cfg);
    let mut request = match url.as_str().into_client_request() {
        Ok(req) => req,
        Err(e) => {
            warn!(source = source.as_tag(), "invalid transcription request: {e}");
            let _ = event_tx.send(SttEvent::Error(e.to_string())).await;
            let _ = event_tx.send(SttEvent::Closed).await;
            return;
        }
    };
    match HeaderValue::from_str(&format!("Token {api_key}")) {
        Ok(value) => {
            request.headers_mut().insert("Authorization", value);
        }
        Err(e) => {
            warn!(source = source.as_tag(), "invalid transcription credential: {e}");
            let _ = event_tx.send(SttEvent::Error(e.to_string())).await;
            let _ = event_tx.send(SttEvent::Closed).await;
            return;
        }
    }

    let ws_stream = match connect_async(request).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            warn!(source = source.as_tag(), "transcription connect failed: {e}");
            let _ = event_tx.send(SttEvent::Error(e.to_string())).await;
            let _ = event_tx.send(SttEvent::Closed).await;
            return;
        }
    };

    info!(source = source.as_tag(), "transcription socket open");
    open.store(true, Ordering::Relaxed);

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // Writer: audio in, finalize on request or when the session drops us.
    let writer = tokio::spawn(async move {
        loop {
            match commands.recv().await {
                Some(StreamCommand::Audio(pcm)) => {
                    if ws_tx.send(Message::Binary(pcm)).await.is_err() {
                        break;
                    }
                }
                Some(StreamCommand::Finalize) | None => {
                    let _ = ws_tx
                        .send(Message::Text(CLOSE_STREAM_FRAME.to_string()))
                        .await;
                    let _ = ws_tx.close().await;
                    break;
                }
            }
        }
    });

    // Reader: provider messages out.
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Some(event) = parse_live_message(&text) {
                    if event_tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(frame)) => {
                info!(
                    source = source.as_tag(),
                    "transcription socket closed by provider: {frame:?}"
                );
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(source = source.as_tag(), "transcription socket error: {e}");
                let _ = event_tx.send(SttEvent::Error(e.to_string())).await;
                break;
            }
        }
    }

    open.store(false, Ordering::Relaxed);
    let _ = event_tx.send(SttEvent::Closed).await;
    writer.abort();
    debug!(source = source.as_tag(), "transcription reader task exiting");
}

#[derive(Debug, Deserialize)]
struct LiveMessage {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    channel: LiveChannel,
}

#[derive(Debug, Default, Deserialize)]
struct LiveChannel {
    #[serde(default)]
    alternatives: Vec<LiveAlternative>,
}

#[derive(Debug, Deserialize)]
struct LiveAlternative {
    #[serde(default)]
    transcript: String,
}

/// Turns one provider text frame into a transcript event. Control frames
/// (Metadata, UtteranceEnd, ...) and empty transcripts yield nothing.
fn parse_live_message(text: &str) -> Option<SttEvent> {
    let message: LiveMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!("unparseable transcription frame: {e}");
            return None;
        }
    };

    if message.kind != "Results" {
        return None;
    }

    let transcript = message
        .channel
        .alternatives
        .first()
        .map(|a| a.transcript.trim())
        .unwrap_or_default();
    if transcript.is_empty() {
        return None;
    }

    Some(SttEvent::Transcript {
        text: transcript.to_string(),
        is_final: message.is_final,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_url_carries_streaming_parameters() {
        let cfg = TranscriptionConfig {
            api_key: Some("key".into()),
            endpoint: "wss://api.deepgram.com/v1/listen".into(),
            model: "nova-2".into(),
            language: "fr".into(),
            sample_rate: 16000,
        };
        let url = listen_url(&cfg);
        assert!(url.starts_with("wss://api.deepgram.com/v1/listen?"));
        assert!(url.contains("model=nova-2"));
        assert!(url.contains("language=fr"));
        assert!(url.contains("interim_results=true"));
        assert!(url.contains("encoding=linear16"));
        assert!(url.contains("sample_rate=16000"));
    }

    #[test]
    fn results_frames_become_transcript_events() {
        let frame = r#"{
            "type": "Results",
            "is_final": true,
            "channel": {"alternatives": [{"transcript": " bonjour à tous ", "confidence": 0.98}]}
        }"#;
        match parse_live_message(frame) {
            Some(SttEvent::Transcript { text, is_final, .. }) => {
                assert_eq!(text, "bonjour à tous");
                assert!(is_final);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn interim_results_are_surfaced_too() {
        let frame = r#"{
            "type": "Results",
            "is_final": false,
            "channel": {"alternatives": [{"transcript": "bonj"}]}
        }"#;
        match parse_live_message(frame) {
            Some(SttEvent::Transcript { is_final, .. }) => assert!(!is_final),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn empty_and_control_frames_are_dropped() {
        let empty = r#"{"type": "Results", "is_final": true, "channel": {"alternatives": [{"transcript": "  "}]}}"#;
        assert!(parse_live_message(empty).is_none());

        let metadata = r#"{"type": "Metadata", "request_id": "abc"}"#;
        assert!(parse_live_message(metadata).is_none());

        assert!(parse_live_message("not json").is_none());
    }
}
