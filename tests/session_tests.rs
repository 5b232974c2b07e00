use axum::extract::ws::Message;
use base64::Engine;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use call_coach::config::{
    AnalysisConfig, Config, HttpConfig, ServiceConfig, TranscriptionConfig,
};
use call_coach::insight::{InsightBundle, InsightItem};
use call_coach::protocol::AudioSource;
use call_coach::session::{Publisher, Session, SessionEvent};
use call_coach::stt::SttEvent;

/// Keyless config: adapters are inert and analysis is heuristic-only.
fn test_config() -> Config {
    Config {
        service: ServiceConfig {
            name: "call-coach-test".to_string(),
            http: HttpConfig {
                bind: "127.0.0.1".to_string(),
                port: 0,
            },
        },
        transcription: TranscriptionConfig {
            api_key: None,
            endpoint: "wss://api.deepgram.com/v1/listen".to_string(),
            model: "nova-2".to_string(),
            language: "fr".to_string(),
            sample_rate: 16000,
        },
        analysis: AnalysisConfig {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            cooldown_secs: 10,
            request_timeout_secs: 8,
        },
    }
}

struct Harness {
    session: Session,
    outbound: mpsc::UnboundedReceiver<Message>,
    // Keeps the session's event channel alive for the test's duration.
    _events: mpsc::Receiver<SessionEvent>,
}

fn harness() -> Harness {
    let (out_tx, outbound) = mpsc::unbounded_channel();
    let (event_tx, events) = mpsc::channel(64);
    let session = Session::new(
        Arc::new(test_config()),
        None,
        Publisher::new(out_tx),
        event_tx,
    );
    Harness {
        session,
        outbound,
        _events: events,
    }
}

fn next_frame(outbound: &mut mpsc::UnboundedReceiver<Message>) -> Value {
    match outbound.try_recv().expect("expected an outbound frame") {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("unexpected frame: {other:?}"),
    }
}

fn transcript_event(text: &str, is_final: bool) -> SttEvent {
    SttEvent::Transcript {
        text: text.to_string(),
        is_final,
        timestamp: Utc::now(),
    }
}

fn start_frame(sources: &str) -> String {
    format!(r#"{{"type": "START_SESSION", "payload": {{"sources": {sources}}}}}"#)
}

fn audio_chunk_frame(source: &str, pcm: &[u8]) -> String {
    let chunk = base64::engine::general_purpose::STANDARD.encode(pcm);
    format!(r#"{{"type": "AUDIO_CHUNK", "payload": {{"source": "{source}", "chunk": "{chunk}"}}}}"#)
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let mut h = harness();
    h.session.handle_frame("{ not json");
    h.session.handle_frame(r#"{"type": "NOPE", "payload": {}}"#);
    h.session.handle_frame(r#"{"type": "AUDIO_CHUNK", "payload": {"source": "mic"}}"#);
    assert!(h.outbound.try_recv().is_err());
}

#[tokio::test]
async fn mic_only_session_drops_tab_and_unknown_chunks() {
    let mut h = harness();
    h.session.handle_frame(&start_frame(r#"["mic"]"#));

    h.session.handle_frame(&audio_chunk_frame("tab", &[0u8; 320]));
    h.session.handle_frame(&audio_chunk_frame("speaker", &[0u8; 320]));
    h.session.handle_frame(&audio_chunk_frame("mic", &[0u8; 320]));
    // Invalid base64 is also a silent drop.
    h.session
        .handle_frame(r#"{"type": "AUDIO_CHUNK", "payload": {"source": "mic", "chunk": "@@@"}}"#);

    // Audio ingestion never produces outbound frames.
    assert!(h.outbound.try_recv().is_err());
    h.session.close();
}

#[tokio::test]
async fn closing_without_adapters_is_clean() {
    let mut h = harness();
    h.session.close();
    h.session.close();
}

#[tokio::test]
async fn transcript_event_publishes_transcript_then_insight() {
    let mut h = harness();
    h.session.handle_frame(&start_frame(r#"["mic", "tab"]"#));

    h.session.handle_event(SessionEvent::Stt {
        source: AudioSource::Mic,
        event: transcript_event("c'est trop cher", true),
    });

    let transcript = next_frame(&mut h.outbound);
    assert_eq!(transcript["type"], "TRANSCRIPT_UPDATE");
    assert_eq!(transcript["payload"]["source"], "mic");
    assert_eq!(transcript["payload"]["text"], "c'est trop cher");
    assert_eq!(transcript["payload"]["isFinal"], true);

    let insight = next_frame(&mut h.outbound);
    assert_eq!(insight["type"], "INSIGHT_UPDATE");
    assert_eq!(insight["payload"]["status"], "running");
    // Three seller words, nothing from the buyer yet.
    assert_eq!(insight["payload"]["talkRatio"]["seller"], 100);
    assert_eq!(insight["payload"]["talkRatio"]["buyer"], 0);
}

#[tokio::test]
async fn price_objection_call_yields_objection_and_suggestion() {
    let mut h = harness();
    h.session.handle_frame(&start_frame(r#"["mic", "tab"]"#));

    h.session.handle_event(SessionEvent::Stt {
        source: AudioSource::Mic,
        event: transcript_event("c'est trop cher", true),
    });
    h.session.handle_event(SessionEvent::Stt {
        source: AudioSource::Tab,
        event: transcript_event("ok", true),
    });

    // Skip first transcript+insight pair and the second transcript frame.
    for _ in 0..3 {
        next_frame(&mut h.outbound);
    }

    let insight = next_frame(&mut h.outbound);
    assert_eq!(insight["type"], "INSIGHT_UPDATE");
    let payload = &insight["payload"];
    assert!(!payload["objections"].as_array().unwrap().is_empty());
    assert!(!payload["suggestions"].as_array().unwrap().is_empty());
    assert_eq!(payload["talkRatio"]["seller"], 75);
    assert_eq!(payload["talkRatio"]["buyer"], 25);
}

#[tokio::test]
async fn fresh_analysis_result_is_published_and_cached() {
    let mut h = harness();
    h.session.handle_frame(&start_frame(r#"["mic"]"#));

    let bundle = InsightBundle {
        suggestions: vec![InsightItem::new("Verrouiller un next step", &["Proposer mardi"])],
        ..Default::default()
    };
    h.session
        .handle_event(SessionEvent::AnalysisDone(Some(bundle)));

    let insight = next_frame(&mut h.outbound);
    assert_eq!(insight["type"], "INSIGHT_UPDATE");
    assert_eq!(
        insight["payload"]["suggestions"][0]["title"],
        "Verrouiller un next step"
    );

    // The next transcript event must reuse the cached bundle, not the
    // heuristic (which would have produced different suggestions).
    h.session.handle_event(SessionEvent::Stt {
        source: AudioSource::Mic,
        event: transcript_event("bonjour", false),
    });
    next_frame(&mut h.outbound); // transcript update
    let insight = next_frame(&mut h.outbound);
    assert_eq!(
        insight["payload"]["suggestions"][0]["title"],
        "Verrouiller un next step"
    );
}

#[tokio::test]
async fn failed_analysis_keeps_previous_cache() {
    let mut h = harness();
    h.session.handle_frame(&start_frame(r#"["mic"]"#));

    let bundle = InsightBundle {
        suggestions: vec![InsightItem::new("Première analyse", &[])],
        ..Default::default()
    };
    h.session
        .handle_event(SessionEvent::AnalysisDone(Some(bundle)));
    next_frame(&mut h.outbound);

    // A failed run publishes nothing and must not clear the cache.
    h.session.handle_event(SessionEvent::AnalysisDone(None));
    assert!(h.outbound.try_recv().is_err());

    h.session.handle_event(SessionEvent::Stt {
        source: AudioSource::Tab,
        event: transcript_event("d'accord", true),
    });
    next_frame(&mut h.outbound); // transcript update
    let insight = next_frame(&mut h.outbound);
    assert_eq!(insight["payload"]["suggestions"][0]["title"], "Première analyse");
}

#[tokio::test]
async fn restarting_a_session_resets_state() {
    let mut h = harness();
    h.session.handle_frame(&start_frame(r#"["mic"]"#));
    h.session.handle_event(SessionEvent::Stt {
        source: AudioSource::Mic,
        event: transcript_event("un deux trois quatre", true),
    });
    next_frame(&mut h.outbound);
    next_frame(&mut h.outbound);

    // New START_SESSION over the live connection: counters start over.
    h.session.handle_frame(&start_frame(r#"["mic", "tab"]"#));
    h.session.handle_event(SessionEvent::Stt {
        source: AudioSource::Tab,
        event: transcript_event("bonjour", true),
    });

    next_frame(&mut h.outbound); // transcript update
    let insight = next_frame(&mut h.outbound);
    assert_eq!(insight["payload"]["talkRatio"]["seller"], 0);
    assert_eq!(insight["payload"]["talkRatio"]["buyer"], 100);
}
