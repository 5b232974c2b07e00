//! Per-connection session state machine.

use base64::Engine;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::publisher::Publisher;
use super::router::SourceRouter;
use super::stats::SessionAudioStats;
use crate::config::Config;
use crate::insight::{heuristic, AnalysisContext, AnalysisScheduler, InsightBundle, InsightStrategy, LlmStrategy};
use crate::protocol::{
    AudioChunkPayload, AudioSource, ClientMessage, MeetingType, ServerMessage, StartSessionPayload,
};
use crate::stt::{self, SttEvent};
use crate::transcript::TranscriptStore;

/// Final-utterance window handed to the LLM strategy.
const LLM_TRANSCRIPT_UTTERANCES: usize = 200;
/// Raw-utterance window handed to the heuristic strategy.
const HEURISTIC_TRANSCRIPT_UTTERANCES: usize = 40;

/// Everything the session's event loop can be woken by besides a client
/// frame: transcription channel events and detached analysis completions.
#[derive(Debug)]
pub enum SessionEvent {
    Stt {
        source: AudioSource,
        event: SttEvent,
    },
    /// `None` means the run failed; the cache must survive it.
    AnalysisDone(Option<InsightBundle>),
}

/// State for one client connection. Created on connect, torn down on
/// disconnect; never outlives its connection and never shared across
/// connections.
pub struct Session {
    id: Uuid,
    config: Arc<Config>,
    llm: Option<Arc<LlmStrategy>>,
    publisher: Publisher,
    events: mpsc::Sender<SessionEvent>,
    started_at: Option<DateTime<Utc>>,
    meeting_type: MeetingType,
    description: String,
    router: SourceRouter,
    transcript: TranscriptStore,
    scheduler: AnalysisScheduler,
    stats: SessionAudioStats,
}

impl Session {
    pub fn new(
        config: Arc<Config>,
        llm: Option<Arc<LlmStrategy>>,
        publisher: Publisher,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let cooldown = std::time::Duration::from_secs(config.analysis.cooldown_secs);
        Self {
            id: Uuid::new_v4(),
            config,
            llm,
            publisher,
            events,
            started_at: None,
            meeting_type: MeetingType::default(),
            description: String::new(),
            router: SourceRouter::new(),
            transcript: TranscriptStore::new(),
            scheduler: AnalysisScheduler::new(cooldown),
            stats: SessionAudioStats::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Dispatches one inbound frame. Malformed frames are ignored rather
    /// than dropping the connection.
    pub fn handle_frame(&mut self, raw: &str) {
        let message = match serde_json::from_str::<ClientMessage>(raw) {
            Ok(m) => m,
            Err(e) => {
                debug!(session = %self.id, "ignoring malformed frame: {e}");
                return;
            }
        };
        match message {
            ClientMessage::StartSession(payload) => self.start(payload),
            ClientMessage::AudioChunk(payload) => self.ingest_audio(payload),
        }
    }

    fn start(&mut self, payload: StartSessionPayload) {
        // A new start over a live session tears down prior adapters first.
        self.router.close_all();
        self.scheduler.reset();
        self.transcript = TranscriptStore::new();
        self.stats = SessionAudioStats::default();

        self.started_at = Some(Utc::now());
        self.meeting_type = payload.meeting_type.clone().unwrap_or_default();
        self.description = payload.description.clone().unwrap_or_default();
        if let Some(token) = &payload.access_token {
            // Opaque credential, validated upstream.
            debug!(session = %self.id, token_len = token.len(), "session credential received");
        }

        if self.config.transcription.api_key.is_none() {
            warn!(
                session = %self.id,
                "transcription api key missing, session will run without transcripts"
            );
        }

        let sources = payload.enabled_sources();
        for source in &sources {
            let (handle, events) = stt::connect(&self.config.transcription, *source);
            self.router.insert(*source, handle);
            self.spawn_event_pump(*source, events);
        }

        info!(
            session = %self.id,
            meeting_type = %self.meeting_type.code,
            sources = ?sources.iter().map(|s| s.as_tag()).collect::<Vec<_>>(),
            "session started"
        );
    }

    /// Forwards one adapter's event sequence into the session queue,
    /// preserving per-adapter order while both sources interleave.
    fn spawn_event_pump(&self, source: AudioSource, mut events: mpsc::Receiver<SttEvent>) {
        let tx = self.events.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if tx.send(SessionEvent::Stt { source, event }).await.is_err() {
                    break;
                }
            }
        });
    }

    fn ingest_audio(&mut self, payload: AudioChunkPayload) {
        // Unknown source tags are dropped, never an error.
        let Some(source) = AudioSource::from_tag(&payload.source) else {
            return;
        };
        let pcm = match base64::engine::general_purpose::STANDARD.decode(payload.chunk.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(session = %self.id, source = source.as_tag(), "undecodable chunk: {e}");
                return;
            }
        };

        let stats = self.stats.source_mut(source);
        if stats.record(pcm.len(), Instant::now()) {
            debug!(
                session = %self.id,
                source = source.as_tag(),
                chunks = stats.chunks,
                bytes = stats.bytes,
                adapter_open = self.router.handle(source).map(|h| h.is_open()),
                "audio ingest stats"
            );
        }

        self.router.route(source, pcm);
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Stt { source, event } => match event {
                SttEvent::Transcript {
                    text,
                    is_final,
                    timestamp,
                } => self.on_transcript(source, text, is_final, timestamp),
                SttEvent::Error(message) => {
                    warn!(session = %self.id, source = source.as_tag(), "transcription error: {message}");
                }
                SttEvent::Closed => {
                    info!(session = %self.id, source = source.as_tag(), "transcription channel closed");
                    self.router.mark_closed(source);
                }
            },
            SessionEvent::AnalysisDone(result) => self.on_analysis_done(result),
        }
    }

    fn on_transcript(
        &mut self,
        source: AudioSource,
        text: String,
        is_final: bool,
        timestamp: DateTime<Utc>,
    ) {
        debug!(
            session = %self.id,
            source = source.as_tag(),
            is_final,
            "transcript: {text}"
        );

        self.publisher
            .publish(&ServerMessage::transcript_update(source, &text, is_final));
        self.transcript
            .append(source.role(), text, is_final, timestamp);

        self.maybe_dispatch_analysis();
        self.publish_insights(None);
    }

    /// Kicks off an LLM run when configured and the cooldown has elapsed.
    /// The run is detached: later transcript events are never blocked on
    /// it, and its completion re-enters the event queue.
    fn maybe_dispatch_analysis(&mut self) {
        let Some(llm) = self.llm.clone() else {
            return;
        };
        if !self.scheduler.try_begin_run(Instant::now()) {
            return;
        }

        let ctx = self.analysis_context();
        let events = self.events.clone();
        let session_id = self.id;
        tokio::spawn(async move {
            let result = match llm.analyze(&ctx).await {
                Ok(bundle) => Some(bundle),
                Err(e) => {
                    warn!(session = %session_id, "llm analysis failed: {e:#}");
                    None
                }
            };
            // A send failure means the session is gone; the result is
            // discarded instead of published to a dead connection.
            let _ = events.send(SessionEvent::AnalysisDone(result)).await;
        });
    }

    fn on_analysis_done(&mut self, result: Option<InsightBundle>) {
        let Some(bundle) = result else {
            return;
        };
        self.scheduler.record_success(Instant::now(), bundle.clone());
        self.publish_insights(Some(bundle));
    }

    /// Publishes the best available bundle: fresh LLM result, else cached,
    /// else heuristic computed on demand.
    fn publish_insights(&mut self, fresh: Option<InsightBundle>) {
        let talk_ratio = self.transcript.talk_ratio();
        let duration_minutes = self.duration_minutes();
        let outcome = self.scheduler.outcome(fresh);
        let bundle = outcome.resolve(|| {
            let text = self
                .transcript
                .recent_text(HEURISTIC_TRANSCRIPT_UTTERANCES, false)
                .to_lowercase();
            heuristic::generate(&text, duration_minutes)
        });
        self.publisher
            .publish(&ServerMessage::insight_update(talk_ratio, bundle));
    }

    fn analysis_context(&self) -> AnalysisContext {
        AnalysisContext {
            transcript_text: self.transcript.recent_text(LLM_TRANSCRIPT_UTTERANCES, true),
            meeting_label: self.meeting_type.label.clone(),
            prompt: self.meeting_type.prompt.clone(),
            client_description: self.description.clone(),
            duration_minutes: self.duration_minutes(),
            talk_ratio: self.transcript.talk_ratio(),
        }
    }

    fn duration_minutes(&self) -> f64 {
        match self.started_at {
            Some(started) => {
                Utc::now().signed_duration_since(started).num_milliseconds() as f64 / 60_000.0
            }
            None => 0.0,
        }
    }

    /// Finalizes every adapter unconditionally, including sources that
    /// never opened. Safe to call more than once.
    pub fn close(&mut self) {
        self.router.close_all();
        info!(session = %self.id, utterances = self.transcript.len(), "session closed");
    }
}
