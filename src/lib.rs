pub mod config;
pub mod http;
pub mod insight;
pub mod protocol;
pub mod session;
pub mod stt;
pub mod transcript;

pub use config::Config;
pub use http::{create_router, AppState};
pub use insight::{
    AnalysisContext, AnalysisOutcome, AnalysisScheduler, InsightBundle, InsightItem,
    InsightStrategy,
};
pub use protocol::{AudioSource, ClientMessage, MeetingType, ServerMessage};
pub use session::{Publisher, Session, SessionEvent, SourceRouter};
pub use stt::{SttEvent, SttHandle};
pub use transcript::{Role, TalkRatio, TranscriptStore, Utterance, WordCounters};
