//! Per-connection session management
//!
//! One `Session` per client WebSocket connection. The session owns the
//! dual-source router, the transcript store and the analysis scheduler,
//! dispatches inbound protocol frames, and serializes the two transcription
//! channels' events plus LLM completions through a single event queue.

mod publisher;
mod router;
mod session;
mod stats;

pub use publisher::Publisher;
pub use router::SourceRouter;
pub use session::{Session, SessionEvent};
pub use stats::AudioStats;
