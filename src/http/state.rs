use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use crate::config::Config;
use crate::insight::LlmStrategy;

/// Shared application state. Sessions themselves are owned by their
/// connection handlers; only the configuration, the shared LLM client and
/// a connection gauge live here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm: Option<Arc<LlmStrategy>>,
    pub active_sessions: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let llm = LlmStrategy::from_config(&config.analysis).map(Arc::new);
        Self {
            config: Arc::new(config),
            llm,
            active_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }
}
