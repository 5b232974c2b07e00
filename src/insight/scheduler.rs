//! Analysis scheduling: cooldown gating and fallback precedence.

use std::time::{Duration, Instant};

use super::InsightBundle;

/// What the scheduler can offer for a publish. Resolved into a concrete
/// bundle by [`AnalysisOutcome::resolve`] with precedence
/// fresh LLM result -> cached LLM result -> heuristic fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Fresh(InsightBundle),
    Cached(InsightBundle),
    Unavailable,
}

impl AnalysisOutcome {
    pub fn resolve(self, fallback: impl FnOnce() -> InsightBundle) -> InsightBundle {
        match self {
            AnalysisOutcome::Fresh(bundle) | AnalysisOutcome::Cached(bundle) => bundle,
            AnalysisOutcome::Unavailable => fallback(),
        }
    }
}

/// Per-session gate around the expensive strategy, plus the cache of its
/// last successful result.
#[derive(Debug)]
pub struct AnalysisScheduler {
    cooldown: Duration,
    last_run_at: Option<Instant>,
    cached: Option<InsightBundle>,
}

impl AnalysisScheduler {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_run_at: None,
            cached: None,
        }
    }

    /// Clears gate and cache; called when a session (re)starts.
    pub fn reset(&mut self) {
        self.last_run_at = None;
        self.cached = None;
    }

    /// Opens the gate at most once per cooldown window. The dispatch time is
    /// stamped here, not on completion, so a failing provider still consumes
    /// its window instead of being re-invoked on every transcript event.
    pub fn try_begin_run(&mut self, now: Instant) -> bool {
        let due = match self.last_run_at {
            None => true,
            Some(last) => now.duration_since(last) >= self.cooldown,
        };
        if due {
            self.last_run_at = Some(now);
        }
        due
    }

    /// Stores a successful result. Failed runs never reach here, so the
    /// previous cache survives them.
    pub fn record_success(&mut self, now: Instant, bundle: InsightBundle) {
        self.last_run_at = Some(now);
        self.cached = Some(bundle);
    }

    pub fn cached(&self) -> Option<&InsightBundle> {
        self.cached.as_ref()
    }

    /// Classifies what this publish can carry.
    pub fn outcome(&self, fresh: Option<InsightBundle>) -> AnalysisOutcome {
        if let Some(bundle) = fresh {
            return AnalysisOutcome::Fresh(bundle);
        }
        match &self.cached {
            Some(bundle) => AnalysisOutcome::Cached(bundle.clone()),
            None => AnalysisOutcome::Unavailable,
        }
    }
}
