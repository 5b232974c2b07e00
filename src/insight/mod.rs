//! Coaching insight generation.
//!
//! Two interchangeable strategies produce an [`InsightBundle`] from the
//! session transcript: a deterministic keyword heuristic that always
//! succeeds, and an LLM-backed strategy that is slow, rate-limited and
//! allowed to fail. The [`scheduler`] decides which one feeds each publish.

pub mod heuristic;
pub mod llm;
pub mod scheduler;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use heuristic::HeuristicStrategy;
pub use llm::LlmStrategy;
pub use scheduler::{AnalysisOutcome, AnalysisScheduler};

use crate::transcript::TalkRatio;

/// One coaching card: a headline plus supporting bullet points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsightItem {
    pub title: String,
    pub key_points: Vec<String>,
}

impl InsightItem {
    pub fn new(title: impl Into<String>, key_points: &[&str]) -> Self {
        Self {
            title: title.into(),
            key_points: key_points.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Qualification-framework coverage, 0-100 each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkScores {
    pub meddic: u32,
    pub bant: u32,
    pub spiced: u32,
}

/// The structured coaching output pushed to the extension. Produced
/// wholesale by one strategy invocation, never merged across invocations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsightBundle {
    pub suggestions: Vec<InsightItem>,
    pub objections: Vec<InsightItem>,
    pub battle_cards: Vec<InsightItem>,
    pub framework_scores: FrameworkScores,
    pub missing_signals: Vec<String>,
    pub next_step_alerts: Vec<String>,
}

/// Everything a strategy may consult about the current call.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    /// Recent transcript, role-prefixed and newline-joined.
    pub transcript_text: String,
    pub meeting_label: String,
    /// Per-meeting-type instruction text from the config service.
    pub prompt: String,
    pub client_description: String,
    pub duration_minutes: f64,
    pub talk_ratio: TalkRatio,
}

/// A strategy turns the current call context into a full bundle. The
/// heuristic never fails; the LLM strategy returns `Err` for transport
/// failures, malformed output, or timeouts so the caller keeps its cache.
#[async_trait::async_trait]
pub trait InsightStrategy: Send + Sync {
    async fn analyze(&self, ctx: &AnalysisContext) -> Result<InsightBundle>;
}
