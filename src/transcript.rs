//! Per-session transcript accumulation and talk-ratio metering.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Speaker attribution, derived from the audio source tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Seller,
    Buyer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Seller => "seller",
            Role::Buyer => "buyer",
        }
    }
}

/// One recognized unit of speech. Never mutated after append; a later final
/// revision of the same spoken segment arrives as a new entry.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub role: Role,
    pub text: String,
    pub is_final: bool,
    pub timestamp: DateTime<Utc>,
}

/// Running per-role word totals. Every transcript event counts, interim
/// included, so revised interim text over-counts transiently. Intentional.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounters {
    pub seller_words: usize,
    pub buyer_words: usize,
}

/// Seller/buyer split in whole percent. Buyer is derived as the complement
/// so the two sides always sum to exactly 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TalkRatio {
    pub seller: u32,
    pub buyer: u32,
}

impl TalkRatio {
    pub fn compute(counters: &WordCounters) -> Self {
        let total = counters.seller_words + counters.buyer_words;
        if total == 0 {
            return TalkRatio { seller: 0, buyer: 0 };
        }
        let seller = ((counters.seller_words as f64 / total as f64) * 100.0).round() as u32;
        TalkRatio {
            seller,
            buyer: 100 - seller,
        }
    }
}

/// Utterances kept when falling back to interim text because nothing is
/// final yet.
const INTERIM_FALLBACK_UTTERANCES: usize = 30;

/// Append-only log of utterances for one session.
#[derive(Debug, Default)]
pub struct TranscriptStore {
    utterances: Vec<Utterance>,
    counters: WordCounters,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an utterance and folds its word count into the counters.
    /// Callers drop empty-text events before reaching the store.
    pub fn append(&mut self, role: Role, text: String, is_final: bool, timestamp: DateTime<Utc>) {
        let words = text.split_whitespace().count();
        match role {
            Role::Seller => self.counters.seller_words += words,
            Role::Buyer => self.counters.buyer_words += words,
        }
        self.utterances.push(Utterance {
            role,
            text,
            is_final,
            timestamp,
        });
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    pub fn word_counters(&self) -> WordCounters {
        self.counters
    }

    pub fn talk_ratio(&self) -> TalkRatio {
        TalkRatio::compute(&self.counters)
    }

    /// Role-prefixed, newline-joined view of the most recent utterances.
    ///
    /// With `final_only`, keeps the last `max_utterances` final entries and
    /// falls back to the most recent raw entries (interim included) when
    /// nothing is final yet, so analysis always has some text to work with.
    pub fn recent_text(&self, max_utterances: usize, final_only: bool) -> String {
        if final_only {
            let finals: Vec<&Utterance> =
                self.utterances.iter().filter(|u| u.is_final).collect();
            if !finals.is_empty() {
                return Self::join(finals.iter().copied(), finals.len(), max_utterances);
            }
            return Self::join(
                self.utterances.iter(),
                self.utterances.len(),
                INTERIM_FALLBACK_UTTERANCES,
            );
        }

        Self::join(self.utterances.iter(), self.utterances.len(), max_utterances)
    }

    fn join<'a>(
        utterances: impl Iterator<Item = &'a Utterance>,
        len: usize,
        max: usize,
    ) -> String {
        utterances
            .skip(len.saturating_sub(max))
            .map(|u| format!("{}: {}", u.role.as_str(), u.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
