//! Audio ingestion statistics.

use std::time::{Duration, Instant};

use crate::protocol::AudioSource;

const LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Running chunk/byte totals for one source, with a built-in log throttle.
#[derive(Debug, Default)]
pub struct AudioStats {
    pub chunks: u64,
    pub bytes: u64,
    last_log_at: Option<Instant>,
}

impl AudioStats {
    /// Records one chunk; returns true when it is time to log a summary.
    pub fn record(&mut self, byte_len: usize, now: Instant) -> bool {
        self.chunks += 1;
        self.bytes += byte_len as u64;
        match self.last_log_at {
            Some(last) if now.duration_since(last) < LOG_INTERVAL => false,
            _ => {
                self.last_log_at = Some(now);
                true
            }
        }
    }
}

/// Both sources' counters for one session.
#[derive(Debug, Default)]
pub struct SessionAudioStats {
    mic: AudioStats,
    tab: AudioStats,
}

impl SessionAudioStats {
    pub fn source_mut(&mut self, source: AudioSource) -> &mut AudioStats {
        match source {
            AudioSource::Mic => &mut self.mic,
            AudioSource::Tab => &mut self.tab,
        }
    }
}
