//! Demultiplexes inbound audio by source tag to transcription adapters.

use crate::protocol::AudioSource;
use crate::stt::SttHandle;

/// Fixed mic/tab adapter slots for one session. At most one adapter per
/// source at any time.
#[derive(Debug, Default)]
pub struct SourceRouter {
    mic: Option<SttHandle>,
    tab: Option<SttHandle>,
}

impl SourceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, source: AudioSource) -> &Option<SttHandle> {
        match source {
            AudioSource::Mic => &self.mic,
            AudioSource::Tab => &self.tab,
        }
    }

    pub fn insert(&mut self, source: AudioSource, handle: SttHandle) {
        let slot = match source {
            AudioSource::Mic => &mut self.mic,
            AudioSource::Tab => &mut self.tab,
        };
        // Starting a new adapter tears down any prior one for the slot.
        if let Some(previous) = slot.replace(handle) {
            previous.close();
        }
    }

    pub fn handle(&self, source: AudioSource) -> Option<&SttHandle> {
        self.slot(source).as_ref()
    }

    /// Forwards a chunk to the matching adapter. Returns whether it reached
    /// one; chunks for absent or closed adapters are accepted losses.
    pub fn route(&self, source: AudioSource, pcm: Vec<u8>) -> bool {
        match self.slot(source) {
            Some(handle) => handle.send_audio(pcm),
            None => false,
        }
    }

    pub fn mark_closed(&self, source: AudioSource) {
        if let Some(handle) = self.slot(source) {
            handle.mark_closed();
        }
    }

    /// Finalizes every present adapter. Idempotent, and a no-op for a
    /// session where no adapter was ever opened.
    pub fn close_all(&mut self) {
        for handle in [self.mic.take(), self.tab.take()].into_iter().flatten() {
            handle.close();
        }
    }
}
