//! Wire protocol shared with the browser extension.
//!
//! Frames are JSON objects with a `type` tag and a `payload` body. Inbound
//! frames that fail to parse are ignored by the session rather than closing
//! the connection.

use serde::{Deserialize, Serialize};

use crate::insight::InsightBundle;
use crate::transcript::{Role, TalkRatio};

/// Which audio feed a chunk or transcript event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioSource {
    Mic,
    Tab,
}

impl AudioSource {
    pub const ALL: [AudioSource; 2] = [AudioSource::Mic, AudioSource::Tab];

    /// Unknown tags yield `None` and the chunk is dropped.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "mic" => Some(AudioSource::Mic),
            "tab" => Some(AudioSource::Tab),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            AudioSource::Mic => "mic",
            AudioSource::Tab => "tab",
        }
    }

    /// Fixed policy: the microphone is the seller, the meeting tab the buyer.
    pub fn role(&self) -> Role {
        match self {
            AudioSource::Mic => Role::Seller,
            AudioSource::Tab => Role::Buyer,
        }
    }
}

/// Meeting-type descriptor resolved by the config service; immutable for
/// the lifetime of a session once set by the start frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingType {
    pub id: String,
    pub code: String,
    pub label: String,
    pub prompt: String,
}

/// Inbound frames (extension -> backend).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    #[serde(rename = "START_SESSION")]
    StartSession(StartSessionPayload),
    #[serde(rename = "AUDIO_CHUNK")]
    AudioChunk(AudioChunkPayload),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartSessionPayload {
    /// Opaque credential issued by the config service; never validated here.
    pub access_token: Option<String>,
    pub meeting_type: Option<MeetingType>,
    pub description: Option<String>,
    /// Which sources to open adapters for; empty or missing means both.
    pub sources: Option<Vec<String>>,
}

impl StartSessionPayload {
    pub fn enabled_sources(&self) -> Vec<AudioSource> {
        let requested: Vec<AudioSource> = self
            .sources
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|tag| AudioSource::from_tag(tag))
            .collect();

        if requested.is_empty() {
            AudioSource::ALL.to_vec()
        } else {
            requested
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AudioChunkPayload {
    pub source: String,
    /// Base64-encoded mono 16 kHz 16-bit little-endian PCM.
    pub chunk: String,
}

/// Outbound frames (backend -> extension).
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "TRANSCRIPT_UPDATE")]
    TranscriptUpdate(TranscriptUpdatePayload),
    #[serde(rename = "INSIGHT_UPDATE")]
    InsightUpdate(InsightUpdatePayload),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptUpdatePayload {
    pub source: &'static str,
    pub text: String,
    pub is_final: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightUpdatePayload {
    pub status: &'static str,
    pub talk_ratio: TalkRatio,
    #[serde(flatten)]
    pub insights: InsightBundle,
}

impl ServerMessage {
    pub fn transcript_update(source: AudioSource, text: &str, is_final: bool) -> Self {
        ServerMessage::TranscriptUpdate(TranscriptUpdatePayload {
            source: source.as_tag(),
            text: text.to_string(),
            is_final,
        })
    }

    pub fn insight_update(talk_ratio: TalkRatio, insights: InsightBundle) -> Self {
        ServerMessage::InsightUpdate(InsightUpdatePayload {
            status: "running",
            talk_ratio,
            insights,
        })
    }
}
