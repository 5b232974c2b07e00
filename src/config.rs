use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub transcription: TranscriptionConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Streaming speech-to-text provider settings (Deepgram live API).
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    /// Without a key, sessions still run but every adapter is inert.
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub language: String,
    pub sample_rate: u32,
}

/// LLM analysis provider settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Without a key, insights fall back to the heuristic strategy.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Minimum interval between LLM invocations per session.
    pub cooldown_secs: u64,
    /// Hard bound on a single LLM request; timeout counts as failure.
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "call-coach")?
            .set_default("service.http.bind", "0.0.0.0")?
            .set_default("service.http.port", 8788)?
            .set_default("transcription.endpoint", "wss://api.deepgram.com/v1/listen")?
            .set_default("transcription.model", "nova-2")?
            .set_default("transcription.language", "fr")?
            .set_default("transcription.sample_rate", 16000)?
            .set_default("analysis.base_url", "https://api.groq.com/openai/v1")?
            .set_default("analysis.model", "llama-3.3-70b-versatile")?
            .set_default("analysis.cooldown_secs", 10)?
            .set_default("analysis.request_timeout_secs", 8)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CALL_COACH").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
