//! LLM-backed insight strategy.
//!
//! Calls an OpenAI-compatible chat-completions endpoint (Groq-hosted by
//! default) with the recent transcript and meeting context, asking for a
//! strict JSON object. The whole response is rejected only when it is not
//! valid JSON; otherwise every field is defaulted independently so a
//! partially valid answer is still usable. Any failure is an `Err`, never
//! an empty bundle, so the scheduler keeps its cache.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{AnalysisContext, FrameworkScores, InsightBundle, InsightItem, InsightStrategy};
use crate::config::AnalysisConfig;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

const SYSTEM_PROMPT: &str = r#"Tu es un coach sales B2B expert qui assiste un commercial en temps réel pendant un appel.
Tu analyses le transcript et retournes UNIQUEMENT du JSON valide (aucun texte hors du JSON).

Structure JSON attendue :
{
  "suggestions": [{ "title": "...", "keyPoints": ["...", "..."] }],
  "objections": [{ "title": "Objection détectée", "keyPoints": ["Réponse suggérée 1", "Réponse suggérée 2"] }],
  "battleCards": [{ "title": "Concurrent mentionné", "keyPoints": ["Argument différenciant", "Question piège à poser"] }],
  "frameworkScores": { "meddic": 0, "bant": 0, "spiced": 0 },
  "missingSignals": ["..."],
  "nextStepAlerts": ["..."]
}

Règles :
- suggestions : 1 à 3 actions concrètes que le commercial devrait faire maintenant. Vide si le call se passe bien.
- objections : objections détectées avec 2-3 réponses adaptées. Vide si aucune.
- battleCards : uniquement si un concurrent est explicitement mentionné. Vide sinon.
- frameworkScores : score 0-100 pour chaque framework selon les informations collectées (budget, décideur, timeline, métriques, situation, pain, impact, next step...).
- missingSignals : critères critiques non encore abordés selon le stade du call. Vide si tout a été couvert.
- nextStepAlerts : alerte si le call s'éternise sans next step concret verrouillé. Vide sinon.
- Toutes les réponses en français.
- Sois précis et actionnable. Pas de généralités."#;

pub struct LlmStrategy {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmStrategy {
    /// Returns `None` when no API key is configured; the caller degrades to
    /// the heuristic-only path.
    pub fn from_config(cfg: &AnalysisConfig) -> Option<Self> {
        let api_key = cfg.api_key.clone()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: cfg.model.clone(),
        })
    }

    fn user_message(ctx: &AnalysisContext) -> String {
        format!(
            "Contexte client : {}\n\
             Type de meeting : {}\n\
             Instructions spécifiques : {}\n\
             Durée du call : {:.1} minutes\n\
             Ratio vendeur/prospect : {}% / {}%\n\n\
             Transcript récent :\n{}",
            non_empty(&ctx.client_description, "Non fourni"),
            non_empty(&ctx.meeting_label, "Non spécifié"),
            non_empty(&ctx.prompt, "Aucune"),
            ctx.duration_minutes,
            ctx.talk_ratio.seller,
            ctx.talk_ratio.buyer,
            ctx.transcript_text,
        )
    }
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

#[async_trait::async_trait]
impl InsightStrategy for LlmStrategy {
    async fn analyze(&self, ctx: &AnalysisContext) -> Result<InsightBundle> {
        if ctx.transcript_text.is_empty() {
            return Err(anyhow!("no transcript text to analyze"));
        }

        let user_message = Self::user_message(ctx);
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.2,
            max_tokens: 1024,
            response_format: ResponseFormat { kind: "json_object" },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_message,
                },
            ],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat completion error ({status}): {body}"));
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("malformed chat completion envelope")?;

        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| anyhow!("chat completion returned no content"))?;

        debug!(bytes = content.len(), "parsing llm insight payload");
        parse_insights(content)
    }
}

/// Parses the model's JSON answer. Rejects only non-JSON output; each field
/// is extracted independently with defaults so one malformed field never
/// discards the rest.
pub fn parse_insights(content: &str) -> Result<InsightBundle> {
    let value: Value =
        serde_json::from_str(content).context("llm returned invalid JSON")?;

    Ok(InsightBundle {
        suggestions: items(&value, "suggestions"),
        objections: items(&value, "objections"),
        battle_cards: items(&value, "battleCards"),
        framework_scores: FrameworkScores {
            meddic: score(&value, "meddic"),
            bant: score(&value, "bant"),
            spiced: score(&value, "spiced"),
        },
        missing_signals: strings(&value, "missingSignals"),
        next_step_alerts: strings(&value, "nextStepAlerts"),
    })
}

fn items(value: &Value, key: &str) -> Vec<InsightItem> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| serde_json::from_value(e.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn strings(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn score(value: &Value, framework: &str) -> u32 {
    value
        .get("frameworkScores")
        .and_then(|s| s.get(framework))
        .and_then(Value::as_f64)
        .map(|n| n.round().clamp(0.0, 100.0) as u32)
        .unwrap_or(0)
}
