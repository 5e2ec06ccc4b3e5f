//! `OpenAI`-compatible HTTP gateway

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{InferenceGateway, SafetyVerdict, SynthesizedSpeech};
use crate::config::GatewayConfig;
use crate::session::{Speaker, Turn, UserContext};
use crate::{Error, Result};

/// Sampling temperature for reply generation
const TEMPERATURE: f64 = 0.9;

/// Max tokens for a generated reply
const MAX_TOKENS: u32 = 1024;

/// Sample rate of raw PCM speech returned by the gateway
const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// The companion persona prompt
const SYSTEM_PROMPT: &str = "You are an AI therapist named Bloom. Your goal is to provide a safe, supportive, and empathetic space for the user to share their thoughts and feelings.

- Listen actively and respond with empathy and understanding.
- Ask open-ended questions to encourage reflection.
- Do not give direct advice, but help the user explore their own solutions.
- Keep your responses concise and conversational.
- Maintain a calm and non-judgmental tone.
- Do not diagnose or provide medical advice.
- If the user is in crisis, provide a supportive message and gently suggest they contact a crisis hotline or a mental health professional.";

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

#[derive(Serialize)]
struct ModerationRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Deserialize)]
struct ModerationResult {
    flagged: bool,
    #[serde(default)]
    categories: BTreeMap<String, bool>,
}

/// Gateway backed by an `OpenAI`-compatible inference router
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    text_model: String,
    tts_model: String,
}

impl HttpGateway {
    /// Create a new gateway
    #[must_use]
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        text_model: String,
        tts_model: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            text_model,
            tts_model,
        }
    }

    /// Create a gateway from configuration
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.text_model.clone(),
            config.tts_model.clone(),
        )
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.post(format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        request
    }
}

#[async_trait]
impl InferenceGateway for HttpGateway {
    async fn generate_reply(
        &self,
        history: &[Turn],
        utterance: &str,
        context: Option<&UserContext>,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: build_system_prompt(context),
        });
        for turn in history {
            messages.push(ChatMessage {
                role: match turn.speaker {
                    Speaker::User => "user",
                    Speaker::Agent => "assistant",
                },
                content: turn.text.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: utterance.to_string(),
        });

        let request = ChatRequest {
            model: self.text_model.clone(),
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        tracing::debug!(
            model = %self.text_model,
            history_len = history.len(),
            "requesting reply"
        );

        let response = self
            .post("/v1/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::Generation(format!("chat API error {status}: {body}")));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        let text = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        tracing::debug!(reply_len = text.len(), "reply received");
        Ok(text)
    }

    async fn synthesize_speech(&self, text: &str, voice_id: &str) -> Result<SynthesizedSpeech> {
        let request = SpeechRequest {
            model: &self.tts_model,
            input: text,
            voice: voice_id,
            response_format: "pcm",
        };

        tracing::debug!(model = %self.tts_model, voice = voice_id, "requesting synthesis");

        let response = self
            .post("/v1/audio/speech")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "speech API error");
            return Err(Error::Synthesis(format!(
                "speech API error {status}: {body}"
            )));
        }

        let pcm = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?
            .to_vec();

        if pcm.is_empty() {
            return Err(Error::Synthesis("gateway returned no audio".to_string()));
        }

        tracing::debug!(audio_bytes = pcm.len(), "synthesis complete");
        Ok(SynthesizedSpeech {
            pcm,
            sample_rate_hz: SPEECH_SAMPLE_RATE,
        })
    }

    async fn classify_message_safety(&self, text: &str, user_id: &str) -> Result<SafetyVerdict> {
        tracing::debug!(user = user_id, "classifying message safety");

        let request = ModerationRequest { input: text };

        let response = self
            .post("/v1/moderations")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Safety(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "moderation API error");
            return Err(Error::Safety(format!(
                "moderation API error {status}: {body}"
            )));
        }

        let result: ModerationResponse = response
            .json()
            .await
            .map_err(|e| Error::Safety(e.to_string()))?;

        Ok(result
            .results
            .into_iter()
            .next()
            .map_or(
                SafetyVerdict {
                    is_safe: true,
                    reason: None,
                },
                verdict_from,
            ))
    }
}

/// Compose the persona prompt plus the optional wellness context
fn build_system_prompt(context: Option<&UserContext>) -> String {
    let mut prompt = SYSTEM_PROMPT.to_string();

    if let Some(ctx) = context {
        prompt.push_str(&format!(
            "\n\nUser Context:\n- Current Mood: {}\n- Sleep Last Night: {} hours\n- Steps Today: {}",
            ctx.mood, ctx.sleep_hours, ctx.steps
        ));
        if let Some(name) = &ctx.name {
            prompt.push_str(&format!("\n- User Name: {name}"));
        }
        prompt.push_str(
            "\n\nUse this context to personalize your response. If the user's mood is low or sleep is poor, acknowledge it gently.",
        );
    }

    prompt
}

/// Reduce a moderation result to a verdict
fn verdict_from(result: ModerationResult) -> SafetyVerdict {
    if !result.flagged {
        return SafetyVerdict {
            is_safe: true,
            reason: None,
        };
    }

    let flagged: Vec<String> = result
        .categories
        .into_iter()
        .filter_map(|(name, hit)| hit.then_some(name))
        .collect();

    let reason = if flagged.is_empty() {
        "flagged by moderation".to_string()
    } else {
        flagged.join(", ")
    };

    SafetyVerdict {
        is_safe: false,
        reason: Some(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_without_context_is_bare_persona() {
        let prompt = build_system_prompt(None);
        assert!(prompt.starts_with("You are an AI therapist named Bloom."));
        assert!(!prompt.contains("User Context"));
    }

    #[test]
    fn system_prompt_includes_wellness_context() {
        let ctx = UserContext {
            mood: "anxious".to_string(),
            sleep_hours: 5.5,
            steps: 3200,
            name: Some("Sam".to_string()),
        };
        let prompt = build_system_prompt(Some(&ctx));
        assert!(prompt.contains("- Current Mood: anxious"));
        assert!(prompt.contains("- Sleep Last Night: 5.5 hours"));
        assert!(prompt.contains("- Steps Today: 3200"));
        assert!(prompt.contains("- User Name: Sam"));
        assert!(prompt.contains("acknowledge it gently"));
    }

    #[test]
    fn system_prompt_omits_absent_name() {
        let ctx = UserContext {
            mood: "calm".to_string(),
            sleep_hours: 8.0,
            steps: 9000,
            name: None,
        };
        let prompt = build_system_prompt(Some(&ctx));
        assert!(!prompt.contains("User Name"));
    }

    #[test]
    fn unflagged_result_is_safe() {
        let verdict = verdict_from(ModerationResult {
            flagged: false,
            categories: BTreeMap::new(),
        });
        assert!(verdict.is_safe);
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn flagged_result_reports_categories() {
        let mut categories = BTreeMap::new();
        categories.insert("harassment".to_string(), true);
        categories.insert("self-harm".to_string(), false);
        categories.insert("violence".to_string(), true);

        let verdict = verdict_from(ModerationResult {
            flagged: true,
            categories,
        });
        assert!(!verdict.is_safe);
        assert_eq!(verdict.reason.as_deref(), Some("harassment, violence"));
    }
}
