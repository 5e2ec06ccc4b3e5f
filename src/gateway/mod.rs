//! Remote inference gateway
//!
//! All model inference consumed by the companion goes through this seam:
//! reply generation, speech synthesis, and the message safety gate used by
//! the group chat. Implementations are opaque request/response calls; the
//! session controller never sees transport details.

mod http;

use async_trait::async_trait;

pub use http::HttpGateway;

use crate::Result;
use crate::session::{Turn, UserContext};

/// Raw synthesized speech returned by the gateway
///
/// Linear PCM (16-bit little-endian mono), unframed; the caller wraps it in
/// a playable container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedSpeech {
    /// Raw PCM sample bytes
    pub pcm: Vec<u8>,
    /// Sample rate of the PCM data in Hz
    pub sample_rate_hz: u32,
}

/// Verdict from the message safety classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    /// Whether the message may be posted
    pub is_safe: bool,
    /// Why the message was blocked, when it was
    pub reason: Option<String>,
}

/// Remote model inference consumed by the session controller
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Generate a companion reply to `utterance` given the conversation so far
    ///
    /// `history` excludes the new utterance. The returned text may be empty;
    /// callers decide how to degrade.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Generation`] if the call fails.
    async fn generate_reply(
        &self,
        history: &[Turn],
        utterance: &str,
        context: Option<&UserContext>,
    ) -> Result<String>;

    /// Synthesize speech for a reply using the given voice
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Synthesis`] if the call fails.
    async fn synthesize_speech(&self, text: &str, voice_id: &str) -> Result<SynthesizedSpeech>;

    /// Classify whether a message is safe to post (group chat gate)
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Safety`] if the call fails.
    async fn classify_message_safety(&self, text: &str, user_id: &str) -> Result<SafetyVerdict>;
}
