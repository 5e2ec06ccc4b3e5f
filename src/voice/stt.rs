//! Speech recognition backend for the capture adapter

use async_trait::async_trait;

use crate::{Error, Result};

/// Response from an `OpenAI`-compatible transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Turns a framed audio clip into text
///
/// An empty transcript is a valid result meaning no speech was detected.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognize speech in a WAV clip
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recognition`] if the backend fails.
    async fn recognize(&self, wav: Vec<u8>) -> Result<String>;
}

/// Recognizer backed by an `OpenAI`-compatible transcription endpoint
pub struct WhisperRecognizer {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl WhisperRecognizer {
    /// Create a new recognizer
    #[must_use]
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Recognizer for WhisperRecognizer {
    async fn recognize(&self, wav: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), model = %self.model, "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Recognition(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let mut request = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Recognition(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Recognition(format!(
                "transcription API error {status}: {body}"
            )));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Recognition(e.to_string()))?;

        tracing::debug!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}
