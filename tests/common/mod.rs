//! Shared test utilities
//!
//! Mock adapters for exercising the session controller without audio
//! hardware or network access.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use bloom_companion::gateway::{InferenceGateway, SafetyVerdict, SynthesizedSpeech};
use bloom_companion::session::{Turn, UserContext};
use bloom_companion::voice::{AudioSink, SpeechCapture};
use bloom_companion::{CaptureError, Error, Result};

/// Gateway with scripted outcomes and call recorders
pub struct MockGateway {
    reply: Option<String>,
    speech: Option<Vec<u8>>,
    unsafe_reason: Option<String>,
    /// (history length, utterance) per generation call
    pub generate_calls: Arc<Mutex<Vec<(usize, String)>>>,
    /// (text, voice) per synthesis call
    pub synth_calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockGateway {
    /// Gateway that replies with the given text and synthesizes successfully
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            speech: Some(vec![0u8; 4800]),
            unsafe_reason: None,
            generate_calls: Arc::new(Mutex::new(Vec::new())),
            synth_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Gateway whose generation call fails
    pub fn failing_generation() -> Self {
        let mut gateway = Self::replying("");
        gateway.reply = None;
        gateway
    }

    /// Gateway that replies with empty text
    pub fn empty_reply() -> Self {
        Self::replying("")
    }

    /// Gateway that replies but whose synthesis call fails
    pub fn failing_synthesis(text: &str) -> Self {
        let mut gateway = Self::replying(text);
        gateway.speech = None;
        gateway
    }

    /// Gateway whose safety classifier flags every message
    pub fn flagging(reason: &str) -> Self {
        let mut gateway = Self::replying("ok");
        gateway.unsafe_reason = Some(reason.to_string());
        gateway
    }
}

#[async_trait]
impl InferenceGateway for MockGateway {
    async fn generate_reply(
        &self,
        history: &[Turn],
        utterance: &str,
        _context: Option<&UserContext>,
    ) -> Result<String> {
        self.generate_calls
            .lock()
            .await
            .push((history.len(), utterance.to_string()));
        self.reply
            .clone()
            .ok_or_else(|| Error::Generation("mock generation failure".to_string()))
    }

    async fn synthesize_speech(&self, text: &str, voice_id: &str) -> Result<SynthesizedSpeech> {
        self.synth_calls
            .lock()
            .await
            .push((text.to_string(), voice_id.to_string()));
        self.speech
            .clone()
            .map(|pcm| SynthesizedSpeech {
                pcm,
                sample_rate_hz: 24_000,
            })
            .ok_or_else(|| Error::Synthesis("mock synthesis failure".to_string()))
    }

    async fn classify_message_safety(&self, _text: &str, _user_id: &str) -> Result<SafetyVerdict> {
        Ok(self.unsafe_reason.clone().map_or(
            SafetyVerdict {
                is_safe: true,
                reason: None,
            },
            |reason| SafetyVerdict {
                is_safe: false,
                reason: Some(reason),
            },
        ))
    }
}

/// Capture adapter with a scripted transcript
pub struct MockCapture {
    transcript: String,
    partial: String,
    fail_start: Option<CaptureError>,
    active: bool,
}

impl MockCapture {
    /// Capture that yields the given transcript on stop
    pub fn yielding(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            partial: transcript.to_string(),
            fail_start: None,
            active: false,
        }
    }

    /// Capture that detects no speech
    pub fn silent() -> Self {
        Self::yielding("")
    }

    /// Capture whose start fails with the given error
    pub fn failing(error: CaptureError) -> Self {
        let mut capture = Self::silent();
        capture.fail_start = Some(error);
        capture
    }
}

#[async_trait(?Send)]
impl SpeechCapture for MockCapture {
    async fn start(&mut self) -> std::result::Result<(), CaptureError> {
        if let Some(e) = self.fail_start.clone() {
            return Err(e);
        }
        if self.active {
            return Err(CaptureError::AlreadyActive);
        }
        self.active = true;
        Ok(())
    }

    async fn stop(&mut self) -> String {
        self.active = false;
        self.transcript.clone()
    }

    fn partial_transcript(&self) -> String {
        if self.active {
            self.partial.clone()
        } else {
            String::new()
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Playback adapter that records played clips
pub struct MockSink {
    /// Every clip handed to the sink
    pub played: Arc<Mutex<Vec<Vec<u8>>>>,
    fail: bool,
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            played: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Sink whose playback always fails
    pub fn failing() -> Self {
        let mut sink = Self::new();
        sink.fail = true;
        sink
    }
}

#[async_trait(?Send)]
impl AudioSink for MockSink {
    async fn play(&mut self, wav: &[u8]) -> Result<()> {
        if self.fail {
            return Err(Error::Playback("mock playback failure".to_string()));
        }
        self.played.lock().await.push(wav.to_vec());
        Ok(())
    }
}
