//! Bloom Companion - voice conversation session controller
//!
//! This library turns a noisy bundle of asynchronous inputs (speech
//! capture, typed text, remote reply generation, remote speech synthesis,
//! audio playback) into a single race-free, turn-taking conversation with
//! the Bloom wellness companion.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Caller (UI)                        │
//! │   submit_utterance │ start/stop_capture │ state     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Session Controller                      │
//! │   idle → listening → thinking → speaking → idle     │
//! └──────┬──────────────┬──────────────────┬────────────┘
//!        │              │                  │
//! ┌──────▼─────┐ ┌──────▼──────────┐ ┌─────▼───────────┐
//! │  Capture   │ │ Inference       │ │ Framer →        │
//! │  (mic+STT) │ │ Gateway         │ │ Playback        │
//! └────────────┘ │ (reply │ speech │ └─────────────────┘
//!                │  │ safety)      │
//!                └─────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod session;
pub mod voice;

pub use config::{Config, GatewayConfig, VoiceConfig};
pub use error::{CaptureError, Error, FramingError, Result};
pub use gateway::{HttpGateway, InferenceGateway, SafetyVerdict, SynthesizedSpeech};
pub use session::{
    EMPTY_REPLY_FALLBACK, GENERATION_FALLBACK, SessionController, SessionOptions, SessionState,
    Speaker, Turn, UserContext,
};
pub use voice::{
    AudioPayload, AudioPlayback, AudioSink, MicCapture, Recognizer, SpeechCapture,
    WhisperRecognizer,
};
