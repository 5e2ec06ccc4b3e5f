//! Voice processing module
//!
//! Speech capture, audio framing, recognition, and playback. Reply
//! generation and synthesis are routed through the inference gateway
//! (see `gateway`).

mod capture;
mod framer;
mod playback;
mod stt;

pub use capture::{CAPTURE_SAMPLE_RATE, MicCapture, SpeechCapture};
pub use framer::{
    AudioPayload, DEFAULT_BIT_DEPTH, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, frame, frame_default,
    samples_to_wav,
};
pub use playback::{AudioPlayback, AudioSink};
pub use stt::{Recognizer, WhisperRecognizer};
