//! Speech capture from the microphone
//!
//! The adapter is policy-free: it records one utterance, recognizes it when
//! stopped, and never interprets the text.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::error::CaptureError;
use crate::voice::framer;
use crate::voice::stt::Recognizer;

/// Sample rate for microphone capture (16kHz for speech)
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Minimum captured samples worth recognizing (0.3 seconds at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Captures one utterance of speech, recognized on stop
///
/// While active the adapter may publish partial transcripts; each update
/// replaces the previous value. Stopping yields the final transcript, where
/// the empty string is the valid no-speech result, never an error. A
/// no-speech timeout in the backend behaves exactly like an empty stop.
#[async_trait(?Send)]
pub trait SpeechCapture {
    /// Begin listening
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::PermissionDenied`] if microphone access is
    /// denied, [`CaptureError::NoDevice`] if no capture device is usable,
    /// or [`CaptureError::AlreadyActive`] if capture is already running.
    async fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop listening and yield the final transcript (may be empty)
    async fn stop(&mut self) -> String;

    /// Latest partial transcript; empty when none has been published
    fn partial_transcript(&self) -> String;

    /// Whether capture is currently active
    fn is_active(&self) -> bool;
}

/// Microphone capture through the default input device
pub struct MicCapture {
    recognizer: Arc<dyn Recognizer>,
    buffer: Arc<Mutex<Vec<f32>>>,
    partial: Arc<Mutex<String>>,
    stream: Option<Stream>,
}

impl MicCapture {
    /// Create a capture adapter over the given recognizer
    #[must_use]
    pub fn new(recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            recognizer,
            buffer: Arc::new(Mutex::new(Vec::new())),
            partial: Arc::new(Mutex::new(String::new())),
            stream: None,
        }
    }

    /// Abort capture, discarding any buffered audio without recognition
    pub fn cancel(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("capture cancelled");
        }
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
        if let Ok(mut partial) = self.partial.lock() {
            partial.clear();
        }
    }

    /// Snapshot the captured samples without clearing them
    #[must_use]
    pub fn peek_samples(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Clear the captured sample buffer
    pub fn clear_samples(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    fn open_stream(&self) -> Result<Stream, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let config = input_config(&device)?;
        let buffer = Arc::clone(&self.buffer);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| classify_capture_error(&e.to_string()))?;

        stream
            .play()
            .map_err(|e| classify_capture_error(&e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = CAPTURE_SAMPLE_RATE,
            "capture started"
        );

        Ok(stream)
    }
}

#[async_trait(?Send)]
impl SpeechCapture for MicCapture {
    async fn start(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::AlreadyActive);
        }

        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
        if let Ok(mut partial) = self.partial.lock() {
            partial.clear();
        }

        self.stream = Some(self.open_stream()?);
        Ok(())
    }

    async fn stop(&mut self) -> String {
        let Some(stream) = self.stream.take() else {
            return String::new();
        };
        drop(stream);
        tracing::debug!("capture stopped");

        if let Ok(mut partial) = self.partial.lock() {
            partial.clear();
        }

        let samples = self
            .buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();

        if samples.len() < MIN_SPEECH_SAMPLES {
            tracing::debug!(samples = samples.len(), "too little audio, treating as no speech");
            return String::new();
        }

        let wav = match framer::samples_to_wav(&samples, CAPTURE_SAMPLE_RATE) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!(error = %e, "could not frame captured audio");
                return String::new();
            }
        };

        match self.recognizer.recognize(wav).await {
            Ok(text) => {
                let text = text.trim().to_string();
                tracing::info!(transcript = %text, "utterance recognized");
                text
            }
            Err(e) => {
                // A recognition failure is indistinguishable from silence to
                // the caller; yield the valid empty result.
                tracing::warn!(error = %e, "recognition failed, treating as no speech");
                String::new()
            }
        }
    }

    fn partial_transcript(&self) -> String {
        self.partial
            .lock()
            .map(|partial| partial.clone())
            .unwrap_or_default()
    }

    fn is_active(&self) -> bool {
        self.stream.is_some()
    }
}

/// Find a mono input config at the capture sample rate
fn input_config(device: &Device) -> Result<StreamConfig, CaptureError> {
    let supported = device
        .supported_input_configs()
        .map_err(|e| classify_capture_error(&e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(CAPTURE_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(CAPTURE_SAMPLE_RATE)
        })
        .ok_or(CaptureError::NoDevice)?;

    Ok(supported
        .with_sample_rate(SampleRate(CAPTURE_SAMPLE_RATE))
        .config())
}

/// Map a backend error message onto the capture taxonomy
fn classify_capture_error(message: &str) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        CaptureError::PermissionDenied
    } else {
        CaptureError::NoDevice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_classify_onto_taxonomy() {
        assert_eq!(
            classify_capture_error("Access denied by the system"),
            CaptureError::PermissionDenied
        );
        assert_eq!(
            classify_capture_error("microphone permission not granted"),
            CaptureError::PermissionDenied
        );
        assert_eq!(
            classify_capture_error("the requested device is no longer available"),
            CaptureError::NoDevice
        );
    }
}
