//! Audio playback to speakers

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Plays a framed audio clip and resolves when it ends
#[async_trait(?Send)]
pub trait AudioSink {
    /// Play a WAV clip to completion
    ///
    /// At most one playback is active; a new call supersedes any clip that
    /// is still playing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Playback`] on decode or device failure.
    async fn play(&mut self, wav: &[u8]) -> Result<()>;
}

/// Plays audio through the default output device
pub struct AudioPlayback {
    /// Stop flag handed to the active playback; replaced on each play
    supersede: Arc<AtomicBool>,
}

impl AudioPlayback {
    /// Create a new playback instance
    ///
    /// # Errors
    ///
    /// Returns [`Error::Playback`] if no output device is available.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        host.default_output_device()
            .ok_or_else(|| Error::Playback("no output device available".to_string()))?;

        Ok(Self {
            supersede: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Play mono samples in a blocking manner
    fn play_samples_blocking(
        samples: Vec<f32>,
        sample_rate_hz: u32,
        cancel: &Arc<AtomicBool>,
    ) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Playback("no output device".to_string()))?;

        let config = output_config(&device, sample_rate_hz)?;
        let channels = config.channels as usize;

        let sample_count = samples.len();
        let samples = Arc::new(samples);
        let position = Arc::new(Mutex::new(0usize));
        let finished = Arc::new(AtomicBool::new(false));

        let samples_cb = Arc::clone(&samples);
        let position_cb = Arc::clone(&position);
        let finished_cb = Arc::clone(&finished);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position_cb.lock().unwrap();

                    for frame in data.chunks_mut(channels) {
                        let sample = if *pos < samples_cb.len() {
                            samples_cb[*pos]
                        } else {
                            finished_cb.store(true, Ordering::SeqCst);
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }

                        if *pos < samples_cb.len() {
                            *pos += 1;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Playback(e.to_string()))?;

        stream.play().map_err(|e| Error::Playback(e.to_string()))?;

        // Poll for completion, bounded by the clip duration plus slack
        let duration_ms = (sample_count as u64 * 1000) / u64::from(sample_rate_hz);
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(duration_ms + 500);

        while !finished.load(Ordering::SeqCst) && !cancel.load(Ordering::SeqCst) {
            if start.elapsed() > timeout {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        // Small delay to let the device drain
        if !cancel.load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(100));
        }

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }
}

#[async_trait(?Send)]
impl AudioSink for AudioPlayback {
    #[allow(clippy::unused_async)]
    async fn play(&mut self, wav: &[u8]) -> Result<()> {
        let (samples, sample_rate_hz) = decode_wav(wav)?;

        // Supersede any clip that is still playing
        self.supersede.store(true, Ordering::SeqCst);
        let cancel = Arc::new(AtomicBool::new(false));
        self.supersede = Arc::clone(&cancel);

        Self::play_samples_blocking(samples, sample_rate_hz, &cancel)
    }
}

/// Decode a WAV clip to mono f32 samples plus its sample rate
#[allow(clippy::cast_precision_loss)]
fn decode_wav(wav: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::new(Cursor::new(wav))
        .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?,
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        interleaved
    } else {
        // Downmix: average the channels of each frame
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

/// Find an output config at the clip's sample rate, preferring mono
fn output_config(device: &Device, sample_rate_hz: u32) -> Result<StreamConfig> {
    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Playback(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(sample_rate_hz)
                && c.max_sample_rate() >= SampleRate(sample_rate_hz)
        })
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(sample_rate_hz)
                    && c.max_sample_rate() >= SampleRate(sample_rate_hz)
            })
        })
        .ok_or_else(|| Error::Playback("no suitable output config found".to_string()))?;

    Ok(supported.with_sample_rate(SampleRate(sample_rate_hz)).config())
}
