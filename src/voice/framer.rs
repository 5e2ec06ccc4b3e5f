//! Audio framing
//!
//! Wraps raw PCM sample bytes in a WAV container so any standard decoder
//! can determine format and sample count from the header alone. Pure and
//! deterministic; no I/O.

use std::io::Cursor;

use crate::error::FramingError;

/// Default channel count for synthesized speech
pub const DEFAULT_CHANNELS: u16 = 1;

/// Default sample rate for synthesized speech (matches common TTS output)
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Default bit depth for synthesized speech
pub const DEFAULT_BIT_DEPTH: u16 = 16;

/// A synthesized audio clip awaiting framing
///
/// Constructed once per agent reply, consumed by playback, then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    /// Raw little-endian PCM sample bytes
    pub pcm: Vec<u8>,
    /// Channel count
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate_hz: u32,
    /// Bits per sample
    pub bits_per_sample: u16,
}

impl AudioPayload {
    /// Create a payload for 16-bit mono PCM, the format the gateway returns
    #[must_use]
    pub const fn mono16(pcm: Vec<u8>, sample_rate_hz: u32) -> Self {
        Self {
            pcm,
            channels: DEFAULT_CHANNELS,
            sample_rate_hz,
            bits_per_sample: DEFAULT_BIT_DEPTH,
        }
    }

    /// Frame this payload into a WAV container
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::InvalidSampleData`] if the sample buffer does
    /// not match the declared parameters.
    pub fn frame(&self) -> Result<Vec<u8>, FramingError> {
        frame(
            &self.pcm,
            self.channels,
            self.sample_rate_hz,
            self.bits_per_sample,
        )
    }
}

/// Frame raw PCM bytes into a WAV container
///
/// The header declares the given channel count, sample rate, and bit depth,
/// with a data-chunk length equal to `pcm.len()`; the sample bytes are
/// carried through unmodified. Supported bit depths are 16, 24, and 32
/// (signed little-endian integer PCM).
///
/// # Errors
///
/// Returns [`FramingError::InvalidSampleData`] if `pcm` is empty, is not a
/// multiple of the block align, or the parameters are unsupported.
pub fn frame(
    pcm: &[u8],
    channels: u16,
    sample_rate_hz: u32,
    bits_per_sample: u16,
) -> Result<Vec<u8>, FramingError> {
    if pcm.is_empty() {
        return Err(FramingError::InvalidSampleData(
            "empty sample buffer".to_string(),
        ));
    }
    if channels == 0 {
        return Err(FramingError::InvalidSampleData(
            "zero channels".to_string(),
        ));
    }
    if !matches!(bits_per_sample, 16 | 24 | 32) {
        return Err(FramingError::InvalidSampleData(format!(
            "unsupported bit depth {bits_per_sample}"
        )));
    }

    let block_align = usize::from(channels) * usize::from(bits_per_sample / 8);
    if pcm.len() % block_align != 0 {
        return Err(FramingError::InvalidSampleData(format!(
            "{} bytes is not a multiple of block align {block_align}",
            pcm.len()
        )));
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate: sample_rate_hz,
        bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| FramingError::InvalidSampleData(e.to_string()))?;

        let result = match bits_per_sample {
            16 => pcm.chunks_exact(2).try_for_each(|b| {
                writer.write_sample(i16::from_le_bytes([b[0], b[1]]))
            }),
            24 => pcm.chunks_exact(3).try_for_each(|b| {
                // Sign-extend the 24-bit little-endian value
                let v = (i32::from_le_bytes([b[0], b[1], b[2], 0]) << 8) >> 8;
                writer.write_sample(v)
            }),
            _ => pcm.chunks_exact(4).try_for_each(|b| {
                writer.write_sample(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }),
        };
        result.map_err(|e| FramingError::InvalidSampleData(e.to_string()))?;

        writer
            .finalize()
            .map_err(|e| FramingError::InvalidSampleData(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Frame raw PCM with the default synthesis parameters (mono, 24kHz, 16-bit)
///
/// # Errors
///
/// Returns [`FramingError::InvalidSampleData`] on malformed input.
pub fn frame_default(pcm: &[u8]) -> Result<Vec<u8>, FramingError> {
    frame(pcm, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, DEFAULT_BIT_DEPTH)
}

/// Convert f32 capture samples to WAV bytes for recognition
///
/// # Errors
///
/// Returns [`FramingError::InvalidSampleData`] if `samples` is empty.
pub fn samples_to_wav(samples: &[f32], sample_rate_hz: u32) -> Result<Vec<u8>, FramingError> {
    let mut pcm = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        // Convert f32 [-1.0, 1.0] to i16
        #[allow(clippy::cast_possible_truncation)]
        let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        pcm.extend_from_slice(&sample_i16.to_le_bytes());
    }

    frame(&pcm, 1, sample_rate_hz, 16)
}
