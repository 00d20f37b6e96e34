//! Backend PCM → playable mono samples at the context rate.
//!
//! The backend sends normalised mono float PCM at its own sample rate. Decoding
//! validates it and resamples to the audio context's rate so the effects graph
//! and the output device agree on one rate.

use rubato::{FftFixedIn, Resampler as _};

use crate::error::VoiceError;

/// Lowest sample rate accepted from the backend (Hz).
pub const MIN_SAMPLE_RATE: u32 = 3_000;

/// Highest sample rate accepted from the backend (Hz).
pub const MAX_SAMPLE_RATE: u32 = 768_000;

/// Raw mono PCM as received from the synthesis backend.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl PcmAudio {
    pub const fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Validate `pcm` and resample it to `target_rate`.
///
/// CPU-bound; callers on the async runtime should wrap it in
/// `spawn_blocking`.
pub fn decode_pcm(pcm: PcmAudio, target_rate: u32) -> Result<Vec<f32>, VoiceError> {
    if pcm.samples.is_empty() {
        return Err(VoiceError::DecodeError("no samples".to_string()));
    }
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&pcm.sample_rate) {
        return Err(VoiceError::DecodeError(format!(
            "unsupported sample rate {} Hz",
            pcm.sample_rate
        )));
    }
    if let Some(index) = pcm.samples.iter().position(|s| !s.is_finite()) {
        return Err(VoiceError::DecodeError(format!(
            "non-finite sample at index {index}"
        )));
    }

    if pcm.sample_rate == target_rate {
        return Ok(pcm.samples);
    }

    let resampled = resample(&pcm.samples, pcm.sample_rate, target_rate)?;
    tracing::debug!(
        from = pcm.sample_rate,
        to = target_rate,
        input = pcm.samples.len(),
        output = resampled.len(),
        "Resampled backend audio"
    );
    Ok(resampled)
}

/// Resample mono audio from one sample rate to another.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, VoiceError> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let chunk_size = 1024;

    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        chunk_size,
        2, // sub-chunks for quality
        1, // mono
    )
    .map_err(|e| VoiceError::ResampleError(e.to_string()))?;

    let mut output = Vec::new();

    let mut pos = 0;
    while pos + chunk_size <= samples.len() {
        let chunk = &samples[pos..pos + chunk_size];
        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| VoiceError::ResampleError(e.to_string()))?;
        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
        pos += chunk_size;
    }

    // Zero-pad the last partial chunk, keep only its share of the output.
    if pos < samples.len() {
        let remaining = &samples[pos..];
        let mut padded = vec![0.0f32; chunk_size];
        padded[..remaining.len()].copy_from_slice(remaining);

        let result = resampler
            .process(&[&padded], None)
            .map_err(|e| VoiceError::ResampleError(e.to_string()))?;
        if let Some(channel) = result.first() {
            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss
            )]
            let output_len =
                (remaining.len() as f64 * f64::from(to_rate) / f64::from(from_rate)).ceil() as usize;
            let take = output_len.min(channel.len());
            output.extend_from_slice(&channel[..take]);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_passes_through() {
        let pcm = PcmAudio::new(48_000, vec![0.1, -0.2, 0.3]);
        assert_eq!(decode_pcm(pcm, 48_000).unwrap(), vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn upsampling_scales_length() {
        let pcm = PcmAudio::new(24_000, vec![0.0; 24_000]);
        let out = decode_pcm(pcm, 48_000).unwrap();
        // One second in, roughly one second out.
        assert!((46_000..=48_100).contains(&out.len()), "got {}", out.len());
    }

    #[test]
    fn rejects_empty_audio() {
        let pcm = PcmAudio::new(24_000, Vec::new());
        assert!(matches!(
            decode_pcm(pcm, 48_000),
            Err(VoiceError::DecodeError(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_rate() {
        let pcm = PcmAudio::new(1_000, vec![0.0; 10]);
        assert!(matches!(
            decode_pcm(pcm, 48_000),
            Err(VoiceError::DecodeError(_))
        ));
    }

    #[test]
    fn rejects_non_finite_samples() {
        let pcm = PcmAudio::new(48_000, vec![0.0, f32::NAN]);
        let err = decode_pcm(pcm, 48_000).unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }
}
