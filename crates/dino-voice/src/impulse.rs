//! Procedural impulse response for the convolution reverb.
//!
//! The kernel is decaying white noise: every sample is `uniform(-1, 1)`
//! scaled by `(1 - i/N)^2.5`. Left and right channels draw independent
//! noise so the reverb tail has some width.

use rand::Rng;

/// Envelope exponent. Higher values make the tail die away faster.
const DECAY_EXPONENT: f32 = 2.5;

/// A two-channel sample buffer at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBuffer {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl StereoBuffer {
    /// Per-channel length in samples.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Duration in seconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f32 {
        self.len() as f32 / self.sample_rate as f32
    }
}

/// Number of samples per channel for `duration_secs` at `sample_rate`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless
)]
pub fn impulse_len(sample_rate: u32, duration_secs: f32) -> usize {
    (f64::from(sample_rate) * f64::from(duration_secs)).round() as usize
}

/// Generate a fresh impulse response with thread-local randomness.
///
/// `sample_rate` must be positive and `duration_secs` positive and finite.
pub fn generate_impulse_response(sample_rate: u32, duration_secs: f32) -> StereoBuffer {
    generate_impulse_response_with(&mut rand::rng(), sample_rate, duration_secs)
}

/// Generate an impulse response from the given random source.
pub fn generate_impulse_response_with<R: Rng>(
    rng: &mut R,
    sample_rate: u32,
    duration_secs: f32,
) -> StereoBuffer {
    debug_assert!(sample_rate > 0, "sample rate must be positive");
    debug_assert!(
        duration_secs.is_finite() && duration_secs > 0.0,
        "duration must be positive and finite"
    );

    let len = impulse_len(sample_rate, duration_secs);
    let left = decaying_noise(rng, len);
    let right = decaying_noise(rng, len);

    tracing::trace!(sample_rate, duration_secs, len, "Generated impulse response");

    StereoBuffer {
        sample_rate,
        left,
        right,
    }
}

/// Envelope value at sample `i` of `len`.
#[allow(clippy::cast_precision_loss)]
pub fn envelope(i: usize, len: usize) -> f32 {
    (1.0 - i as f32 / len as f32).powf(DECAY_EXPONENT)
}

fn decaying_noise<R: Rng>(rng: &mut R, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| rng.random_range(-1.0f32..1.0) * envelope(i, len))
        .collect()
}
