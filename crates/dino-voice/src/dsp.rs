//! Signal-processing nodes used by the effects graph.
//!
//! Nodes hold only their parameters. Filter state lives on the stack of a
//! single `apply` call, so one node can be shared (behind `Arc`) by every
//! utterance without locking.

use std::f64::consts::PI;

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

use crate::impulse::StereoBuffer;

/// Q for a Butterworth (maximally flat) lowpass.
pub const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Q for the bass-boost peaking filter.
pub const PEAKING_Q: f64 = 1.0;

// ── Biquad ─────────────────────────────────────────────────────────

/// Normalised biquad coefficients (a0 = 1), RBJ audio-EQ cookbook designs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadFilter {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadFilter {
    /// A filter that passes the signal unchanged.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Second-order lowpass at `cutoff_hz`.
    ///
    /// Cut-offs at or above Nyquist leave the signal untouched.
    pub fn lowpass(sample_rate: u32, cutoff_hz: f32, q: f64) -> Self {
        let Some(w0) = angular_frequency(sample_rate, cutoff_hz) else {
            return Self::IDENTITY;
        };
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);

        Self::normalised(
            (1.0 - cos) / 2.0,
            1.0 - cos,
            (1.0 - cos) / 2.0,
            1.0 + alpha,
            -2.0 * cos,
            1.0 - alpha,
        )
    }

    /// Peaking EQ centred on `centre_hz` with `gain_db` boost (or cut).
    pub fn peaking(sample_rate: u32, centre_hz: f32, q: f64, gain_db: f32) -> Self {
        let Some(w0) = angular_frequency(sample_rate, centre_hz) else {
            return Self::IDENTITY;
        };
        let a = 10.0_f64.powf(f64::from(gain_db) / 40.0);
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);

        Self::normalised(
            1.0 + alpha * a,
            -2.0 * cos,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos,
            1.0 - alpha / a,
        )
    }

    fn normalised(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Filter `samples` in place, starting from silence.
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply(&self, samples: &mut [f32]) {
        // Transposed direct form II.
        let (mut z1, mut z2) = (0.0_f64, 0.0_f64);
        for s in samples {
            let x = f64::from(*s);
            let y = self.b0 * x + z1;
            z1 = self.b1 * x - self.a1 * y + z2;
            z2 = self.b2 * x - self.a2 * y;
            *s = y as f32;
        }
    }

    /// Magnitude response at `freq_hz`.
    pub fn magnitude_at(&self, sample_rate: u32, freq_hz: f32) -> f64 {
        let w = 2.0 * PI * f64::from(freq_hz) / f64::from(sample_rate);
        let z1 = Complex::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = Complex::new(self.b0, 0.0) + z1 * self.b1 + z2 * self.b2;
        let den = Complex::new(1.0, 0.0) + z1 * self.a1 + z2 * self.a2;
        (num / den).norm()
    }
}

/// `2π f / fs`, or `None` when `f` is not strictly inside (0, Nyquist).
fn angular_frequency(sample_rate: u32, freq_hz: f32) -> Option<f64> {
    let nyquist = f64::from(sample_rate) / 2.0;
    let freq = f64::from(freq_hz);
    (freq > 0.0 && freq < nyquist).then(|| 2.0 * PI * freq / f64::from(sample_rate))
}

// ── Gain ───────────────────────────────────────────────────────────

/// Linear gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainNode {
    pub gain: f32,
}

impl GainNode {
    pub const fn new(gain: f32) -> Self {
        Self { gain }
    }

    pub fn apply(&self, samples: &mut [f32]) {
        for s in samples {
            *s *= self.gain;
        }
    }
}

// ── Convolution ────────────────────────────────────────────────────

const GAIN_CALIBRATION: f64 = 0.001_25;
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44_100.0;
const MIN_POWER: f64 = 0.000_125;

/// Stereo convolution reverb with a fixed, normalised impulse response.
#[derive(Debug, Clone)]
pub struct ConvolverNode {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl ConvolverNode {
    /// Take ownership of `ir` and normalise it.
    pub fn new(ir: StereoBuffer) -> Self {
        let scale = normalisation_scale(&ir);
        let StereoBuffer {
            mut left,
            mut right,
            ..
        } = ir;
        for s in left.iter_mut().chain(right.iter_mut()) {
            *s *= scale;
        }

        tracing::debug!(ir_len = left.len(), scale, "Convolver impulse response normalised");
        Self { left, right }
    }

    /// Impulse response length per channel.
    pub fn ir_len(&self) -> usize {
        self.left.len()
    }

    /// Convolve a mono signal with both IR channels.
    ///
    /// Each output channel is `input.len() + ir_len() - 1` samples long so
    /// the reverb tail is not cut off. Empty input yields empty output.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn apply(&self, input: &[f32]) -> (Vec<f32>, Vec<f32>) {
        if input.is_empty() || self.left.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let out_len = input.len() + self.left.len() - 1;
        let fft_len = out_len.next_power_of_two();

        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);

        let mut signal = padded(input, fft_len);
        forward.process(&mut signal);

        let scale = 1.0 / fft_len as f32;
        let convolve = |ir: &[f32]| {
            let mut spectrum = padded(ir, fft_len);
            forward.process(&mut spectrum);
            for (bin, s) in spectrum.iter_mut().zip(&signal) {
                *bin *= *s;
            }
            inverse.process(&mut spectrum);
            spectrum
                .iter()
                .take(out_len)
                .map(|c| c.re * scale)
                .collect::<Vec<f32>>()
        };

        let left = convolve(&self.left);
        let right = convolve(&self.right);
        (left, right)
    }
}

fn padded(samples: &[f32], len: usize) -> Vec<Complex<f32>> {
    let mut out = vec![Complex::new(0.0, 0.0); len];
    for (slot, &s) in out.iter_mut().zip(samples) {
        slot.re = s;
    }
    out
}

/// Convolver normalisation: inverse RMS power, calibrated to -58 dB and
/// compensated for the impulse response's sample rate.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn normalisation_scale(ir: &StereoBuffer) -> f32 {
    let len = ir.len();
    if len == 0 {
        return 1.0;
    }

    let energy: f64 = ir
        .left
        .iter()
        .chain(&ir.right)
        .map(|&s| f64::from(s) * f64::from(s))
        .sum();
    let mut power = (energy / (2.0 * len as f64)).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    let mut scale = GAIN_CALIBRATION / power;
    if ir.sample_rate > 0 {
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / f64::from(ir.sample_rate);
    }
    scale as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 48_000;

    #[allow(clippy::cast_precision_loss)]
    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / RATE as f32).sin())
            .collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn lowpass_passes_dc_and_cuts_highs() {
        let lp = BiquadFilter::lowpass(RATE, 2_800.0, BUTTERWORTH_Q);
        assert!((lp.magnitude_at(RATE, 0.0) - 1.0).abs() < 1e-9);
        // Butterworth: -3 dB at the cut-off.
        assert!((lp.magnitude_at(RATE, 2_800.0) - BUTTERWORTH_Q).abs() < 1e-3);
        assert!(lp.magnitude_at(RATE, 12_000.0) < 0.1);
    }

    #[test]
    fn lowpass_attenuates_a_high_tone_in_time_domain() {
        let lp = BiquadFilter::lowpass(RATE, 2_800.0, BUTTERWORTH_Q);
        let mut low = sine(200.0, 4_800);
        let mut high = sine(15_000.0, 4_800);
        lp.apply(&mut low);
        lp.apply(&mut high);
        // Skip the start-up transient.
        assert!(rms(&low[480..]) > 0.6);
        assert!(rms(&high[480..]) < 0.05);
    }

    #[test]
    fn peaking_boosts_by_gain_at_centre() {
        let peak = BiquadFilter::peaking(RATE, 200.0, PEAKING_Q, 4.0);
        let expected = 10.0_f64.powf(4.0 / 20.0);
        assert!((peak.magnitude_at(RATE, 200.0) - expected).abs() < 1e-6);
        // Far from the centre the filter is flat.
        assert!((peak.magnitude_at(RATE, 10_000.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn cutoff_above_nyquist_is_identity() {
        assert_eq!(
            BiquadFilter::lowpass(8_000, 8_000.0, BUTTERWORTH_Q),
            BiquadFilter::IDENTITY
        );
        let mut samples = vec![0.5, -0.25, 1.0];
        BiquadFilter::IDENTITY.apply(&mut samples);
        assert_eq!(samples, vec![0.5, -0.25, 1.0]);
    }

    #[test]
    fn gain_scales_linearly() {
        let mut samples = vec![1.0, -0.5];
        GainNode::new(0.3).apply(&mut samples);
        assert!((samples[0] - 0.3).abs() < f32::EPSILON);
        assert!((samples[1] + 0.15).abs() < f32::EPSILON);
    }

    #[test]
    fn convolution_keeps_the_tail() {
        let ir = StereoBuffer {
            sample_rate: RATE,
            left: vec![0.5; 100],
            right: vec![-0.5; 100],
        };
        let node = ConvolverNode::new(ir);
        let (left, right) = node.apply(&[1.0; 50]);
        assert_eq!(left.len(), 149);
        assert_eq!(right.len(), 149);
    }

    #[test]
    fn convolving_an_impulse_returns_the_scaled_kernel() {
        let kernel_left = vec![1.0, 0.5, 0.25, 0.125];
        let kernel_right = vec![-1.0, 0.0, 0.5, 0.0];
        let ir = StereoBuffer {
            sample_rate: RATE,
            left: kernel_left.clone(),
            right: kernel_right.clone(),
        };
        let scale = normalisation_scale(&ir);
        let node = ConvolverNode::new(ir);

        let (left, right) = node.apply(&[1.0, 0.0, 0.0]);
        assert_eq!(left.len(), 6);
        for (i, &k) in kernel_left.iter().enumerate() {
            assert!((left[i] - k * scale).abs() < 1e-5, "left[{i}]");
        }
        for (i, &k) in kernel_right.iter().enumerate() {
            assert!((right[i] - k * scale).abs() < 1e-5, "right[{i}]");
        }
        assert!(left[4].abs() < 1e-5 && left[5].abs() < 1e-5);
    }

    #[test]
    fn normalisation_uses_rms_power_and_rate() {
        // Constant 0.5 on both channels: RMS power 0.5.
        let ir = StereoBuffer {
            sample_rate: 44_100,
            left: vec![0.5; 10],
            right: vec![0.5; 10],
        };
        assert!((normalisation_scale(&ir) - 0.0025).abs() < 1e-7);

        let ir = StereoBuffer {
            sample_rate: 88_200,
            ..ir
        };
        assert!((normalisation_scale(&ir) - 0.001_25).abs() < 1e-7);
    }

    #[test]
    fn silent_kernel_uses_minimum_power() {
        let ir = StereoBuffer {
            sample_rate: 44_100,
            left: vec![0.0; 8],
            right: vec![0.0; 8],
        };
        assert!((normalisation_scale(&ir) - 10.0).abs() < 1e-4);
    }
}
