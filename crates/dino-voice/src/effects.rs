//! Effect profiles and the effects graph.
//!
//! ```text
//! source → lowpass → bass boost ─┬─ dry gain ──────────────┐
//!                                └─ reverb → wet gain ─────┴─► master → output
//! ```
//!
//! The graph is built once per process, the first time the cloned voice is
//! used, and shared by every later utterance.

use std::sync::{Arc, OnceLock};

use dino_core::EffectProfileKind;

use crate::audio_io::{AudioContext, PlayableBuffer};
use crate::dsp::{BUTTERWORTH_Q, BiquadFilter, ConvolverNode, GainNode, PEAKING_Q};
use crate::impulse::{StereoBuffer, generate_impulse_response};

// ── Profiles ───────────────────────────────────────────────────────

/// Parameters of one effect profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectProfile {
    pub kind: EffectProfileKind,
    /// Source playback-rate multiplier (below 1.0 lowers pitch and tempo).
    pub playback_rate: f32,
    pub lowpass_hz: f32,
    pub bass_hz: f32,
    pub bass_gain_db: f32,
    pub reverb_secs: f32,
    pub dry: f32,
    pub wet: f32,
    pub master: f32,
}

impl EffectProfile {
    /// Slowed, dark and roomy: the dinosaur character.
    pub const DEEP: Self = Self {
        kind: EffectProfileKind::Deep,
        playback_rate: 0.88,
        lowpass_hz: 2_800.0,
        bass_hz: 200.0,
        bass_gain_db: 4.0,
        reverb_secs: 0.8,
        dry: 0.7,
        wet: 0.3,
        master: 0.9,
    };

    /// Light colouring for an already characterful cloned voice.
    pub const GENTLE: Self = Self {
        kind: EffectProfileKind::Gentle,
        playback_rate: 1.0,
        lowpass_hz: 8_000.0,
        bass_hz: 200.0,
        bass_gain_db: 1.0,
        reverb_secs: 0.2,
        dry: 0.85,
        wet: 0.15,
        master: 0.95,
    };

    pub const fn for_kind(kind: EffectProfileKind) -> Self {
        match kind {
            EffectProfileKind::Deep => Self::DEEP,
            EffectProfileKind::Gentle => Self::GENTLE,
        }
    }
}

impl From<EffectProfileKind> for EffectProfile {
    fn from(kind: EffectProfileKind) -> Self {
        Self::for_kind(kind)
    }
}

// ── Graph ──────────────────────────────────────────────────────────

/// The connected effect nodes for one audio context.
#[derive(Debug)]
pub struct EffectsGraph {
    sample_rate: u32,
    profile: EffectProfile,
    lowpass: BiquadFilter,
    bass: BiquadFilter,
    convolver: ConvolverNode,
    dry: GainNode,
    wet: GainNode,
    master: GainNode,
}

impl EffectsGraph {
    /// Wire the nodes for `profile` at the context's sample rate.
    pub fn build(context: &dyn AudioContext, impulse: StereoBuffer, profile: EffectProfile) -> Self {
        let sample_rate = context.sample_rate();
        if impulse.sample_rate != sample_rate {
            tracing::debug!(
                ir_rate = impulse.sample_rate,
                context_rate = sample_rate,
                "Impulse response rate differs from context rate"
            );
        }

        tracing::info!(
            profile = %profile.kind,
            sample_rate,
            reverb_secs = profile.reverb_secs,
            "Building effects graph"
        );

        Self {
            sample_rate,
            profile,
            lowpass: BiquadFilter::lowpass(sample_rate, profile.lowpass_hz, BUTTERWORTH_Q),
            bass: BiquadFilter::peaking(sample_rate, profile.bass_hz, PEAKING_Q, profile.bass_gain_db),
            convolver: ConvolverNode::new(impulse),
            dry: GainNode::new(profile.dry),
            wet: GainNode::new(profile.wet),
            master: GainNode::new(profile.master),
        }
    }

    /// The node every source connects to.
    pub const fn entry(&self) -> &BiquadFilter {
        &self.lowpass
    }

    pub const fn profile(&self) -> &EffectProfile {
        &self.profile
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Run mono audio through the whole graph.
    ///
    /// The result is stereo and longer than the input by the reverb tail.
    pub fn render(&self, mut mono: Vec<f32>) -> PlayableBuffer {
        self.lowpass.apply(&mut mono);
        self.bass.apply(&mut mono);

        let (mut left, mut right) = self.convolver.apply(&mono);
        self.wet.apply(&mut left);
        self.wet.apply(&mut right);

        // Dry path mixes into both channels.
        self.dry.apply(&mut mono);
        if left.len() < mono.len() {
            left.resize(mono.len(), 0.0);
            right.resize(mono.len(), 0.0);
        }
        for (i, &d) in mono.iter().enumerate() {
            left[i] += d;
            right[i] += d;
        }

        self.master.apply(&mut left);
        self.master.apply(&mut right);

        PlayableBuffer::from_stereo(self.sample_rate, &left, &right)
    }
}

// ── Chain (process-wide, built once) ───────────────────────────────

/// Lazily built, shared effects graph.
#[derive(Debug)]
pub struct EffectsChain {
    profile: EffectProfile,
    graph: OnceLock<Arc<EffectsGraph>>,
}

impl EffectsChain {
    pub const fn new(kind: EffectProfileKind) -> Self {
        Self {
            profile: EffectProfile::for_kind(kind),
            graph: OnceLock::new(),
        }
    }

    pub const fn profile(&self) -> &EffectProfile {
        &self.profile
    }

    /// The graph, building it on first use with a fresh impulse response.
    pub fn get_or_build(&self, context: &dyn AudioContext) -> Arc<EffectsGraph> {
        Arc::clone(self.graph.get_or_init(|| {
            let impulse = generate_impulse_response(context.sample_rate(), self.profile.reverb_secs);
            Arc::new(EffectsGraph::build(context, impulse, self.profile))
        }))
    }

    /// The graph if it has been built.
    pub fn get(&self) -> Option<Arc<EffectsGraph>> {
        self.graph.get().cloned()
    }
}
