//! Speech engine backend traits: engine-agnostic interfaces for the cloned
//! voice and the platform fallback voice.
//!
//! The [`SpeechPipeline`](crate::pipeline::SpeechPipeline) operates on trait
//! objects (`Arc<dyn SynthesisBackend>`, `Arc<dyn PlatformSpeech>`) so that
//! engines can be swapped without touching the session logic.
//!
//! ## Backend implementations
//!
//! | Module | Trait | Engine |
//! |--------|-------|--------|
//! | [`http`] | [`SynthesisBackend`] | Voice-cloning server over HTTP |
//! | [`espeak`] | [`PlatformSpeech`] | `espeak-ng` subprocess |

pub mod espeak;
pub mod http;

pub use espeak::EspeakEngine;
pub use http::HttpSynthesisBackend;

use serde::{Deserialize, Serialize};

use crate::audio_io::SourceHandle;
use crate::error::VoiceError;

// ── Synthesis backend ──────────────────────────────────────────────

/// Backend answer to a sample request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleResponse {
    /// `false` when the backend cannot synthesize right now.
    pub available: bool,

    /// Sample rate of `samples` (Hz).
    #[serde(default)]
    pub sample_rate: u32,

    /// Mono PCM, normalised to [-1, 1].
    #[serde(default)]
    pub samples: Vec<f32>,
}

impl SampleResponse {
    pub const fn unavailable() -> Self {
        Self {
            available: false,
            sample_rate: 0,
            samples: Vec::new(),
        }
    }
}

/// Text-to-samples voice-cloning backend.
///
/// Implementations must be `Send + Sync`; the pipeline shares one instance
/// across all sessions.
#[async_trait::async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Cheap reachability check used once by the capability probe.
    async fn probe(&self) -> Result<(), VoiceError>;

    /// Synthesize `text` at `speed` (1.0 = normal).
    async fn request_samples(&self, text: &str, speed: f32) -> Result<SampleResponse, VoiceError>;
}

// ── Platform speech ────────────────────────────────────────────────

/// A voice offered by the platform engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformVoice {
    /// Identifier passed back to the engine.
    pub id: String,
    /// Human-readable name, matched against the masculine hints.
    pub name: String,
    /// BCP-47-ish locale (`"en-US"`, `"en-gb"`, `"de"`).
    pub locale: String,
    /// Gender the engine reports, when it reports one.
    #[serde(default)]
    pub gender: Option<VoiceGender>,
}

/// Voice gender as listed by the platform engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    Male,
    Female,
}

impl VoiceGender {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

/// One request to the platform engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformUtterance {
    pub text: String,
    pub voice: PlatformVoice,
    /// Pitch, 1.0 = engine default.
    pub pitch: f32,
    /// Rate, 1.0 = engine default.
    pub rate: f32,
}

/// Generic always-available speech engine.
#[async_trait::async_trait]
pub trait PlatformSpeech: Send + Sync {
    /// Installed voices. May be empty.
    async fn voices(&self) -> Result<Vec<PlatformVoice>, VoiceError>;

    /// Start speaking. The handle resolves when speech ends.
    async fn speak(&self, utterance: PlatformUtterance) -> Result<SourceHandle, VoiceError>;

    /// Silence everything this engine is saying.
    fn cancel(&self);
}
