#![doc = include_str!("../README.md")]

pub mod audio_io;
pub mod backend;
pub mod cloned;
pub mod decode;
pub mod dsp;
pub mod effects;
pub mod error;
pub mod fallback;
pub mod impulse;
pub mod pipeline;
#[cfg(feature = "local-audio")]
pub mod playback;
pub mod probe;
pub mod service;
pub mod text_utils;

// Re-export key types for convenience
pub use audio_io::{AudioContext, AudioContextFactory, NoAudioOutput, SourceEnd, SourceHandle};
pub use backend::{EspeakEngine, HttpSynthesisBackend, PlatformSpeech, SynthesisBackend};
pub use effects::{EffectProfile, EffectsChain, EffectsGraph};
pub use error::VoiceError;
pub use impulse::{StereoBuffer, generate_impulse_response};
pub use pipeline::{SessionState, SpeechEvent, SpeechPipeline};
#[cfg(feature = "local-audio")]
pub use playback::{LocalAudioContext, LocalAudioContextFactory};
pub use service::SpeechService;
