#![doc = include_str!("../README.md")]

pub mod domain;
pub mod events;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{EngineCapability, EngineKind, InvalidUtterance, Utterance};
pub use events::AnimationSignal;
pub use ports::{
    AnimationConsumer, EmptyPhraseResolver, NoopAnimation, PhraseResolver, Replacements,
    SpeechPort, SpeechStatusDto,
};
pub use settings::{
    DEFAULT_MAX_TEXT_CHARS, DEFAULT_SAMPLE_RATE, EffectProfileKind, SettingsError, VoiceSettings,
    validate_settings,
};
