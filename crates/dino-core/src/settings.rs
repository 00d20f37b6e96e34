//! Settings domain types and validation.
//!
//! These are pure configuration types with no infrastructure dependencies.
//! The composition root builds a [`VoiceSettings`] from defaults, an optional
//! JSON file and command-line overrides, then validates it once.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default output sample rate for the audio-processing context (Hz).
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Default maximum utterance length in characters.
pub const DEFAULT_MAX_TEXT_CHARS: usize = 500;

/// Default probe timeout in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

/// Which effects profile colours the cloned voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectProfileKind {
    /// Slowed, dark and roomy: the dinosaur character.
    #[default]
    #[serde(alias = "dinosaur")]
    Deep,
    /// Light touch on a cloned voice: short room, little colouring.
    #[serde(alias = "cloned")]
    Gentle,
}

impl EffectProfileKind {
    /// Stable lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Deep => "deep",
            Self::Gentle => "gentle",
        }
    }
}

impl fmt::Display for EffectProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EffectProfileKind {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deep" | "dinosaur" => Ok(Self::Deep),
            "gentle" | "cloned" => Ok(Self::Gentle),
            other => Err(SettingsError::UnknownProfile(other.to_string())),
        }
    }
}

/// Character voice settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Effects profile for the cloned voice.
    pub profile: EffectProfileKind,

    /// Synthesis speed factor sent to the backend (0.5–2.0).
    pub speed: f32,

    /// Target language prefix for fallback voice selection (e.g. `"en"`).
    pub language: String,

    /// Case-insensitive name fragments preferred when picking a fallback
    /// voice. Platform dependent; the default list is only a starting point.
    pub masculine_voice_hints: Vec<String>,

    /// Fallback engine pitch (1.0 = engine default).
    pub fallback_pitch: f32,

    /// Fallback engine rate (1.0 = engine default).
    pub fallback_rate: f32,

    /// How long the capability probe may take before the cloned engine is
    /// written off.
    pub probe_timeout_ms: u64,

    /// Longest accepted utterance, in characters.
    pub max_text_chars: usize,

    /// Animation looped while talking.
    pub talk_animation: String,

    /// Animation looped after talking.
    pub idle_animation: String,

    /// Base URL of the cloned-voice synthesis backend, if any.
    pub backend_url: Option<String>,

    /// Output sample rate of the audio-processing context (Hz).
    pub sample_rate: u32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            profile: EffectProfileKind::Deep,
            speed: 1.0,
            language: "en".to_string(),
            masculine_voice_hints: ["david", "mark", "daniel", "james", "alex", "fred", "george"]
                .into_iter()
                .map(String::from)
                .collect(),
            fallback_pitch: 0.8,
            fallback_rate: 0.9,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            talk_animation: "talk".to_string(),
            idle_animation: "idle".to_string(),
            backend_url: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl VoiceSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&raw)?;
        validate_settings(&settings)?;
        tracing::debug!(path = %path.display(), profile = %settings.profile, "Loaded voice settings");
        Ok(settings)
    }
}

/// Errors from settings parsing and validation.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("speed must be between 0.5 and 2.0, got {0}")]
    InvalidSpeed(f32),

    #[error("{field} must be between 0.1 and 2.0, got {value}")]
    InvalidProsody { field: &'static str, value: f32 },

    #[error("sample rate must be between 8000 and 192000 Hz, got {0}")]
    InvalidSampleRate(u32),

    #[error("language must not be empty")]
    EmptyLanguage,

    #[error("max_text_chars must be at least 1")]
    InvalidMaxChars,

    #[error("probe_timeout_ms must be at least 1")]
    InvalidProbeTimeout,

    #[error("unknown effect profile '{0}' (expected 'deep' or 'gentle')")]
    UnknownProfile(String),

    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Validate settings values.
pub fn validate_settings(settings: &VoiceSettings) -> Result<(), SettingsError> {
    if !(0.5..=2.0).contains(&settings.speed) {
        return Err(SettingsError::InvalidSpeed(settings.speed));
    }

    for (field, value) in [
        ("fallback_pitch", settings.fallback_pitch),
        ("fallback_rate", settings.fallback_rate),
    ] {
        if !(0.1..=2.0).contains(&value) {
            return Err(SettingsError::InvalidProsody { field, value });
        }
    }

    if !(8_000..=192_000).contains(&settings.sample_rate) {
        return Err(SettingsError::InvalidSampleRate(settings.sample_rate));
    }

    if settings.language.trim().is_empty() {
        return Err(SettingsError::EmptyLanguage);
    }

    if settings.max_text_chars == 0 {
        return Err(SettingsError::InvalidMaxChars);
    }

    if settings.probe_timeout_ms == 0 {
        return Err(SettingsError::InvalidProbeTimeout);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let settings = VoiceSettings::default();
        assert!(validate_settings(&settings).is_ok());
        assert_eq!(settings.profile, EffectProfileKind::Deep);
        assert_eq!(settings.max_text_chars, 500);
    }

    #[test]
    fn rejects_out_of_range_speed() {
        let settings = VoiceSettings {
            speed: 3.0,
            ..VoiceSettings::default()
        };
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidSpeed(_))
        ));
    }

    #[test]
    fn rejects_bad_prosody() {
        let settings = VoiceSettings {
            fallback_rate: 0.0,
            ..VoiceSettings::default()
        };
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidProsody {
                field: "fallback_rate",
                ..
            })
        ));
    }

    #[test]
    fn profile_parses_from_aliases() {
        assert_eq!("dinosaur".parse::<EffectProfileKind>().unwrap(), EffectProfileKind::Deep);
        assert_eq!("Gentle".parse::<EffectProfileKind>().unwrap(), EffectProfileKind::Gentle);
        assert_eq!("cloned".parse::<EffectProfileKind>().unwrap(), EffectProfileKind::Gentle);
        assert!("cave".parse::<EffectProfileKind>().is_err());
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"profile": "cloned", "speed": 1.2}}"#).unwrap();

        let settings = VoiceSettings::load(file.path()).unwrap();
        assert_eq!(settings.profile, EffectProfileKind::Gentle);
        assert!((settings.speed - 1.2).abs() < f32::EPSILON);
        assert_eq!(settings.language, "en");
        assert_eq!(settings.talk_animation, "talk");
    }

    #[test]
    fn load_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sample_rate": 100}}"#).unwrap();

        assert!(matches!(
            VoiceSettings::load(file.path()),
            Err(SettingsError::InvalidSampleRate(100))
        ));
    }
}
