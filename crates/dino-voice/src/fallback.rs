//! Platform fallback voice.
//!
//! Always available and independent of the capability probe. Picks a voice
//! by heuristic, shapes the text for a slower delivery and speaks it with
//! a lowered pitch and rate. No effects graph is involved.

use std::sync::Arc;

use dino_core::VoiceSettings;

use crate::audio_io::SourceHandle;
use crate::backend::{PlatformSpeech, PlatformUtterance, PlatformVoice, VoiceGender};
use crate::error::VoiceError;
use crate::text_utils::shape_prosody;

/// Drives the platform speech engine.
pub struct FallbackAdapter {
    engine: Arc<dyn PlatformSpeech>,
    language: String,
    hints: Vec<String>,
    pitch: f32,
    rate: f32,
}

impl FallbackAdapter {
    pub fn new(engine: Arc<dyn PlatformSpeech>, settings: &VoiceSettings) -> Self {
        Self {
            engine,
            language: settings.language.to_lowercase(),
            hints: settings
                .masculine_voice_hints
                .iter()
                .map(|hint| hint.to_lowercase())
                .collect(),
            pitch: settings.fallback_pitch,
            rate: settings.fallback_rate,
        }
    }

    /// Speak `text` on the platform engine.
    ///
    /// Returns `Ok(None)` when the engine has no voices or the shaped text is
    /// empty; nothing is spoken in that case.
    pub async fn speak(&self, text: &str) -> Result<Option<SourceHandle>, VoiceError> {
        let voices = self.engine.voices().await?;
        let Some(voice) = select_voice(&voices, &self.language, &self.hints) else {
            tracing::warn!(language = %self.language, "No platform voices installed, staying silent");
            return Ok(None);
        };

        let shaped = shape_prosody(text);
        if shaped.is_empty() {
            return Ok(None);
        }

        tracing::debug!(voice = %voice.name, locale = %voice.locale, "Speaking with platform voice");
        let handle = self
            .engine
            .speak(PlatformUtterance {
                text: shaped,
                voice: voice.clone(),
                pitch: self.pitch,
                rate: self.rate,
            })
            .await?;
        Ok(Some(handle))
    }

    /// Silence anything the platform engine is saying.
    pub fn cancel(&self) {
        self.engine.cancel();
    }
}

/// Pick the voice for `language`, preferring masculine voices.
///
/// Order: locale match whose name contains a hint, locale match the engine
/// lists as male, first locale match, first voice. `language` and `hints`
/// are expected lowercase.
pub fn select_voice<'a>(
    voices: &'a [PlatformVoice],
    language: &str,
    hints: &[String],
) -> Option<&'a PlatformVoice> {
    let in_language: Vec<&PlatformVoice> = voices
        .iter()
        .filter(|voice| voice.locale.to_lowercase().starts_with(language))
        .collect();

    let hinted = in_language.iter().find(|voice| {
        let name = voice.name.to_lowercase();
        hints.iter().any(|hint| name.contains(hint.as_str()))
    });

    hinted
        .or_else(|| {
            in_language
                .iter()
                .find(|voice| voice.gender == Some(VoiceGender::Male))
        })
        .or_else(|| in_language.first())
        .copied()
        .or_else(|| voices.first())
}
