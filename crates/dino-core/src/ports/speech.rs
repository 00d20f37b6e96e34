//! Speech port: the public surface of the character voice.
//!
//! # Design Rules
//!
//! - DTOs here are transport-agnostic wire shapes (no `dino-voice` types).
//! - Conversion from `dino-voice` native types happens inside `dino-voice`.
//! - No method returns an error. Invalid input, unreachable engines and
//!   stale results are logged and absorbed by the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::EngineCapability;
use crate::ports::phrase::Replacements;

/// Snapshot of the speech service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechStatusDto {
    /// Session state label (`"idle"`, `"requesting"`, `"playing"`,
    /// `"fallbackPlaying"`).
    pub state: String,
    /// Whether the capability probe has run.
    pub engine_checked: bool,
    /// Whether the cloned-voice engine is in use.
    pub engine_available: bool,
    /// Active effect profile label.
    pub profile: String,
    /// Whether speech is muted.
    pub muted: bool,
    /// Whether the character is currently talking.
    pub speaking: bool,
    /// Last accepted text, used by `repeat`.
    pub last_message: Option<String>,
}

/// Port trait for speaking text through the character voice.
///
/// Implemented by `SpeechService` in `dino-voice`.
#[async_trait]
pub trait SpeechPort: Send + Sync {
    /// Probe the cloned-voice engine. Idempotent; later calls return the
    /// first result without probing again.
    async fn init(&self) -> EngineCapability;

    /// Speak `text`. `None`, empty and over-long text are ignored.
    async fn speak(&self, text: Option<&str>, interrupt: bool);

    /// Resolve a phrase and speak it. Empty resolutions are ignored.
    async fn speak_phrase(
        &self,
        category: &str,
        subcategory: Option<&str>,
        replacements: &Replacements,
        interrupt: bool,
    );

    /// Speak the last accepted text again, interrupting current speech.
    async fn repeat(&self);

    /// Stop current speech. No-op when idle.
    fn stop(&self);

    /// Mute or unmute. Muting stops current speech.
    fn set_muted(&self, muted: bool);

    /// Flip the mute state and return the new value.
    fn toggle_mute(&self) -> bool;

    /// Current status snapshot.
    fn status(&self) -> SpeechStatusDto;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Transcript(Mutex<Vec<String>>);

    #[async_trait]
    impl SpeechPort for Transcript {
        async fn init(&self) -> EngineCapability {
            EngineCapability::unavailable()
        }

        async fn speak(&self, text: Option<&str>, _interrupt: bool) {
            if let Some(text) = text {
                self.0.lock().unwrap().push(text.to_string());
            }
        }

        async fn speak_phrase(
            &self,
            category: &str,
            _subcategory: Option<&str>,
            _replacements: &Replacements,
            interrupt: bool,
        ) {
            self.speak(Some(category), interrupt).await;
        }

        async fn repeat(&self) {}

        fn stop(&self) {}

        fn set_muted(&self, _muted: bool) {}

        fn toggle_mute(&self) -> bool {
            false
        }

        fn status(&self) -> SpeechStatusDto {
            SpeechStatusDto {
                state: "idle".to_string(),
                engine_checked: true,
                engine_available: false,
                profile: "deep".to_string(),
                muted: false,
                speaking: false,
                last_message: self.0.lock().unwrap().last().cloned(),
            }
        }
    }

    #[tokio::test]
    async fn port_is_usable_as_a_trait_object() {
        let port: Arc<dyn SpeechPort> = Arc::new(Transcript::default());
        assert!(port.init().await.checked);

        port.speak(Some("Hello"), false).await;
        port.speak_phrase("praise", None, &Replacements::new(), true).await;

        assert_eq!(port.status().last_message.as_deref(), Some("praise"));
    }

    #[test]
    fn status_serializes_camel_case() {
        let status = Transcript::default().status();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["engineChecked"], true);
        assert_eq!(json["lastMessage"], serde_json::Value::Null);
    }
}
