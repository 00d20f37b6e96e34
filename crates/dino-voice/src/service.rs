//! `SpeechService`: the adapter that implements `SpeechPort`.
//!
//! This module is the single place where `dino-voice` native types are
//! converted to the transport-agnostic DTOs defined in `dino-core`.
//!
//! # Locking discipline
//!
//! The service keeps only small std-locked state (mute flag, last message).
//! No lock is held across an `.await`; session locking happens inside the
//! pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

use dino_core::{
    EngineCapability, PhraseResolver, Replacements, SpeechPort, SpeechStatusDto, Utterance,
};

use crate::pipeline::SpeechPipeline;

/// Implements [`SpeechPort`] on top of a [`SpeechPipeline`].
pub struct SpeechService {
    pipeline: SpeechPipeline,
    phrases: Arc<dyn PhraseResolver>,
    muted: AtomicBool,
    /// Last accepted text, replayed by `repeat`.
    last_message: Mutex<Option<String>>,
}

impl SpeechService {
    pub fn new(pipeline: SpeechPipeline, phrases: Arc<dyn PhraseResolver>) -> Self {
        Self {
            pipeline,
            phrases,
            muted: AtomicBool::new(false),
            last_message: Mutex::new(None),
        }
    }

    /// The wrapped pipeline.
    pub const fn pipeline(&self) -> &SpeechPipeline {
        &self.pipeline
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Stop speech before the application exits.
    pub fn shutdown(&self) {
        info!("Shutting down speech service");
        self.pipeline.stop();
    }

    fn last_message(&self) -> Option<String> {
        self.last_message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SpeechPort for SpeechService {
    async fn init(&self) -> EngineCapability {
        self.pipeline.init().await
    }

    async fn speak(&self, text: Option<&str>, interrupt: bool) {
        if self.is_muted() {
            tracing::debug!("Muted, ignoring speak");
            return;
        }

        let settings = self.pipeline.settings();
        let utterance =
            match Utterance::parse(text, settings.speed, interrupt, settings.max_text_chars) {
                Ok(utterance) => utterance,
                Err(reason) => {
                    tracing::debug!(%reason, "Ignoring utterance");
                    return;
                }
            };

        *self
            .last_message
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(utterance.text().to_string());

        self.pipeline.speak_utterance(&utterance).await;
    }

    async fn speak_phrase(
        &self,
        category: &str,
        subcategory: Option<&str>,
        replacements: &Replacements,
        interrupt: bool,
    ) {
        let text = self.phrases.resolve(category, subcategory, replacements);
        if text.trim().is_empty() {
            tracing::debug!(category, ?subcategory, "No phrase resolved");
            return;
        }
        self.speak(Some(&text), interrupt).await;
    }

    async fn repeat(&self) {
        match self.last_message() {
            Some(text) => self.speak(Some(&text), true).await,
            None => tracing::debug!("Nothing to repeat"),
        }
    }

    fn stop(&self) {
        self.pipeline.stop();
    }

    fn set_muted(&self, muted: bool) {
        let was = self.muted.swap(muted, Ordering::SeqCst);
        if was != muted {
            info!(muted, "Speech mute changed");
        }
        if muted {
            self.pipeline.stop();
        }
    }

    fn toggle_mute(&self) -> bool {
        let muted = !self.muted.fetch_xor(true, Ordering::SeqCst);
        info!(muted, "Speech mute toggled");
        if muted {
            self.pipeline.stop();
        }
        muted
    }

    fn status(&self) -> SpeechStatusDto {
        let capability = self.pipeline.capability();
        SpeechStatusDto {
            state: self.pipeline.state().label().to_string(),
            engine_checked: capability.checked,
            engine_available: capability.available,
            profile: self.pipeline.settings().profile.label().to_string(),
            muted: self.is_muted(),
            speaking: self.pipeline.is_speaking(),
            last_message: self.last_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_io::{NoAudioOutput, SourceControl, SourceHandle};
    use crate::backend::{
        PlatformSpeech, PlatformUtterance, PlatformVoice, SampleResponse, SynthesisBackend,
    };
    use crate::error::VoiceError;
    use dino_core::{NoopAnimation, VoiceSettings};
    use mockall::mock;

    mock! {
        pub Backend {}

        #[async_trait]
        impl SynthesisBackend for Backend {
            async fn probe(&self) -> Result<(), VoiceError>;
            async fn request_samples(&self, text: &str, speed: f32) -> Result<SampleResponse, VoiceError>;
        }
    }

    /// Platform engine that records what it was asked to say.
    #[derive(Default)]
    struct RecordingPlatform {
        spoken: Mutex<Vec<String>>,
        // Held so every utterance keeps playing until stopped.
        ends: Mutex<Vec<tokio::sync::oneshot::Sender<crate::audio_io::SourceEnd>>>,
    }

    struct Silent;

    impl SourceControl for Silent {
        fn stop(&self) {}
    }

    #[async_trait]
    impl PlatformSpeech for RecordingPlatform {
        async fn voices(&self) -> Result<Vec<PlatformVoice>, VoiceError> {
            Ok(vec![PlatformVoice {
                id: "en".to_string(),
                name: "English".to_string(),
                locale: "en-US".to_string(),
                gender: None,
            }])
        }

        async fn speak(&self, utterance: PlatformUtterance) -> Result<SourceHandle, VoiceError> {
            self.spoken.lock().unwrap().push(utterance.text);
            let (handle, ended) = SourceHandle::new(Arc::new(Silent));
            self.ends.lock().unwrap().push(ended);
            Ok(handle)
        }

        fn cancel(&self) {}
    }

    struct Phrases;

    impl PhraseResolver for Phrases {
        fn resolve(&self, category: &str, subcategory: Option<&str>, replacements: &Replacements) -> String {
            match (category, subcategory) {
                ("praise", _) => "Great job!".to_string(),
                ("letter", Some("named")) => {
                    format!("That is the letter {}", replacements.get("letter").map_or("?", String::as_str))
                }
                _ => String::new(),
            }
        }
    }

    fn service(backend: MockBackend) -> (SpeechService, Arc<RecordingPlatform>) {
        let platform = Arc::new(RecordingPlatform::default());
        let (pipeline, _rx) = SpeechPipeline::new(
            VoiceSettings::default(),
            Some(Arc::new(backend)),
            Arc::new(NoAudioOutput),
            platform.clone(),
            Arc::new(NoopAnimation::new()),
        );
        (SpeechService::new(pipeline, Arc::new(Phrases)), platform)
    }

    fn unreachable_backend() -> MockBackend {
        let mut backend = MockBackend::new();
        backend.expect_probe().times(0..=1).returning(|| Ok(()));
        backend.expect_request_samples().never();
        backend
    }

    #[tokio::test]
    async fn muted_speak_contacts_no_engine() {
        let mut backend = MockBackend::new();
        backend.expect_probe().never();
        backend.expect_request_samples().never();
        let (service, platform) = service(backend);

        service.set_muted(true);
        service.speak(Some("Hello"), false).await;

        assert!(platform.spoken.lock().unwrap().is_empty());
        assert!(service.status().muted);
        assert_eq!(service.status().last_message, None);
    }

    #[tokio::test]
    async fn toggle_mute_flips_and_reports() {
        let (service, _) = service(unreachable_backend());
        assert!(service.toggle_mute());
        assert!(service.is_muted());
        assert!(!service.toggle_mute());
        assert!(!service.is_muted());
    }

    #[tokio::test]
    async fn speaks_through_fallback_when_no_output_exists() {
        let (service, platform) = service(unreachable_backend());

        service.speak(Some("Hmm... hello!"), false).await;

        assert_eq!(*platform.spoken.lock().unwrap(), vec!["Hmm, hello!,".to_string()]);
        let status = service.status();
        assert!(status.engine_checked);
        assert!(!status.engine_available);
        assert!(status.speaking);
        assert_eq!(status.state, "fallbackPlaying");
        assert_eq!(status.last_message.as_deref(), Some("Hmm... hello!"));
    }

    #[tokio::test]
    async fn repeat_replays_last_message() {
        let (service, platform) = service(unreachable_backend());

        service.repeat().await;
        assert!(platform.spoken.lock().unwrap().is_empty());

        service.speak(Some("Roar"), false).await;
        service.repeat().await;
        assert_eq!(
            *platform.spoken.lock().unwrap(),
            vec!["Roar".to_string(), "Roar".to_string()]
        );
    }

    #[tokio::test]
    async fn phrases_are_resolved_and_empty_ones_skipped() {
        let (service, platform) = service(unreachable_backend());

        let mut replacements = Replacements::new();
        replacements.insert("letter".to_string(), "B".to_string());
        service.speak_phrase("letter", Some("named"), &replacements, false).await;
        service.speak_phrase("unknown", None, &Replacements::new(), false).await;

        assert_eq!(
            *platform.spoken.lock().unwrap(),
            vec!["That is the letter B".to_string()]
        );
    }

    #[tokio::test]
    async fn rejected_text_is_not_remembered() {
        let (service, _) = service(unreachable_backend());
        service.speak(Some("   "), false).await;
        service.speak(Some(&"a".repeat(501)), false).await;
        assert_eq!(service.status().last_message, None);
        assert_eq!(service.status().state, "idle");
    }
}
