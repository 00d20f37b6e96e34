//! Command handlers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use dino_core::{AnimationConsumer, EmptyPhraseResolver, SpeechPort, VoiceSettings};
use dino_voice::audio_io::AudioContextFactory;
use dino_voice::backend::{PlatformSpeech, VoiceGender};
use dino_voice::fallback::select_voice;
use dino_voice::{
    EspeakEngine, HttpSynthesisBackend, SpeechEvent, SpeechPipeline, SpeechService,
    SynthesisBackend,
};

use crate::commands::SayArgs;
use crate::settings::apply_overrides;

/// Animation consumer for a terminal: logs what a character would do.
#[derive(Debug, Default)]
pub struct LogAnimation {
    speaking: AtomicBool,
}

impl AnimationConsumer for LogAnimation {
    fn play_animation(&self, name: &str, looping: bool) {
        info!(animation = name, looping, "Animation");
    }

    fn set_speaking(&self, speaking: bool) {
        self.speaking.store(speaking, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}

/// Audio output for the cloned voice.
#[cfg(feature = "local-audio")]
fn audio_factory(settings: &VoiceSettings) -> Arc<dyn AudioContextFactory> {
    Arc::new(dino_voice::LocalAudioContextFactory {
        sample_rate: settings.sample_rate,
    })
}

/// Without local audio the cloned voice has nowhere to play.
#[cfg(not(feature = "local-audio"))]
fn audio_factory(_settings: &VoiceSettings) -> Arc<dyn AudioContextFactory> {
    Arc::new(dino_voice::NoAudioOutput)
}

/// Wire the pipeline from settings.
fn build_service(
    settings: VoiceSettings,
) -> anyhow::Result<(SpeechService, UnboundedReceiver<SpeechEvent>)> {
    let backend = settings
        .backend_url
        .as_deref()
        .map(HttpSynthesisBackend::new)
        .transpose()?
        .map(|backend| Arc::new(backend) as Arc<dyn SynthesisBackend>);
    if backend.is_none() {
        info!("No backend URL configured, using the platform voice");
    }

    let factory = audio_factory(&settings);
    let (pipeline, events) = SpeechPipeline::new(
        settings,
        backend,
        factory,
        Arc::new(EspeakEngine::new()),
        Arc::new(LogAnimation::default()),
    );

    Ok((SpeechService::new(pipeline, Arc::new(EmptyPhraseResolver)), events))
}

/// Speak one line and wait for it to finish (or for Ctrl-C).
pub async fn handle_say(settings: VoiceSettings, args: &SayArgs) -> anyhow::Result<()> {
    let settings = apply_overrides(settings, args)?;
    let (service, mut events) = build_service(settings)?;

    let capability = service.init().await;
    info!(available = capability.available, "Cloned voice probe finished");

    service.speak(Some(&args.text), args.interrupt).await;
    match drain_progress(&mut events) {
        Progress::Silent => {
            warn!("Nothing was spoken");
            return Ok(());
        }
        Progress::Finished => return Ok(()),
        Progress::Playing => {}
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SpeechEvent::SpeakingFinished) | None => break,
                Some(event) => log_event(&event),
            },
            _ = tokio::signal::ctrl_c() => {
                service.shutdown();
                break;
            }
        }
    }

    Ok(())
}

/// Where an utterance stood when `speak` returned.
#[derive(Debug, PartialEq, Eq)]
pub enum Progress {
    /// No audio started.
    Silent,
    /// Audio is still playing.
    Playing,
    /// Audio started and already ended.
    Finished,
}

/// Read the events already queued for the utterance that just returned.
///
/// A very short line can start and finish before `speak` returns, so the
/// events are the record of what happened, not the live speaking flag.
pub fn drain_progress(events: &mut UnboundedReceiver<SpeechEvent>) -> Progress {
    let mut progress = Progress::Silent;
    while let Ok(event) = events.try_recv() {
        match event {
            SpeechEvent::SpeakingStarted { engine } => {
                info!(engine = engine.label(), "Speaking");
                progress = Progress::Playing;
            }
            SpeechEvent::SpeakingFinished if progress == Progress::Playing => {
                progress = Progress::Finished;
            }
            event => log_event(&event),
        }
    }
    progress
}

fn log_event(event: &SpeechEvent) {
    match event {
        SpeechEvent::Error(message) => warn!(%message, "Speech error"),
        event => debug!(?event, "Speech event"),
    }
}

/// List platform voices, marking the one the fallback would pick.
pub async fn handle_voices(settings: &VoiceSettings) -> anyhow::Result<()> {
    let engine = EspeakEngine::new();
    let voices = engine.voices().await?;
    if voices.is_empty() {
        println!("No platform voices installed.");
        return Ok(());
    }

    let language = settings.language.to_lowercase();
    let hints: Vec<String> = settings
        .masculine_voice_hints
        .iter()
        .map(|hint| hint.to_lowercase())
        .collect();
    let chosen = select_voice(&voices, &language, &hints).map(|voice| voice.id.clone());

    println!("{:<2}{:<24} {:<10} {:<7} NAME", "", "ID", "LOCALE", "GENDER");
    for voice in &voices {
        let marker = if chosen.as_deref() == Some(voice.id.as_str()) {
            "*"
        } else {
            ""
        };
        let gender = voice.gender.map_or("-", VoiceGender::label);
        println!(
            "{marker:<2}{:<24} {:<10} {gender:<7} {}",
            voice.id, voice.locale, voice.name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dino_core::EngineKind;
    use dino_voice::SessionState;

    #[test]
    fn log_animation_tracks_flag() {
        let animation = LogAnimation::default();
        animation.set_speaking(true);
        assert!(animation.is_speaking());
        animation.play_animation("idle", true);
        animation.set_speaking(false);
        assert!(!animation.is_speaking());
    }

    #[tokio::test]
    async fn service_without_backend_reports_unavailable() {
        let (service, _events) = build_service(VoiceSettings::default()).unwrap();
        let capability = service.init().await;
        assert!(capability.checked);
        assert!(!capability.available);
    }

    #[test]
    fn utterance_that_already_ended_counts_as_spoken() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(SpeechEvent::StateChanged(SessionState::Requesting)).unwrap();
        tx.send(SpeechEvent::SpeakingStarted {
            engine: EngineKind::Platform,
        })
        .unwrap();
        tx.send(SpeechEvent::SpeakingFinished).unwrap();
        tx.send(SpeechEvent::StateChanged(SessionState::Idle)).unwrap();

        assert_eq!(drain_progress(&mut rx), Progress::Finished);
    }

    #[test]
    fn progress_tracks_started_and_silent_utterances() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(SpeechEvent::StateChanged(SessionState::Requesting)).unwrap();
        tx.send(SpeechEvent::SpeakingStarted {
            engine: EngineKind::Cloned,
        })
        .unwrap();
        assert_eq!(drain_progress(&mut rx), Progress::Playing);

        // A previous session's stop, seen before anything started, is not
        // this utterance finishing.
        tx.send(SpeechEvent::SpeakingFinished).unwrap();
        tx.send(SpeechEvent::Error("no voices".to_string())).unwrap();
        assert_eq!(drain_progress(&mut rx), Progress::Silent);
    }

    #[tokio::test]
    async fn blank_text_returns_without_speaking() {
        let args = SayArgs {
            text: "   ".to_string(),
            ..SayArgs::default()
        };
        handle_say(VoiceSettings::default(), &args).await.unwrap();
    }
}
