//! Cloned-voice adapter: backend PCM → decode → effects graph → output.
//!
//! Every suspension point is followed by a generation check. A result that
//! belongs to a superseded session is dropped without side effects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dino_core::EffectProfileKind;

use crate::audio_io::{AudioContext, ContextState, SourceControl, SourceHandle};
use crate::backend::{SampleResponse, SynthesisBackend};
use crate::decode::{PcmAudio, decode_pcm};
use crate::effects::EffectsChain;
use crate::error::VoiceError;

// ── Generation guard ───────────────────────────────────────────────

/// Captured session generation, compared against the live counter.
#[derive(Debug, Clone)]
pub struct GenerationGuard {
    counter: Arc<AtomicU64>,
    generation: u64,
}

impl GenerationGuard {
    pub const fn new(counter: Arc<AtomicU64>, generation: u64) -> Self {
        Self {
            counter,
            generation,
        }
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether no newer session has started since this guard was taken.
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.generation
    }
}

// ── Outcomes ───────────────────────────────────────────────────────

/// Classified backend answer.
#[derive(Debug)]
pub enum SynthesisOutcome {
    /// Audio to play.
    Ok(PcmAudio),
    /// The backend cannot synthesize right now (or sent no audio).
    Unavailable,
    /// The request failed.
    Error(VoiceError),
}

impl From<Result<SampleResponse, VoiceError>> for SynthesisOutcome {
    fn from(result: Result<SampleResponse, VoiceError>) -> Self {
        match result {
            Ok(response) if !response.available || response.samples.is_empty() => Self::Unavailable,
            Ok(response) => Self::Ok(PcmAudio::new(response.sample_rate, response.samples)),
            Err(e) => Self::Error(e),
        }
    }
}

/// What happened to a cloned-voice utterance.
#[derive(Debug)]
pub enum ClonedPlayback {
    /// Audio is playing.
    Started(SourceHandle),
    /// This utterance should go to the platform voice instead.
    FallbackRequested(String),
    /// A newer session took over; nothing was played.
    Superseded,
}

// ── Adapter ────────────────────────────────────────────────────────

/// Speaks through the synthesis backend and the effects graph.
pub struct ClonedVoiceAdapter {
    backend: Arc<dyn SynthesisBackend>,
    chain: Arc<EffectsChain>,
    current: Mutex<Option<Arc<dyn SourceControl>>>,
}

impl ClonedVoiceAdapter {
    pub fn new(backend: Arc<dyn SynthesisBackend>, profile: EffectProfileKind) -> Self {
        Self {
            backend,
            chain: Arc::new(EffectsChain::new(profile)),
            current: Mutex::new(None),
        }
    }

    /// The shared effects chain.
    pub fn chain(&self) -> &EffectsChain {
        &self.chain
    }

    /// Synthesize `text` and start it on `context`.
    pub async fn speak(
        &self,
        context: &Arc<dyn AudioContext>,
        text: &str,
        speed: f32,
        guard: &GenerationGuard,
    ) -> ClonedPlayback {
        match context.state() {
            ContextState::Running => {}
            ContextState::Suspended => {
                if let Err(e) = context.resume().await {
                    return ClonedPlayback::FallbackRequested(e.to_string());
                }
                if !guard.is_current() {
                    return ClonedPlayback::Superseded;
                }
            }
            ContextState::Closed => {
                return ClonedPlayback::FallbackRequested(VoiceError::ContextClosed.to_string());
            }
        }

        self.stop_current();

        let outcome = SynthesisOutcome::from(self.backend.request_samples(text, speed).await);
        if !guard.is_current() {
            tracing::debug!(generation = guard.generation(), "Discarding stale synthesis result");
            return ClonedPlayback::Superseded;
        }

        let pcm = match outcome {
            SynthesisOutcome::Ok(pcm) => pcm,
            SynthesisOutcome::Unavailable => {
                return ClonedPlayback::FallbackRequested("backend unavailable".to_string());
            }
            SynthesisOutcome::Error(e) => return ClonedPlayback::FallbackRequested(e.to_string()),
        };

        let chain = Arc::clone(&self.chain);
        let ctx = Arc::clone(context);
        let rendered = tokio::task::spawn_blocking(move || {
            let mono = decode_pcm(pcm, ctx.sample_rate())?;
            let graph = chain.get_or_build(ctx.as_ref());
            Ok::<_, VoiceError>(graph.render(mono))
        })
        .await
        .map_err(VoiceError::from)
        .and_then(|result| result);

        if !guard.is_current() {
            tracing::debug!(generation = guard.generation(), "Discarding stale rendered audio");
            return ClonedPlayback::Superseded;
        }

        let buffer = match rendered {
            Ok(buffer) => buffer,
            Err(e) => return ClonedPlayback::FallbackRequested(e.to_string()),
        };

        let playback_rate = self.chain.profile().playback_rate;
        tracing::debug!(
            frames = buffer.frames(),
            seconds = buffer.duration_secs(),
            playback_rate,
            "Starting cloned-voice source"
        );

        match context.start(buffer, playback_rate) {
            Ok(handle) => {
                *self.lock_current() = Some(Arc::clone(&handle.control));
                ClonedPlayback::Started(handle)
            }
            Err(e) => ClonedPlayback::FallbackRequested(e.to_string()),
        }
    }

    /// Stop the source this adapter last started, if any.
    pub fn stop_current(&self) {
        let previous = self.lock_current().take();
        if let Some(control) = previous {
            control.stop();
        }
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<Arc<dyn SourceControl>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
