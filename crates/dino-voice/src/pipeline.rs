//! Playback session manager: routes utterances and drives the character.
//!
//! The pipeline is a state machine over a single playback session:
//!
//! ```text
//!   Idle → Requesting → Playing ─────────→ Idle
//!               │                           ▲
//!               └──→ FallbackPlaying ───────┘
//!   (any state → Idle on stop() or a superseding speak())
//! ```
//!
//! Each accepted `speak` starts a new session with a fresh generation.
//! Asynchronous work for an older generation is discarded when it resumes.
//! `StartTalking` is delivered when audio begins. Every session gets exactly
//! one `StopTalking` when it ends (completion, failure, `stop()` or a newer
//! `speak`), whether or not it reached audio. The one exception is a session
//! no engine could voice at all, which ends silently.
//!
//! Animation signals are queued while the session lock is held and delivered
//! after it is released, in order, so a consumer may call back into the
//! pipeline.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use dino_core::{
    AnimationConsumer, AnimationSignal, EngineCapability, EngineKind, Utterance, VoiceSettings,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::audio_io::{AudioContext, AudioContextFactory, SourceControl, SourceEnd, SourceHandle};
use crate::backend::{PlatformSpeech, SynthesisBackend};
use crate::cloned::{ClonedPlayback, ClonedVoiceAdapter, GenerationGuard};
use crate::fallback::FallbackAdapter;
use crate::probe::CapabilityProbe;

// ── Session state machine ──────────────────────────────────────────

/// State of the active playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// Nothing is being said.
    #[default]
    Idle,

    /// Waiting on the cloned-voice backend (or the probe).
    Requesting,

    /// Cloned voice is playing through the effects graph.
    Playing,

    /// The platform voice has taken over this utterance.
    FallbackPlaying,
}

impl SessionState {
    /// Stable label, matching the serde name.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Playing => "playing",
            Self::FallbackPlaying => "fallbackPlaying",
        }
    }
}

// ── Events emitted by the pipeline ─────────────────────────────────

/// Events emitted by the pipeline to the application layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// Session state changed.
    StateChanged(SessionState),

    /// Audio began and `StartTalking` was delivered.
    SpeakingStarted { engine: EngineKind },

    /// The session ended and `StopTalking` was delivered.
    SpeakingFinished,

    /// The cloned voice could not handle an utterance.
    FallbackUsed { reason: String },

    /// A non-fatal error (logged; speech degraded to fallback or silence).
    Error(String),
}

// ── Session ────────────────────────────────────────────────────────

#[derive(Default)]
struct Session {
    generation: u64,
    state: SessionState,
    source: Option<Arc<dyn SourceControl>>,
    /// A session exists that still owes its `StopTalking`.
    open: bool,
    /// Audio began and `StartTalking` was delivered.
    started: bool,
}

/// Animation signals waiting for delivery outside the session lock.
///
/// Whoever flushes first delivers everything queued, including signals
/// queued by re-entrant calls made from inside the consumer.
#[derive(Default)]
struct SignalQueue {
    pending: Mutex<VecDeque<AnimationSignal>>,
    flushing: AtomicBool,
}

impl SignalQueue {
    fn push(&self, signal: AnimationSignal) {
        self.lock_pending().push_back(signal);
    }

    fn flush(&self, mut deliver: impl FnMut(AnimationSignal)) {
        loop {
            if self.flushing.swap(true, Ordering::AcqRel) {
                return;
            }
            {
                let _release = FlushGuard(&self.flushing);
                loop {
                    let next = self.lock_pending().pop_front();
                    let Some(signal) = next else { break };
                    deliver(signal);
                }
            }
            // A signal pushed after the last pop but before the release would
            // otherwise wait for the next flush.
            if self.lock_pending().is_empty() {
                return;
            }
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<AnimationSignal>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

/// The character voice session manager.
///
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SpeechPipeline {
    inner: Arc<Inner>,
}

struct Inner {
    settings: VoiceSettings,
    backend: Option<Arc<dyn SynthesisBackend>>,
    context_factory: Arc<dyn AudioContextFactory>,
    probe: CapabilityProbe,
    cloned: Option<ClonedVoiceAdapter>,
    fallback: FallbackAdapter,
    animation: Arc<dyn AnimationConsumer>,
    generation: Arc<AtomicU64>,
    session: Mutex<Session>,
    signals: SignalQueue,
    event_tx: mpsc::UnboundedSender<SpeechEvent>,
}

impl SpeechPipeline {
    /// Create a new pipeline.
    ///
    /// Returns the pipeline and a receiver for [`SpeechEvent`]s. Without a
    /// `backend` the cloned voice is never available.
    pub fn new(
        settings: VoiceSettings,
        backend: Option<Arc<dyn SynthesisBackend>>,
        context_factory: Arc<dyn AudioContextFactory>,
        platform: Arc<dyn PlatformSpeech>,
        animation: Arc<dyn AnimationConsumer>,
    ) -> (Self, mpsc::UnboundedReceiver<SpeechEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let inner = Inner {
            probe: CapabilityProbe::new(Duration::from_millis(settings.probe_timeout_ms)),
            cloned: backend
                .clone()
                .map(|backend| ClonedVoiceAdapter::new(backend, settings.profile)),
            fallback: FallbackAdapter::new(platform, &settings),
            backend,
            context_factory,
            animation,
            generation: Arc::new(AtomicU64::new(0)),
            session: Mutex::new(Session::default()),
            signals: SignalQueue::default(),
            event_tx,
            settings,
        };

        (
            Self {
                inner: Arc::new(inner),
            },
            event_rx,
        )
    }

    /// The settings this pipeline was built with.
    pub fn settings(&self) -> &VoiceSettings {
        &self.inner.settings
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.inner.lock_session().state
    }

    /// Whether the active session has started talking.
    pub fn is_speaking(&self) -> bool {
        self.inner.lock_session().started
    }

    /// What the capability probe found so far.
    pub fn capability(&self) -> EngineCapability {
        self.inner.probe.capability()
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Run the capability probe. Idempotent.
    pub async fn init(&self) -> EngineCapability {
        self.init_context().await;
        self.inner.probe.capability()
    }

    /// Speak `text`, replacing whatever is being said.
    ///
    /// `None`, empty, whitespace-only and over-long text is ignored without
    /// touching the current session. Returns once audio has started (or the
    /// utterance ended without audio).
    pub async fn speak(&self, text: Option<&str>, interrupt: bool) {
        let settings = &self.inner.settings;
        match Utterance::parse(text, settings.speed, interrupt, settings.max_text_chars) {
            Ok(utterance) => self.speak_utterance(&utterance).await,
            Err(reason) => tracing::debug!(%reason, "Ignoring utterance"),
        }
    }

    /// Speak an already validated utterance.
    pub async fn speak_utterance(&self, utterance: &Utterance) {
        let guard = self.inner.begin_session();
        if utterance.interrupt() {
            self.inner.fallback.cancel();
        }

        tracing::debug!(
            generation = guard.generation(),
            chars = utterance.text().chars().count(),
            interrupt = utterance.interrupt(),
            "Speaking"
        );

        // Lazy init; the probe runs once however many sessions ask.
        let context = self.init_context().await;
        if !guard.is_current() {
            return;
        }

        if let (Some(context), Some(cloned)) = (context, self.inner.cloned.as_ref()) {
            match cloned
                .speak(&context, utterance.text(), utterance.speed(), &guard)
                .await
            {
                ClonedPlayback::Started(handle) => {
                    self.attach(&guard, handle, EngineKind::Cloned);
                    return;
                }
                ClonedPlayback::Superseded => return,
                ClonedPlayback::FallbackRequested(reason) => {
                    tracing::warn!(%reason, "Cloned voice failed, falling back for this utterance");
                    self.inner.emit(SpeechEvent::FallbackUsed { reason });
                }
            }
        }

        self.speak_fallback(&guard, utterance.text()).await;
    }

    /// Stop current speech. No-op when idle.
    pub fn stop(&self) {
        {
            let mut session = self.inner.lock_session();
            if !session.open && session.source.is_none() {
                tracing::trace!("Stop while idle");
                return;
            }

            tracing::debug!(generation = session.generation, "Stopping session");
            self.inner.bump_generation(&mut session);
            self.inner.end_session(&mut session);
        }
        self.inner.flush_signals();
    }

    // ── Internal helpers ───────────────────────────────────────────

    async fn init_context(&self) -> Option<Arc<dyn AudioContext>> {
        let inner = &self.inner;
        inner
            .probe
            .run(inner.backend.as_deref(), inner.context_factory.as_ref())
            .await
    }

    async fn speak_fallback(&self, guard: &GenerationGuard, text: &str) {
        if !self.inner.set_state_if_current(guard, SessionState::FallbackPlaying) {
            return;
        }

        match self.inner.fallback.speak(text).await {
            Ok(Some(handle)) => self.attach(guard, handle, EngineKind::Platform),
            Ok(None) => self.inner.end_silently(guard),
            Err(e) => {
                tracing::warn!(error = %e, "Platform voice failed, staying silent");
                self.inner.emit(SpeechEvent::Error(e.to_string()));
                self.inner.end_silently(guard);
            }
        }
    }

    /// Make `handle` the session's source and start talking, unless the
    /// session was superseded while the source was being prepared.
    fn attach(&self, guard: &GenerationGuard, handle: SourceHandle, engine: EngineKind) {
        let SourceHandle { control, ended } = handle;
        let generation = guard.generation();

        {
            let mut session = self.inner.lock_session();
            if session.generation != generation {
                drop(session);
                tracing::debug!(generation, "Session superseded before playback, stopping source");
                control.stop();
                return;
            }

            session.source = Some(control);
            session.started = true;
            if engine == EngineKind::Cloned {
                self.inner.set_state(&mut session, SessionState::Playing);
            }
            self.inner.signals.push(AnimationSignal::StartTalking);
            self.inner.emit(SpeechEvent::SpeakingStarted { engine });
        }
        self.inner.flush_signals();

        tracing::info!(engine = engine.label(), generation, "Speaking started");

        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let end = ended.await.unwrap_or(SourceEnd::Stopped);
            Inner::finish(&inner, generation, end);
        });
    }
}

impl Inner {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// End the active session and open a new one in `Requesting`.
    /// The previous session's `StopTalking` is delivered before this returns.
    fn begin_session(&self) -> GenerationGuard {
        let generation = {
            let mut session = self.lock_session();
            self.end_session(&mut session);
            let generation = self.bump_generation(&mut session);
            session.open = true;
            self.set_state(&mut session, SessionState::Requesting);
            generation
        };
        self.flush_signals();
        GenerationGuard::new(Arc::clone(&self.generation), generation)
    }

    fn bump_generation(&self, session: &mut Session) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        session.generation = generation;
        generation
    }

    /// Stop the session's source, queue `StopTalking` if the session is still
    /// open, and return to `Idle`. The generation is left alone.
    fn end_session(&self, session: &mut Session) {
        if let Some(source) = session.source.take() {
            source.stop();
        }
        if let Some(cloned) = &self.cloned {
            cloned.stop_current();
        }
        session.started = false;
        if std::mem::take(&mut session.open) {
            self.signals.push(AnimationSignal::StopTalking);
            self.emit(SpeechEvent::SpeakingFinished);
        }
        self.set_state(session, SessionState::Idle);
    }

    /// A source ended on its own (or was stopped from outside the session).
    fn finish(inner: &Weak<Self>, generation: u64, end: SourceEnd) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        {
            let mut session = inner.lock_session();
            if session.generation != generation {
                // Already ended by stop() or a newer speak().
                return;
            }

            match &end {
                SourceEnd::Completed => tracing::debug!(generation, "Speech completed"),
                SourceEnd::Stopped => tracing::debug!(generation, "Speech stopped"),
                SourceEnd::Failed(reason) => {
                    tracing::warn!(generation, %reason, "Playback failed");
                    inner.emit(SpeechEvent::Error(reason.clone()));
                }
            }

            // The source is finished; drop it rather than stop it.
            session.source = None;
            inner.end_session(&mut session);
        }
        inner.flush_signals();
    }

    /// End a session no engine could voice. No signal is owed.
    fn end_silently(&self, guard: &GenerationGuard) {
        let mut session = self.lock_session();
        if session.generation == guard.generation() {
            session.open = false;
            self.set_state(&mut session, SessionState::Idle);
        }
    }

    fn set_state_if_current(&self, guard: &GenerationGuard, state: SessionState) -> bool {
        let mut session = self.lock_session();
        if session.generation != guard.generation() {
            return false;
        }
        self.set_state(&mut session, state);
        true
    }

    fn set_state(&self, session: &mut Session, new_state: SessionState) {
        if session.state != new_state {
            tracing::debug!(old = ?session.state, new = ?new_state, "Session state transition");
            session.state = new_state;
            self.emit(SpeechEvent::StateChanged(new_state));
        }
    }

    /// Deliver queued animation signals. Must not be called with the session
    /// lock held.
    fn flush_signals(&self) {
        self.signals.flush(|signal| {
            signal.deliver(
                self.animation.as_ref(),
                &self.settings.talk_animation,
                &self.settings.idle_animation,
            );
        });
    }

    /// Emit a speech event (best-effort: a dropped receiver is only logged).
    fn emit(&self, event: SpeechEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("Speech event receiver dropped");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let session = self.session.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(source) = session.source.take() {
            source.stop();
        }
        if std::mem::take(&mut session.open) {
            AnimationSignal::StopTalking.deliver(
                self.animation.as_ref(),
                &self.settings.talk_animation,
                &self.settings.idle_animation,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_labels_match_serde() {
        for state in [
            SessionState::Idle,
            SessionState::Requesting,
            SessionState::Playing,
            SessionState::FallbackPlaying,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.label()));
        }
    }

    #[test]
    fn default_state_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn signals_queued_during_a_flush_are_delivered_in_order() {
        let queue = SignalQueue::default();
        queue.push(AnimationSignal::StartTalking);

        let mut delivered = Vec::new();
        queue.flush(|signal| {
            delivered.push(signal);
            if signal == AnimationSignal::StartTalking {
                // A re-entrant caller queues and tries to flush itself.
                queue.push(AnimationSignal::StopTalking);
                queue.flush(|_| panic!("nested flush must defer to the outer one"));
            }
        });

        assert_eq!(
            delivered,
            vec![AnimationSignal::StartTalking, AnimationSignal::StopTalking]
        );
        assert!(!queue.flushing.load(Ordering::SeqCst));
    }
}
