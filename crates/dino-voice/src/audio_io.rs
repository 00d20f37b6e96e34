//! Audio output abstractions: the processing context and playing sources.
//!
//! These traits decouple the pipeline from any specific audio backend:
//!
//! | Implementor | Where used |
//! |---|---|
//! | [`LocalAudioContext`](crate::playback::LocalAudioContext) | Desktop / CLI, rodio on a dedicated thread (feature `local-audio`) |
//! | Test doubles | Integration tests, sources completed by hand |
//!
//! All traits are object-safe. A started source is represented by a
//! [`SourceHandle`]: a control half that can stop it and a oneshot receiver
//! that resolves when it ends, however it ends.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::VoiceError;

// ── Context ────────────────────────────────────────────────────────

/// Lifecycle state of an audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Processing audio.
    Running,
    /// Created but not yet allowed to produce sound.
    Suspended,
    /// Released; cannot be resumed.
    Closed,
}

/// A fully rendered buffer ready to hand to the output.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayableBuffer {
    /// Sample rate of `samples` (Hz).
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Interleaved samples.
    pub samples: Vec<f32>,
}

impl PlayableBuffer {
    /// Interleave two equally long channels.
    pub fn from_stereo(sample_rate: u32, left: &[f32], right: &[f32]) -> Self {
        debug_assert_eq!(left.len(), right.len());
        let mut samples = Vec::with_capacity(left.len() * 2);
        for (&l, &r) in left.iter().zip(right) {
            samples.push(l);
            samples.push(r);
        }
        Self {
            sample_rate,
            channels: 2,
            samples,
        }
    }

    /// Frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Duration in seconds at normal playback rate.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }
}

/// An audio-processing context: owns the output device and plays buffers.
///
/// Created at most once per process by the capability probe.
#[async_trait]
pub trait AudioContext: Send + Sync {
    /// Output sample rate (Hz). Buffers should be rendered at this rate.
    fn sample_rate(&self) -> u32;

    /// Current lifecycle state.
    fn state(&self) -> ContextState;

    /// Move a suspended context to `Running`. No-op when already running.
    async fn resume(&self) -> Result<(), VoiceError>;

    /// Start playing `buffer`, sped up or slowed down by `playback_rate`.
    fn start(&self, buffer: PlayableBuffer, playback_rate: f32) -> Result<SourceHandle, VoiceError>;
}

/// Creates the audio context once the backend is known to be reachable.
pub trait AudioContextFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn AudioContext>, VoiceError>;
}

/// Factory for builds without an output device. Always fails, which keeps
/// the cloned voice unavailable and routes speech to the platform engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAudioOutput;

impl AudioContextFactory for NoAudioOutput {
    fn create(&self) -> Result<Arc<dyn AudioContext>, VoiceError> {
        Err(VoiceError::NoAudioOutput)
    }
}

// ── Sources ────────────────────────────────────────────────────────

/// How a playing source ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEnd {
    /// Played to the end.
    Completed,
    /// Stopped before the end.
    Stopped,
    /// The output failed mid-playback.
    Failed(String),
}

/// Control half of a playing source.
pub trait SourceControl: Send + Sync {
    /// Stop playback. Stopping an ended or already stopped source is a no-op.
    fn stop(&self);
}

/// A started source: stop it through `control`, await `ended` for the end.
pub struct SourceHandle {
    pub control: Arc<dyn SourceControl>,
    pub ended: oneshot::Receiver<SourceEnd>,
}

impl SourceHandle {
    /// Build a handle and the sender the implementation resolves on end.
    pub fn new(control: Arc<dyn SourceControl>) -> (Self, oneshot::Sender<SourceEnd>) {
        let (tx, ended) = oneshot::channel();
        (Self { control, ended }, tx)
    }

    /// Wait for the source to end. A dropped sender counts as `Stopped`.
    pub async fn wait(self) -> SourceEnd {
        self.ended.await.unwrap_or(SourceEnd::Stopped)
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopControl;

    impl SourceControl for NoopControl {
        fn stop(&self) {}
    }

    #[test]
    fn interleaves_stereo() {
        let buffer = PlayableBuffer::from_stereo(8_000, &[1.0, 2.0], &[-1.0, -2.0]);
        assert_eq!(buffer.samples, vec![1.0, -1.0, 2.0, -2.0]);
        assert_eq!(buffer.frames(), 2);
        assert!((buffer.duration_secs() - 0.000_25).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn dropped_sender_reads_as_stopped() {
        let (handle, tx) = SourceHandle::new(Arc::new(NoopControl));
        drop(tx);
        assert_eq!(handle.wait().await, SourceEnd::Stopped);
    }

    #[tokio::test]
    async fn completion_is_delivered() {
        let (handle, tx) = SourceHandle::new(Arc::new(NoopControl));
        tx.send(SourceEnd::Completed).unwrap();
        assert_eq!(handle.wait().await, SourceEnd::Completed);
    }

    #[test]
    fn no_audio_output_never_creates_a_context() {
        assert!(matches!(
            NoAudioOutput.create(),
            Err(VoiceError::NoAudioOutput)
        ));
    }
}
