//! Voice pipeline error types.

use std::time::Duration;

/// Errors that can occur in the voice pipeline.
///
/// None of these reach callers of `speak`/`stop`. They are logged and turned
/// into a fallback or silence by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// The synthesis backend answered but could not synthesize.
    #[error("Speech synthesis failed: {0}")]
    SynthesisError(String),

    /// Talking to the synthesis backend failed.
    #[error("Synthesis backend {operation} failed: {source}")]
    Backend {
        operation: &'static str,
        source: anyhow::Error,
    },

    /// The capability probe did not answer in time.
    #[error("Capability probe timed out after {0:?}")]
    ProbeTimedOut(Duration),

    /// Backend PCM could not be turned into a playable buffer.
    #[error("Audio decode failed: {0}")]
    DecodeError(String),

    /// Audio resampling error.
    #[error("Audio resampling failed: {0}")]
    ResampleError(String),

    /// Failed to open or use the audio output stream.
    #[error("Failed to open audio output stream: {0}")]
    OutputStreamError(String),

    /// No audio output is compiled into this build.
    #[error("No audio output available (built without the `local-audio` feature)")]
    NoAudioOutput,

    /// The audio context was closed.
    #[error("Audio context is closed")]
    ContextClosed,

    /// The dedicated audio thread exited unexpectedly.
    #[error("Audio thread died unexpectedly")]
    AudioThreadDied,

    /// The platform speech engine failed.
    #[error("Platform speech engine failed: {0}")]
    PlatformEngine(String),

    /// IO error (spawning the platform engine).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking DSP task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl VoiceError {
    /// Wrap a backend failure with the operation that hit it.
    pub fn backend(operation: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }
}
