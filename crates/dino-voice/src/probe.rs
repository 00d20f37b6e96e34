//! One-time cloned-voice capability probe.
//!
//! The probe runs at most once per process. Concurrent callers await the same
//! run. A failed probe is final: the cloned voice stays disabled and every
//! utterance goes to the platform engine.

use std::sync::Arc;
use std::time::Duration;

use dino_core::EngineCapability;
use tokio::sync::OnceCell;

use crate::audio_io::{AudioContext, AudioContextFactory};
use crate::backend::SynthesisBackend;
use crate::error::VoiceError;

/// Runs the capability check once and remembers the audio context.
pub struct CapabilityProbe {
    timeout: Duration,
    outcome: OnceCell<Option<Arc<dyn AudioContext>>>,
}

impl CapabilityProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            outcome: OnceCell::new(),
        }
    }

    /// Probe the backend and create the audio context, once.
    ///
    /// Returns the context when the cloned voice is usable.
    pub async fn run(
        &self,
        backend: Option<&dyn SynthesisBackend>,
        factory: &dyn AudioContextFactory,
    ) -> Option<Arc<dyn AudioContext>> {
        self.outcome
            .get_or_init(|| async move {
                match self.check(backend, factory).await {
                    Ok(context) => {
                        tracing::info!(
                            sample_rate = context.sample_rate(),
                            "Cloned voice available"
                        );
                        Some(context)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Cloned voice unavailable, using platform voice");
                        None
                    }
                }
            })
            .await
            .clone()
    }

    async fn check(
        &self,
        backend: Option<&dyn SynthesisBackend>,
        factory: &dyn AudioContextFactory,
    ) -> Result<Arc<dyn AudioContext>, VoiceError> {
        let backend = backend.ok_or_else(|| {
            VoiceError::SynthesisError("no synthesis backend configured".to_string())
        })?;

        tokio::time::timeout(self.timeout, backend.probe())
            .await
            .map_err(|_| VoiceError::ProbeTimedOut(self.timeout))??;

        factory.create()
    }

    /// What the probe found so far.
    pub fn capability(&self) -> EngineCapability {
        match self.outcome.get() {
            None => EngineCapability::UNCHECKED,
            Some(Some(_)) => EngineCapability::available(),
            Some(None) => EngineCapability::unavailable(),
        }
    }

    /// The audio context, if the probe succeeded.
    pub fn context(&self) -> Option<Arc<dyn AudioContext>> {
        self.outcome.get().cloned().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_io::NoAudioOutput;
    use crate::backend::SampleResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingBackend {
        probes: AtomicUsize,
        hang: bool,
    }

    #[async_trait::async_trait]
    impl SynthesisBackend for CountingBackend {
        async fn probe(&self) -> Result<(), VoiceError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn request_samples(&self, _: &str, _: f32) -> Result<SampleResponse, VoiceError> {
            Ok(SampleResponse::unavailable())
        }
    }

    #[tokio::test]
    async fn starts_unchecked() {
        let probe = CapabilityProbe::new(Duration::from_millis(50));
        assert_eq!(probe.capability(), EngineCapability::UNCHECKED);
        assert!(probe.context().is_none());
    }

    #[tokio::test]
    async fn missing_backend_is_unavailable() {
        let probe = CapabilityProbe::new(Duration::from_millis(50));
        assert!(probe.run(None, &NoAudioOutput).await.is_none());
        assert_eq!(probe.capability(), EngineCapability::unavailable());
    }

    #[tokio::test]
    async fn context_failure_is_unavailable_and_final() {
        let backend = CountingBackend::default();
        let probe = CapabilityProbe::new(Duration::from_millis(50));

        assert!(probe.run(Some(&backend), &NoAudioOutput).await.is_none());
        assert!(probe.run(Some(&backend), &NoAudioOutput).await.is_none());

        assert_eq!(backend.probes.load(Ordering::SeqCst), 1);
        assert_eq!(probe.capability(), EngineCapability::unavailable());
    }

    #[tokio::test]
    async fn hanging_backend_times_out() {
        let backend = CountingBackend {
            hang: true,
            ..CountingBackend::default()
        };
        let probe = CapabilityProbe::new(Duration::from_millis(20));

        assert!(probe.run(Some(&backend), &NoAudioOutput).await.is_none());
        assert_eq!(probe.capability(), EngineCapability::unavailable());
    }
}
