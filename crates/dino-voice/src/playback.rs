//! Local audio output via `rodio` on a dedicated thread.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so it is confined to a
//! single OS thread and driven through an [`AudioCommand`] channel. The
//! context handle the pipeline holds is `Send + Sync` without any `unsafe`.
//!
//! `rodio::Sink` is `Send`, so each started source hands its sink back to the
//! caller. A watcher thread per source blocks until the sink drains and then
//! resolves the source's completion channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;

use async_trait::async_trait;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};

use crate::audio_io::{
    AudioContext, AudioContextFactory, ContextState, PlayableBuffer, SourceControl, SourceEnd,
    SourceHandle,
};
use crate::error::VoiceError;

// ── Commands ───────────────────────────────────────────────────────

/// A command sent from the context handle to the audio thread.
enum AudioCommand {
    /// Create a sink, queue the buffer and start it.
    Play {
        buffer: PlayableBuffer,
        playback_rate: f32,
        reply: mpsc::Sender<Result<Arc<Sink>, VoiceError>>,
    },

    /// Shut down the audio thread, releasing the output stream.
    Shutdown,
}

// ── Context (Send + Sync proxy) ────────────────────────────────────

/// Audio context backed by the default output device.
pub struct LocalAudioContext {
    sample_rate: u32,
    cmd_tx: mpsc::Sender<AudioCommand>,
    closed: AtomicBool,
    thread: Option<thread::JoinHandle<()>>,
}

impl LocalAudioContext {
    /// Spawn the audio thread and open the default output device.
    ///
    /// Errors from opening the device are propagated back through a one-shot
    /// init channel.
    pub fn spawn(sample_rate: u32) -> Result<Self, VoiceError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), VoiceError>>();

        let thread = thread::Builder::new()
            .name("dino-audio".into())
            .spawn(move || Self::run(&cmd_rx, &init_tx))
            .map_err(|e| VoiceError::OutputStreamError(format!("failed to spawn audio thread: {e}")))?;

        init_rx.recv().map_err(|_| VoiceError::AudioThreadDied)??;

        tracing::info!(sample_rate, "Audio output initialized on default device");

        Ok(Self {
            sample_rate,
            cmd_tx,
            closed: AtomicBool::new(false),
            thread: Some(thread),
        })
    }

    /// Release the output device. Later `start` calls fail.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        }
    }

    // ── Audio thread event loop ────────────────────────────────────

    fn run(cmd_rx: &mpsc::Receiver<AudioCommand>, init_tx: &mpsc::Sender<Result<(), VoiceError>>) {
        let (_stream, handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                let _ = init_tx.send(Err(VoiceError::OutputStreamError(e.to_string())));
                return;
            }
        };

        if init_tx.send(Ok(())).is_err() {
            return;
        }

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                AudioCommand::Play {
                    buffer,
                    playback_rate,
                    reply,
                } => {
                    let result = Sink::try_new(&handle)
                        .map(|sink| {
                            sink.set_speed(playback_rate);
                            sink.append(SamplesBuffer::new(
                                buffer.channels,
                                buffer.sample_rate,
                                buffer.samples,
                            ));
                            Arc::new(sink)
                        })
                        .map_err(|e| VoiceError::OutputStreamError(e.to_string()));
                    let _ = reply.send(result);
                }

                AudioCommand::Shutdown => break,
            }
        }

        // The output stream is dropped here, on the audio thread.
        tracing::debug!("Audio thread shutting down");
    }
}

#[async_trait]
impl AudioContext for LocalAudioContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn state(&self) -> ContextState {
        if self.closed.load(Ordering::SeqCst) {
            ContextState::Closed
        } else {
            ContextState::Running
        }
    }

    async fn resume(&self) -> Result<(), VoiceError> {
        match self.state() {
            ContextState::Closed => Err(VoiceError::ContextClosed),
            _ => Ok(()),
        }
    }

    fn start(&self, buffer: PlayableBuffer, playback_rate: f32) -> Result<SourceHandle, VoiceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(VoiceError::ContextClosed);
        }

        let (reply, reply_rx) = mpsc::channel();
        self.cmd_tx
            .send(AudioCommand::Play {
                buffer,
                playback_rate,
                reply,
            })
            .map_err(|_| VoiceError::AudioThreadDied)?;
        let sink = reply_rx.recv().map_err(|_| VoiceError::AudioThreadDied)??;

        let control = Arc::new(RodioSource {
            sink: Arc::clone(&sink),
            finished: Arc::new(AtomicBool::new(false)),
        });
        let finished = Arc::clone(&control.finished);
        let (handle, ended) = SourceHandle::new(control);

        // `sleep_until_end()` returns when the queue drains or `stop()` drops
        // the queued sources.
        thread::spawn(move || {
            sink.sleep_until_end();
            let end = if finished.swap(true, Ordering::SeqCst) {
                SourceEnd::Stopped
            } else {
                SourceEnd::Completed
            };
            let _ = ended.send(end);
        });

        Ok(handle)
    }
}

impl Drop for LocalAudioContext {
    fn drop(&mut self) {
        self.close();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Control half of a rodio source.
struct RodioSource {
    sink: Arc<Sink>,
    /// Set by whichever of stop / natural end happens first.
    finished: Arc<AtomicBool>,
}

impl SourceControl for RodioSource {
    fn stop(&self) {
        if !self.finished.swap(true, Ordering::SeqCst) {
            self.sink.stop();
        }
    }
}

// ── Factory ────────────────────────────────────────────────────────

/// Opens a [`LocalAudioContext`] on the default output device.
#[derive(Debug, Clone, Copy)]
pub struct LocalAudioContextFactory {
    pub sample_rate: u32,
}

impl AudioContextFactory for LocalAudioContextFactory {
    fn create(&self) -> Result<Arc<dyn AudioContext>, VoiceError> {
        Ok(Arc::new(LocalAudioContext::spawn(self.sample_rate)?))
    }
}
