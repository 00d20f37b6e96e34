//! `espeak-ng` platform speech engine.
//!
//! Each utterance is one `espeak-ng` child process. Stopping a source kills
//! its process; [`PlatformSpeech::cancel`] kills every process this engine
//! started.

use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::process::Command;
use tokio::sync::{OnceCell, oneshot, watch};

use super::{PlatformSpeech, PlatformUtterance, PlatformVoice, VoiceGender};
use crate::audio_io::{SourceControl, SourceEnd, SourceHandle};
use crate::error::VoiceError;

/// Default executable name.
pub const DEFAULT_PROGRAM: &str = "espeak-ng";

/// `espeak-ng` default pitch (0–99).
const NEUTRAL_PITCH: f32 = 50.0;

/// `espeak-ng` default rate (words per minute).
const NEUTRAL_WPM: f32 = 175.0;

/// Platform speech through the `espeak-ng` command-line tool.
#[derive(Debug)]
pub struct EspeakEngine {
    program: String,
    voices: OnceCell<Vec<PlatformVoice>>,
    /// Bumped by `cancel()`; every running utterance watches it.
    epoch: watch::Sender<u64>,
}

impl Default for EspeakEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EspeakEngine {
    pub fn new() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }

    /// Use a different executable (e.g. `espeak` or an absolute path).
    pub fn with_program(program: impl Into<String>) -> Self {
        let (epoch, _) = watch::channel(0);
        Self {
            program: program.into(),
            voices: OnceCell::new(),
            epoch,
        }
    }

    async fn list_voices(&self) -> Result<Vec<PlatformVoice>, VoiceError> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(VoiceError::PlatformEngine(format!(
                "{} --voices exited with {}",
                self.program, output.status
            )));
        }

        let voices = parse_voices(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!(count = voices.len(), program = %self.program, "Listed platform voices");
        Ok(voices)
    }
}

#[async_trait::async_trait]
impl PlatformSpeech for EspeakEngine {
    async fn voices(&self) -> Result<Vec<PlatformVoice>, VoiceError> {
        self.voices
            .get_or_try_init(|| self.list_voices())
            .await
            .cloned()
    }

    async fn speak(&self, utterance: PlatformUtterance) -> Result<SourceHandle, VoiceError> {
        let mut child = Command::new(&self.program)
            .arg("-v")
            .arg(&utterance.voice.id)
            .arg("-p")
            .arg(pitch_arg(utterance.pitch).to_string())
            .arg("-s")
            .arg(rate_arg(utterance.rate).to_string())
            .arg("--")
            .arg(&utterance.text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        tracing::debug!(voice = %utterance.voice.id, pid = ?child.id(), "Platform speech started");

        let (stop_tx, stop_rx) = oneshot::channel();
        let control = Arc::new(EspeakSource {
            stop: Mutex::new(Some(stop_tx)),
        });
        let (handle, ended) = SourceHandle::new(control);
        let mut epoch = self.epoch.subscribe();

        tokio::spawn(async move {
            let end = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => SourceEnd::Completed,
                    Ok(status) => SourceEnd::Failed(format!("espeak-ng exited with {status}")),
                    Err(e) => SourceEnd::Failed(e.to_string()),
                },
                Ok(()) = stop_rx => {
                    let _ = child.kill().await;
                    SourceEnd::Stopped
                }
                Ok(()) = epoch.changed() => {
                    let _ = child.kill().await;
                    SourceEnd::Stopped
                }
            };
            let _ = ended.send(end);
        });

        Ok(handle)
    }

    fn cancel(&self) {
        self.epoch.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
    }
}

/// Stops one `espeak-ng` process.
struct EspeakSource {
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

impl SourceControl for EspeakSource {
    fn stop(&self) {
        let sender = self
            .stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }
}

/// Map a 1.0-neutral pitch onto `-p` (0–99).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn pitch_arg(pitch: f32) -> u32 {
    (pitch * NEUTRAL_PITCH).round().clamp(0.0, 99.0) as u32
}

/// Map a 1.0-neutral rate onto `-s` (words per minute, 80–450).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn rate_arg(rate: f32) -> u32 {
    (rate * NEUTRAL_WPM).round().clamp(80.0, 450.0) as u32
}

/// Parse the table printed by `espeak-ng --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File          Other Languages
///  5  en-gb           --/M      English_(Great_Britain) gmw/en   (en 2)
/// ```
pub fn parse_voices(listing: &str) -> Vec<PlatformVoice> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let _priority = columns.next()?;
            let language = columns.next()?;
            let age_gender = columns.next()?;
            let name = columns.next()?;
            Some(PlatformVoice {
                id: language.to_string(),
                name: name.replace('_', " "),
                locale: language.to_string(),
                gender: parse_gender(age_gender),
            })
        })
        .collect()
}

/// The gender half of an `Age/Gender` cell such as `--/M`.
fn parse_gender(age_gender: &str) -> Option<VoiceGender> {
    match age_gender.rsplit('/').next()? {
        "M" | "m" => Some(VoiceGender::Male),
        "F" | "f" => Some(VoiceGender::Female),
        _ => None,
    }
}
