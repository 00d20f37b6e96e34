//! Animation signals delivered to the character-animation consumer.

use serde::{Deserialize, Serialize};

use crate::ports::AnimationConsumer;

/// Lifecycle signal for the animated character.
///
/// The pipeline delivers `StartTalking` when audio actually begins playing
/// and exactly one `StopTalking` for every session, however it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnimationSignal {
    /// Audio began: loop the talk animation.
    StartTalking,
    /// Audio ended: return to the idle animation.
    StopTalking,
}

impl AnimationSignal {
    /// Whether the character is speaking after this signal.
    #[must_use]
    pub const fn is_speaking(self) -> bool {
        matches!(self, Self::StartTalking)
    }

    /// Apply this signal to a consumer.
    ///
    /// Sets the consumer's speaking flag first so collaborators that query
    /// `is_speaking` from inside `play_animation` see the new value.
    pub fn deliver(self, consumer: &dyn AnimationConsumer, talk: &str, idle: &str) {
        consumer.set_speaking(self.is_speaking());
        match self {
            Self::StartTalking => consumer.play_animation(talk, true),
            Self::StopTalking => consumer.play_animation(idle, true),
        }
    }
}
