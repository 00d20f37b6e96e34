//! Character-animation consumer port.

use std::sync::atomic::{AtomicBool, Ordering};

/// The animated character driven by speech lifecycle signals.
///
/// Signals arrive in order, outside the pipeline's session lock, so an
/// implementation may query or stop the pipeline from inside a callback.
///
/// # Implementations
///
/// - `NoopAnimation` - For tests and headless contexts
/// - UI adapters that forward to a sprite or web view
pub trait AnimationConsumer: Send + Sync {
    /// Play the named animation, optionally looping.
    fn play_animation(&self, name: &str, looping: bool);

    /// Set the speaking flag other collaborators query.
    fn set_speaking(&self, speaking: bool);

    /// Whether the character is currently speaking.
    fn is_speaking(&self) -> bool;
}

/// An animation consumer that only tracks the speaking flag.
#[derive(Debug, Default)]
pub struct NoopAnimation {
    speaking: AtomicBool,
}

impl NoopAnimation {
    /// Create a consumer that is not speaking.
    pub const fn new() -> Self {
        Self {
            speaking: AtomicBool::new(false),
        }
    }
}

impl AnimationConsumer for NoopAnimation {
    fn play_animation(&self, _name: &str, _looping: bool) {}

    fn set_speaking(&self, speaking: bool) {
        self.speaking.store(speaking, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_animation_tracks_flag() {
        let consumer = NoopAnimation::new();
        assert!(!consumer.is_speaking());

        consumer.set_speaking(true);
        consumer.play_animation("talk", true);
        assert!(consumer.is_speaking());
    }
}
