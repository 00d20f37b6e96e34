//! Utterance validation.
//!
//! Every `speak` request is parsed into an [`Utterance`] before any engine is
//! contacted. Rejected input is a silent no-op for the caller; the error type
//! exists so the pipeline can log why.

use thiserror::Error;

/// Why a piece of text was not accepted for speech.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidUtterance {
    /// No text was supplied at all.
    #[error("no text supplied")]
    Missing,

    /// Text was empty or whitespace only.
    #[error("text is empty")]
    Empty,

    /// Text exceeded the configured character limit.
    #[error("text is {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// One validated request to speak.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    text: String,
    speed: f32,
    interrupt: bool,
}

impl Utterance {
    /// Validate `text` and build an utterance.
    ///
    /// Leading and trailing whitespace is trimmed. `max_chars` counts Unicode
    /// scalar values, not bytes.
    pub fn parse<'a>(
        text: impl Into<Option<&'a str>>,
        speed: f32,
        interrupt: bool,
        max_chars: usize,
    ) -> Result<Self, InvalidUtterance> {
        let text = text.into().ok_or(InvalidUtterance::Missing)?.trim();
        if text.is_empty() {
            return Err(InvalidUtterance::Empty);
        }

        let len = text.chars().count();
        if len > max_chars {
            return Err(InvalidUtterance::TooLong { len, max: max_chars });
        }

        Ok(Self {
            text: text.to_string(),
            speed,
            interrupt,
        })
    }

    /// The trimmed text to speak.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Synthesis speed factor (1.0 = normal).
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    /// Whether the caller asked to cut off current speech.
    #[must_use]
    pub const fn interrupt(&self) -> bool {
        self.interrupt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_text() {
        let u = Utterance::parse("Hello", 1.0, false, 500).unwrap();
        assert_eq!(u.text(), "Hello");
        assert!(!u.interrupt());
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let u = Utterance::parse("  Roar!  ", 1.0, true, 500).unwrap();
        assert_eq!(u.text(), "Roar!");
        assert!(u.interrupt());
    }

    #[test]
    fn rejects_missing_and_blank_text() {
        assert_eq!(
            Utterance::parse(None, 1.0, false, 500),
            Err(InvalidUtterance::Missing)
        );
        assert_eq!(
            Utterance::parse("", 1.0, false, 500),
            Err(InvalidUtterance::Empty)
        );
        assert_eq!(
            Utterance::parse(" \t\n", 1.0, false, 500),
            Err(InvalidUtterance::Empty)
        );
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        // 5 characters, 10 bytes
        let text = "ééééé";
        assert!(Utterance::parse(text, 1.0, false, 5).is_ok());
        assert_eq!(
            Utterance::parse(text, 1.0, false, 4),
            Err(InvalidUtterance::TooLong { len: 5, max: 4 })
        );
    }
}
