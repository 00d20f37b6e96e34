//! Engine capability record and engine identifiers.

use serde::{Deserialize, Serialize};

/// Result of the one-time cloned-voice capability probe.
///
/// `checked == false` means the probe has not completed yet. Once `checked`
/// is set the record never changes for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineCapability {
    /// Whether the cloned-voice backend answered the probe.
    pub available: bool,
    /// Whether the probe has run.
    pub checked: bool,
}

impl EngineCapability {
    /// Capability before the probe has run.
    pub const UNCHECKED: Self = Self {
        available: false,
        checked: false,
    };

    /// A completed probe that found the backend.
    #[must_use]
    pub const fn available() -> Self {
        Self {
            available: true,
            checked: true,
        }
    }

    /// A completed probe that did not find the backend.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            available: false,
            checked: true,
        }
    }
}

/// Which synthesis engine produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EngineKind {
    /// Voice-cloning backend routed through the effects graph.
    Cloned,
    /// Generic platform speech engine.
    Platform,
}

impl EngineKind {
    /// Stable lowercase label for logs and DTOs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cloned => "cloned",
            Self::Platform => "platform",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchecked_is_the_default() {
        assert_eq!(EngineCapability::default(), EngineCapability::UNCHECKED);
    }

    #[test]
    fn completed_probes_are_checked() {
        assert!(EngineCapability::available().checked);
        assert!(EngineCapability::unavailable().checked);
        assert!(!EngineCapability::unavailable().available);
    }

    #[test]
    fn engine_labels() {
        assert_eq!(EngineKind::Cloned.label(), "cloned");
        assert_eq!(EngineKind::Platform.label(), "platform");
    }
}
