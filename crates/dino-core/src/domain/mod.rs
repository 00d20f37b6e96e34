//! Domain types shared by the voice pipeline and its adapters.

mod capability;
mod utterance;

pub use capability::{EngineCapability, EngineKind};
pub use utterance::{InvalidUtterance, Utterance};
