//! Port definitions (trait abstractions) for the pipeline's collaborators.
//!
//! Ports define the interfaces the voice pipeline expects from the outside
//! world, and the surface it offers back. They contain no implementation
//! details and use only domain types.
//!
//! # Design Rules
//!
//! - No audio, HTTP or process types in any signature
//! - Collaborator ports are synchronous and must not block
//! - The speech surface never returns errors: failures degrade to fallback
//!   or silence inside the implementation

pub mod animation;
pub mod phrase;
pub mod speech;

pub use animation::{AnimationConsumer, NoopAnimation};
pub use phrase::{EmptyPhraseResolver, PhraseResolver, Replacements};
pub use speech::{SpeechPort, SpeechStatusDto};
