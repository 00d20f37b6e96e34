//! Phrase-selection port.
//!
//! The phrase layer owns phrase tables and localisation. The pipeline only
//! asks it for a string and treats an empty answer as "nothing to say".

use std::collections::HashMap;

/// Placeholder values substituted into a phrase (e.g. `{"letter": "B"}`).
pub type Replacements = HashMap<String, String>;

/// Resolves a phrase category into text to speak.
pub trait PhraseResolver: Send + Sync {
    /// Pick a phrase for `category` (and optional `subcategory`) and fill in
    /// `replacements`. Returns an empty string when nothing matches.
    fn resolve(
        &self,
        category: &str,
        subcategory: Option<&str>,
        replacements: &Replacements,
    ) -> String;
}

/// A resolver with no phrases. Every lookup yields an empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyPhraseResolver;

impl PhraseResolver for EmptyPhraseResolver {
    fn resolve(
        &self,
        _category: &str,
        _subcategory: Option<&str>,
        _replacements: &Replacements,
    ) -> String {
        String::new()
    }
}
