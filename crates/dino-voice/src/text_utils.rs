//! Text preprocessing for the platform fallback voice.
//!
//! Generic platform engines rush through ellipses and exclamations. Turning
//! them into comma pauses gives the fallback voice a slower, more deliberate
//! delivery closer to the character.

/// Pause token inserted for ellipses and after exclamations.
const PAUSE: &str = ", ";

/// Shape `text` for the platform engine.
///
/// - Runs of two or more periods (and `…`) become a comma pause.
/// - Every `!` is followed by a comma pause.
/// - Adjacent pauses merge into one.
/// - Whitespace is collapsed to single spaces and trimmed.
#[must_use]
pub fn shape_prosody(text: &str) -> String {
    let mut shaped = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' if chars.peek() == Some(&'.') => {
                while chars.next_if_eq(&'.').is_some() {}
                push_pause(&mut shaped);
            }
            '…' => push_pause(&mut shaped),
            '!' => {
                shaped.push('!');
                push_pause(&mut shaped);
            }
            _ => shaped.push(c),
        }
    }

    collapse_whitespace(&shaped)
}

/// Append a pause unless one was just added.
fn push_pause(shaped: &mut String) {
    if !shaped.trim_end().ends_with(',') {
        shaped.push_str(PAUSE);
    }
}

/// Collapse whitespace runs to one space and trim the ends.
fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(c);
            prev_space = false;
        }
    }

    result.trim().to_string()
}
