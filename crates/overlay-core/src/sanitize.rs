//! Text sanitizing and line splitting
//!
//! The overlay is drawn with a standard Type1 font, so only printable ASCII
//! (0x20..=0x7E) survives. Stripping and splitting are separate steps and the
//! order they run in changes the result, see [`SanitizeOrder`].

use serde::{Deserialize, Serialize};

/// Order in which the printable-ASCII filter and line splitting are applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SanitizeOrder {
    /// Split on line breaks, then filter each line. Keeps multi-line input.
    #[default]
    LinesFirst,
    /// Filter the whole text, then split. Line breaks are stripped by the
    /// filter, so this always yields exactly one line.
    WholeText,
}

/// Remove every character outside the printable ASCII range
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|c| is_printable_ascii(*c)).collect()
}

pub fn is_printable_ascii(c: char) -> bool {
    matches!(c, '\u{20}'..='\u{7E}')
}

/// Split on `\n`. A trailing `\r` stays on the line; [`sanitize`] drops it.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

/// Produce the ordered overlay lines for `text`
pub fn sanitize_lines(text: &str, order: SanitizeOrder) -> Vec<String> {
    match order {
        SanitizeOrder::LinesFirst => split_lines(text).into_iter().map(sanitize).collect(),
        SanitizeOrder::WholeText => {
            let clean = sanitize(text);
            split_lines(&clean).into_iter().map(str::to_string).collect()
        }
    }
}
