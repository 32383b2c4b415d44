//! Input sanitization
//!
//! Cleans raw keyboard input before it reaches the dispatcher. Input is
//! NFC-normalized first. The sanitizer never looks at command words; it
//! only strips characters that have no business in a terminal line.

use unicode_normalization::UnicodeNormalization;

use crate::error::{HudError, Result};

/// Longest accepted message, in chars. Longer input is truncated.
pub const MESSAGE_MAX_CHARS: usize = 5000;

fn is_stripped(c: char) -> bool {
    matches!(
        c,
        '\u{00}'..='\u{08}'
            | '\u{0B}'
            | '\u{0C}'
            | '\u{0E}'..='\u{1F}'
            | '\u{7F}'
            // zero-width
            | '\u{200B}'..='\u{200D}'
            | '\u{FEFF}'
            // bidi overrides and isolates
            | '\u{202A}'..='\u{202E}'
            | '\u{2066}'..='\u{2069}'
    )
}

/// Clean raw input. Returns `None` when nothing usable remains.
pub fn sanitize(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len().min(MESSAGE_MAX_CHARS * 4));
    let mut pending_space = false;

    for c in raw.nfc().filter(|c| !is_stripped(*c)) {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    if out.is_empty() {
        return None;
    }

    if let Some((idx, _)) = out.char_indices().nth(MESSAGE_MAX_CHARS) {
        out.truncate(idx);
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
    }

    Some(out)
}

/// `sanitize` for callers that want an error instead of `None`
pub fn sanitize_or_reject(raw: &str) -> Result<String> {
    sanitize(raw).ok_or_else(|| HudError::InvalidInput {
        reason: "input is empty after sanitization".to_string(),
    })
}
