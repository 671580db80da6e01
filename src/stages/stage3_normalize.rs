//! Strips the lightweight markup the model tends to emit (`## Heading`,
//! `**bold**`) before the text is placed in the document.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// One or more runs of `#` followed by blanks, at the start of a line
static RE_HEADING_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(?:#+[ \t]+)+").unwrap());

/// `**text**` within a single line
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());

/// Remove heading and bold markers, keeping the text they wrap.
///
/// The rules are applied until the text stops changing, so the result is a
/// fixed point: `normalize_text(&normalize_text(x)) == normalize_text(x)`.
/// Text with neither marker is returned unchanged.
pub fn normalize_text(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = match strip_once(&current) {
            Cow::Borrowed(_) => None,
            Cow::Owned(next) => Some(next),
        };
        match next {
            Some(next) => current = next,
            None => return current,
        }
    }
}

/// One pass of both rules; borrowed when nothing matched
fn strip_once(text: &str) -> Cow<'_, str> {
    match RE_HEADING_MARKER.replace_all(text, "") {
        Cow::Borrowed(_) => RE_BOLD.replace_all(text, "$1"),
        Cow::Owned(stripped) => Cow::Owned(RE_BOLD.replace_all(&stripped, "$1").into_owned()),
    }
}
