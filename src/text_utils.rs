//! Text cleanup applied to spans before they reach the speech engine.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Fold compatibility characters (PDF ligatures such as "ﬁ") and collapse
/// whitespace. Returns `None` when nothing speakable is left.
pub fn speakable_text(raw: &str) -> Option<String> {
    let folded: String = raw.nfkc().collect();
    let collapsed = RE_WHITESPACE.replace_all(&folded, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
