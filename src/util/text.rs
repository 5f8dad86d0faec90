use std::borrow::Cow;

/// Returns true for characters outside the XML 1.0 `Char` production.
///
/// Rust strings cannot hold surrogates, so only the C0 controls (minus tab,
/// LF and CR) and the two noncharacters U+FFFE / U+FFFF need rejecting.
fn is_xml_invalid(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}

/// Strips characters that may not appear in an XML 1.0 document.
///
/// quick-xml escapes markup characters (`<`, `&`, ...) but passes control
/// characters through untouched, and a single `\u{0}` is enough to make the
/// whole feed unparseable. Upstream article bodies are pasted text, so they
/// do occasionally carry stray form feeds and NULs.
///
/// Returns `Cow::Borrowed` when nothing needs removing (common case).
pub fn strip_xml_invalid_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_xml_invalid) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_xml_invalid(c)).collect())
}

/// Truncates `s` to at most `max_chars` characters, appending `...` when cut.
///
/// Counts `char`s rather than bytes so CJK error bodies never split mid-codepoint.
pub fn preview(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
