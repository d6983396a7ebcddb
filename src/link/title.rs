//! Title and label formatting
//!
//! Tracked-item titles carry a bracketed case reference of the form
//! `[SF Case #12345]`. Matching is ASCII case-insensitive and the `#`
//! is optional when parsing; formatting always writes the canonical
//! `[SF Case #<digits>] <title>` shape.

/// Opening of the bracketed case tag, matched case-insensitively
const TAG_OPEN: &str = "[sf case ";

/// Extract the case number from a title, searching at any position.
///
/// `extract_case_number("[SF Case #12345] Login bug")` returns `"12345"`.
pub fn extract_case_number(title: &str) -> Option<String> {
    let bytes = title.as_bytes();
    let needle = TAG_OPEN.as_bytes();
    let mut from = 0;

    while from + needle.len() <= bytes.len() {
        let rel = bytes[from..]
            .windows(needle.len())
            .position(|w| w.eq_ignore_ascii_case(needle))?;
        let tag_start = from + rel;
        if let Some((digits, _end)) = match_tag_tail(title, tag_start + needle.len()) {
            return Some(digits);
        }
        from = tag_start + needle.len();
    }
    None
}

/// Format a title with a canonical case tag. Any existing tag at the
/// start of the title is stripped first, so the operation is idempotent.
pub fn format_title(title: &str, case_number: &str) -> String {
    let clean = strip_leading_tag(title);
    format!("[SF Case #{}] {}", case_number, clean)
}

/// Deterministic per-case label: `"<prefix>:<caseNumber>"`
pub fn case_label(prefix: &str, case_number: &str) -> String {
    format!("{}:{}", prefix, case_number)
}

/// Match `#?<digits>]` at `pos`; returns the digits and the offset just
/// past the closing bracket.
fn match_tag_tail(title: &str, mut pos: usize) -> Option<(String, usize)> {
    let bytes = title.as_bytes();
    if pos < bytes.len() && bytes[pos] == b'#' {
        pos += 1;
    }
    let digits_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == digits_start || pos >= bytes.len() || bytes[pos] != b']' {
        return None;
    }
    Some((title[digits_start..pos].to_string(), pos + 1))
}

/// Strip a case tag anchored at the start of the title, plus the
/// whitespace that follows it.
fn strip_leading_tag(title: &str) -> &str {
    let bytes = title.as_bytes();
    let needle = TAG_OPEN.as_bytes();
    if bytes.len() < needle.len() || !bytes[..needle.len()].eq_ignore_ascii_case(needle) {
        return title;
    }
    match match_tag_tail(title, needle.len()) {
        Some((_, end)) => title[end..].trim_start(),
        None => title,
    }
}
