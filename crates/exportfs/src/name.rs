//! Turning display names into path segments.
//!
//! The mapping is total and deterministic but not injective: `a/b` and `a:b`
//! both become `a_b`. Callers that need distinct entries must keep their raw
//! names distinct after sanitizing; on disk the later write wins.

use std::borrow::Cow;

/// Segment used when nothing legal is left of the input.
pub const PLACEHOLDER: &str = "unnamed";

/// Longest segment produced, in bytes.
pub const MAX_SEGMENT_LEN: usize = 255;

const REPLACEMENT: char = '_';

const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

fn is_illegal(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// Make `raw` safe to use as a single path segment on disk and inside a zip.
///
/// Separators, characters reserved by common filesystems and control
/// characters become `_`. Surrounding whitespace and trailing dots are
/// trimmed, Windows device names get a `_` prefix, and an input with nothing
/// left (or only dots) maps to [`PLACEHOLDER`].
pub fn make_legal_name(raw: &str) -> Cow<'_, str> {
    let trimmed = trim_segment(raw);

    if trimmed.is_empty() {
        return Cow::Borrowed(PLACEHOLDER);
    }

    let mut legal: Cow<'_, str> = if trimmed.contains(is_illegal) {
        Cow::Owned(trimmed.chars().map(|c| if is_illegal(c) { REPLACEMENT } else { c }).collect())
    } else {
        Cow::Borrowed(trimmed)
    };

    if is_reserved_device(&legal) {
        legal = Cow::Owned(format!("{REPLACEMENT}{legal}"));
    }

    if legal.len() > MAX_SEGMENT_LEN {
        let mut end = MAX_SEGMENT_LEN;
        while !legal.is_char_boundary(end) {
            end -= 1;
        }
        let kept = trim_segment(&legal[..end]);
        if kept.is_empty() {
            return Cow::Borrowed(PLACEHOLDER);
        }
        legal = Cow::Owned(kept.to_owned());
    }

    legal
}

/// Leading whitespace, and any mix of trailing whitespace and dots.
fn trim_segment(s: &str) -> &str {
    s.trim_start()
        .trim_end_matches(|c: char| c.is_whitespace() || c == '.')
}

fn is_reserved_device(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name);
    RESERVED_DEVICE_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
}

/// `<base>_<yyyy-MM-dd_HH-mm-ss>.<extension>`, sanitized, in local time.
pub fn file_name_with_timestamp(base: &str, extension: &str) -> String {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let extension = extension.trim_start_matches('.');
    make_legal_name(&format!("{base}_{stamp}.{extension}")).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_are_borrowed() {
        assert!(matches!(make_legal_name("dataset.tsv"), Cow::Borrowed("dataset.tsv")));
    }

    #[test]
    fn separators_and_reserved_characters_replaced() {
        assert_eq!(make_legal_name("a/b\\c:d"), "a_b_c_d");
        assert_eq!(make_legal_name("what?<now>|\"*"), "what__now____");
    }

    #[test]
    fn control_characters_replaced() {
        assert_eq!(make_legal_name("tab\there\n"), "tab_here");
    }

    #[test]
    fn leading_separator_cannot_survive() {
        assert_eq!(make_legal_name("/etc/passwd"), "_etc_passwd");
    }

    #[test]
    fn empty_and_dot_names_map_to_placeholder() {
        assert_eq!(make_legal_name(""), PLACEHOLDER);
        assert_eq!(make_legal_name("   "), PLACEHOLDER);
        assert_eq!(make_legal_name("."), PLACEHOLDER);
        assert_eq!(make_legal_name(".."), PLACEHOLDER);
    }

    #[test]
    fn trailing_dots_trimmed() {
        assert_eq!(make_legal_name("report..."), "report");
        assert_eq!(make_legal_name("x. ."), "x");
        assert_eq!(make_legal_name(". . ."), PLACEHOLDER);
    }

    #[test]
    fn truncation_does_not_expose_trailing_dot() {
        let raw = format!("{}. zzz", "a".repeat(254));
        assert_eq!(make_legal_name(&raw), "a".repeat(254));

        let dots = format!("{}x", ".".repeat(300));
        assert_eq!(make_legal_name(&dots), PLACEHOLDER);
    }

    #[test]
    fn device_names_prefixed() {
        assert_eq!(make_legal_name("con"), "_con");
        assert_eq!(make_legal_name("LPT1.txt"), "_LPT1.txt");
        assert_eq!(make_legal_name("console"), "console");
    }

    #[test]
    fn long_names_truncated_on_char_boundary() {
        let raw = "é".repeat(200);
        let legal = make_legal_name(&raw);
        assert!(legal.len() <= MAX_SEGMENT_LEN);
        assert!(legal.chars().all(|c| c == 'é'));
    }

    #[test]
    fn collisions_are_deterministic() {
        assert_eq!(make_legal_name("a/b"), make_legal_name("a:b"));
    }

    #[test]
    fn timestamped_name_shape() {
        let name = file_name_with_timestamp("My Study", "zip");
        assert!(name.starts_with("My Study_"));
        assert!(name.ends_with(".zip"));
        assert_eq!(name.len(), "My Study_".len() + "yyyy-MM-dd_HH-mm-ss".len() + ".zip".len());
    }
}
