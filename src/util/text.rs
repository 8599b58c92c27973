/// Removes markup tags from feed-provided text.
///
/// Deletes every complete `<...>` span. A `<` with no closing `>` is kept
/// verbatim along with everything after it, so damaged markup degrades to
/// visible text instead of swallowing the rest of the description.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                // Unterminated tag: nothing left to strip
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Collapses every run of whitespace (including newlines) to a single
/// space and trims the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates to at most `max` characters, cutting on a char boundary.
///
/// Returns a subslice, so the common does-not-need-truncation case is free.
/// The cut is positional, not word-boundary aware.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Reduces raw feed markup to a bounded plain-text preview: tags stripped,
/// whitespace collapsed, then hard-truncated to `max_chars`.
pub fn sanitize_description(raw: &str, max_chars: usize) -> String {
    let collapsed = collapse_whitespace(&strip_tags(raw));
    truncate_chars(&collapsed, max_chars).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_tags_basic() {
        assert_eq!(strip_tags("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_tags("no markup at all"), "no markup at all");
        assert_eq!(strip_tags(""), "");
    }

    #[test]
    fn test_strip_tags_attributes() {
        assert_eq!(
            strip_tags(r#"<a href="https://example.com">link</a> text"#),
            "link text"
        );
    }

    #[test]
    fn test_strip_tags_unterminated() {
        // A dangling '<' is not a tag; everything after it survives
        assert_eq!(strip_tags("before <broken"), "before <broken");
        assert_eq!(strip_tags("<"), "<");
    }

    #[test]
    fn test_strip_tags_consecutive() {
        assert_eq!(strip_tags("<br><br>gap"), "gap");
        assert_eq!(strip_tags("a < b > c"), "a  c");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b   c  "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
        assert_eq!(collapse_whitespace("   \n  "), "");
    }

    #[test]
    fn test_truncate_chars_shorter_input() {
        assert_eq!(truncate_chars("short", 500), "short");
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn test_truncate_chars_exact_cut() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abcdef", 0), "");
    }

    #[test]
    fn test_truncate_chars_multibyte_boundary() {
        // Counting chars, not bytes: CJK chars are 3 bytes each
        assert_eq!(truncate_chars("日本語テスト", 3), "日本語");
        assert_eq!(truncate_chars("aé日", 2), "aé");
    }

    #[test]
    fn test_sanitize_description_combined() {
        let raw = "<p>First   line</p>\n<p>Second\tline</p>";
        assert_eq!(sanitize_description(raw, 500), "First line Second line");
    }

    #[test]
    fn test_sanitize_description_truncates_to_limit() {
        let raw = "x".repeat(600);
        let out = sanitize_description(&raw, 500);
        assert_eq!(out.chars().count(), 500);
    }

    proptest! {
        #[test]
        fn sanitize_never_exceeds_limit(raw in ".*") {
            let out = sanitize_description(&raw, 500);
            prop_assert!(out.chars().count() <= 500);
        }

        #[test]
        fn truncate_never_panics_or_overshoots(s in ".*", max in 0usize..600) {
            let out = truncate_chars(&s, max);
            prop_assert!(out.chars().count() <= max);
            prop_assert!(s.starts_with(out));
        }
    }
}
