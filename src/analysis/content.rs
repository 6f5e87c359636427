//! Body cleanup: drop quoted history and signatures, then cap the length.

use std::sync::LazyLock;

use regex::Regex;

/// Lines that start the quoted/trailer part of a reply.
static TRAILER_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:>|On .+wrote:|-----Original Message-----|From: |差出人: |--\s*$)",
    )
    .expect("valid trailer regex")
});

/// Cut the body at the first quote/trailer boundary line and trim it.
///
/// `\r\n` is normalized to `\n` first. Without a boundary the whole body is kept.
pub fn trim_reply_junk(body: &str) -> String {
    let normalized = body.replace("\r\n", "\n");
    let kept: Vec<&str> = normalized
        .split('\n')
        .take_while(|line| !TRAILER_BOUNDARY.is_match(line))
        .collect();
    kept.join("\n").trim().to_string()
}

/// At most `max_len` characters of `text`. No word-boundary adjustment.
///
/// Counts `char`s, not UTF-16 units, so text with characters outside the
/// BMP (emoji) keeps more of its content than a UTF-16 cut at the same limit.
pub fn snippet(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_at_quote_marker() {
        assert_eq!(trim_reply_junk("Hello\n> quoted line\nmore"), "Hello");
    }

    #[test]
    fn test_trim_at_on_wrote_header() {
        let body = "Thanks!\n\nOn Mon, Jan 1, 2024 at 10:00 Bob <bob@x> wrote:\n> old";
        assert_eq!(trim_reply_junk(body), "Thanks!");
    }

    #[test]
    fn test_trim_at_original_message_marker() {
        let body = "See below\r\n-----Original Message-----\r\nFrom: x";
        assert_eq!(trim_reply_junk(body), "See below");
    }

    #[test]
    fn test_trim_at_japanese_sender_label() {
        let body = "承知しました。\n差出人: 山田\n件名: 見積";
        assert_eq!(trim_reply_junk(body), "承知しました。");
    }

    #[test]
    fn test_trim_at_signature_separator() {
        assert_eq!(trim_reply_junk("Body text\n-- \nJohn"), "Body text");
        assert_eq!(trim_reply_junk("Body text\n--\nJohn"), "Body text");
    }

    #[test]
    fn test_double_dash_with_text_is_not_a_signature() {
        assert_eq!(trim_reply_junk("a\n-- not a sig\nb"), "a\n-- not a sig\nb");
    }

    #[test]
    fn test_from_requires_trailing_space() {
        assert_eq!(trim_reply_junk("From:x\nrest"), "From:x\nrest");
    }

    #[test]
    fn test_no_boundary_keeps_everything() {
        assert_eq!(trim_reply_junk("  line one\nline two  \n"), "line one\nline two");
    }

    #[test]
    fn test_boundary_on_first_line_yields_empty() {
        assert_eq!(trim_reply_junk("> all quoted\n> still"), "");
    }

    #[test]
    fn test_snippet_hard_truncation() {
        let s = "abcdefghijklmnopqrst";
        assert_eq!(snippet(s, 10), "abcdefghij");
        assert_eq!(snippet(s, 50), s);
    }

    #[test]
    fn test_snippet_counts_characters_not_bytes() {
        assert_eq!(snippet("見積のご相談です", 3), "見積の");
    }

    #[test]
    fn test_snippet_keeps_whole_emoji() {
        assert_eq!(snippet("ok👍👍done", 4), "ok👍👍");
    }
}
