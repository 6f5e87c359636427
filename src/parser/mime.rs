//! Turning one raw RFC 5322 message into a [`Message`] snapshot.

use chrono::DateTime;
use mail_parser::MessageParser;
use sha2::{Digest, Sha256};

use crate::model::message::{Message, MessageId};
use crate::parser::header::{
    decode_encoded_words, decode_header_bytes, get_header, normalize_id, parse_date,
    unfold_headers,
};

/// Build a message snapshot from raw bytes (an optional leading `From `
/// separator line is skipped).
///
/// Never fails: unparseable MIME falls back to the text after the first
/// blank line, and a missing `Message-ID` is replaced by a content hash.
pub fn parse_message(raw_message: &[u8]) -> Message {
    let data = skip_from_line(raw_message);
    let header_end = find_header_end(data).unwrap_or(data.len());
    let headers = unfold_headers(&decode_header_bytes(&data[..header_end]));

    let decoded = |name: &str| {
        get_header(&headers, name)
            .map(decode_encoded_words)
            .unwrap_or_default()
    };

    let id = get_header(&headers, "Message-ID")
        .map(normalize_id)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| synthetic_id(data));

    let date = get_header(&headers, "Date")
        .and_then(parse_date)
        .unwrap_or(DateTime::UNIX_EPOCH);

    let unread = !["Status", "X-Status"]
        .iter()
        .filter_map(|name| get_header(&headers, name))
        .any(|flags| flags.contains('R'));

    Message {
        id: MessageId::new(id),
        subject: decoded("Subject"),
        from: decoded("From"),
        to: decoded("To"),
        cc: decoded("Cc"),
        date,
        plain_body: extract_plain_body(data),
        unread,
        headers,
    }
}

/// `sha256:` plus the first 16 hex digits of the message digest.
fn synthetic_id(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}

/// Plain-text body via `mail-parser`, falling back to HTML converted to text,
/// then to the raw text after the headers.
fn extract_plain_body(data: &[u8]) -> String {
    let parser = MessageParser::default();
    match parser.parse(data) {
        Some(msg) => msg
            .body_text(0)
            .map(|s| s.into_owned())
            .or_else(|| msg.body_html(0).map(|html| html_to_text(&html)))
            .unwrap_or_default(),
        None => extract_body_fallback(data),
    }
}

/// Skip the `From ` separator line at the start of MBOX messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Byte offset where headers end (the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    for i in 0..data.len().saturating_sub(1) {
        if data[i] == b'\n' && data[i + 1] == b'\n' {
            return Some(i);
        }
        if i + 3 < data.len() && &data[i..i + 4] == b"\r\n\r\n" {
            return Some(i);
        }
    }
    None
}

/// Everything after the first blank line.
fn extract_body_fallback(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    if let Some(pos) = text.find("\r\n\r\n") {
        text[pos + 4..].to_string()
    } else if let Some(pos) = text.find("\n\n") {
        text[pos + 2..].to_string()
    } else {
        String::new()
    }
}

/// Convert HTML to plain text: block tags become newlines, remaining tags
/// are stripped, common entities decoded, blank runs collapsed.
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    for tag in ["<br>", "<br/>", "<br />", "<BR>"] {
        text = text.replace(tag, "\n");
    }
    for tag in ["p", "div", "tr", "li", "blockquote"] {
        text = text.replace(&format!("</{tag}>"), "\n");
        text = text.replace(&format!("</{}>", tag.to_uppercase()), "\n");
    }

    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }

    let result = result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    let mut cleaned = String::with_capacity(result.len());
    let mut prev_was_blank = false;
    for line in result.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}

/// Remove an entire tag block (e.g. `<script>…</script>`).
fn remove_tag_block(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;

    while let Some(start) = remaining.to_ascii_lowercase().find(&open) {
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        match after.to_ascii_lowercase().find(&close) {
            Some(end) => remaining = &after[end + close.len()..],
            None => {
                remaining = "";
                break;
            }
        }
    }
    result.push_str(remaining);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_fields() {
        let raw = b"From sender@example.com Wed Jan 01 12:00:00 2025\n\
Message-ID: <abc@example.com>\n\
From: Alice <alice@example.com>\n\
To: desk@example.com\n\
Subject: =?UTF-8?B?UmU6IOimi+epjQ==?=\n\
Date: Wed, 01 Jan 2025 12:00:00 +0000\n\
In-Reply-To: <root@example.com>\n\
\n\
Thanks\n";
        let msg = parse_message(raw);
        assert_eq!(msg.id.as_str(), "abc@example.com");
        assert_eq!(msg.subject, "Re: 見積");
        assert_eq!(msg.from, "Alice <alice@example.com>");
        assert_eq!(msg.to, "desk@example.com");
        assert_eq!(msg.cc, "");
        assert_eq!(msg.header("in-reply-to"), "<root@example.com>");
        assert!(msg.unread);
        assert!(msg.plain_body.contains("Thanks"));
    }

    #[test]
    fn test_status_header_marks_read() {
        let raw = b"Message-ID: <a@x>\nStatus: RO\nSubject: x\n\nbody\n";
        assert!(!parse_message(raw).unread);
        let raw = b"Message-ID: <a@x>\nStatus: O\nSubject: x\n\nbody\n";
        assert!(parse_message(raw).unread);
    }

    #[test]
    fn test_missing_message_id_is_synthesized() {
        let raw = b"Subject: x\n\nbody\n";
        let a = parse_message(raw);
        let b = parse_message(raw);
        assert!(a.id.as_str().starts_with("sha256:"));
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_html_to_text() {
        let html = "<p>Hello <b>world</b></p><p>Tom &amp; Jerry</p><script>x()</script>";
        let text = html_to_text(html);
        assert!(text.contains("Hello world"));
        assert!(text.contains("Tom & Jerry"));
        assert!(!text.contains("x()"));
    }
}
