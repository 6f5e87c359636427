//! RFC 5322 header handling: folding, encoded-words (RFC 2047), dates, ids.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab)
/// onto the previous header.
///
/// Returns `(name, raw_value)` pairs in file order; names keep their case.
pub fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_string();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
    }

    result
}

/// First value of a header (case-insensitive name).
pub fn get_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Tokens that fail to decode are kept verbatim.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two encoded words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];
        match decode_one_word(after_start) {
            Some((text, consumed)) => {
                result.push_str(&text);
                remaining = &after_start[consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=`; returns the text and the bytes consumed.
fn decode_one_word(s: &str) -> Option<(String, usize)> {
    let mut parts = s.splitn(3, '?');
    let charset = parts.next()?;
    let encoding = parts.next()?;
    let rest = parts.next()?;
    let end = rest.find("?=")?;
    let encoded_text = &rest[..end];

    let consumed = charset.len() + 1 + encoding.len() + 1 + end + 2;

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => STANDARD.decode(encoded_text.trim()).ok()?,
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some((decode_charset(charset, &bytes), consumed))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    Err(_) => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match encoding_rs::Encoding::for_label(charset.trim().as_bytes()) {
        Some(encoding) => {
            let (decoded, _, _) = encoding.decode(bytes);
            decoded.into_owned()
        }
        None => {
            warn!(charset, "Unknown charset, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Parse an email date in the formats seen in real mailboxes.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Comments such as "(JST)" after the offset
    let no_comment = trimmed
        .split_once(" (")
        .map_or(trimmed, |(head, _)| head)
        .trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(no_comment) {
        return Some(dt.with_timezone(&Utc));
    }

    let replaced = replace_named_tz(no_comment);
    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y/%m/%d %H:%M:%S %z",
    ];
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(no_comment, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Replace a trailing timezone abbreviation with its numeric offset.
fn replace_named_tz(s: &str) -> String {
    // Longest names first so "CEST" is not read as "EST"
    let tzs = [
        ("CEST", "+0200"),
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    for (name, offset) in &tzs {
        if let Some(head) = s.strip_suffix(name) {
            return format!("{head}{offset}");
        }
    }
    s.to_string()
}

/// Message-ID without angle brackets and surrounding whitespace.
pub fn normalize_id(id: &str) -> String {
    id.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}

/// All `<…>` tokens of a header (References), normalized.
pub fn extract_all_ids(s: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut remaining = s;
    while let Some(start) = remaining.find('<') {
        let Some(len) = remaining[start..].find('>') else {
            break;
        };
        let id = normalize_id(&remaining[start..=start + len]);
        if !id.is_empty() {
            result.push(id);
        }
        remaining = &remaining[start + len + 1..];
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_adjacent_encoded_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_japanese_subject() {
        // "Re: 見積"
        let input = "=?UTF-8?B?UmU6IOimi+epjQ==?=";
        assert_eq!(decode_encoded_words(input), "Re: 見積");
    }

    #[test]
    fn test_decode_plain_text_untouched() {
        assert_eq!(decode_encoded_words("Plain subject"), "Plain subject");
        assert_eq!(decode_encoded_words("broken =?x"), "broken =?x");
    }

    #[test]
    fn test_unfold_headers() {
        let text = "Subject: long\n  continued\nReferences: <a@x>\n\t<b@x>\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0], ("Subject".to_string(), "long continued".to_string()));
        assert_eq!(get_header(&headers, "references"), Some("<a@x> <b@x>"));
    }

    #[test]
    fn test_parse_date_variants() {
        assert!(parse_date("Wed, 01 Jan 2025 12:00:00 +0000").is_some());
        assert!(parse_date("Wed, 01 Jan 2025 21:00:00 +0900 (JST)").is_some());
        assert!(parse_date("2025-01-01T12:00:00Z").is_some());
        assert!(parse_date("01 Jan 2025 21:00:00 JST").is_some());
        assert!(parse_date("").is_none());
        assert!(parse_date("not a date").is_none());
    }

    #[test]
    fn test_extract_all_ids() {
        assert_eq!(
            extract_all_ids("<a@x> <b@x>\t<c@x>"),
            vec!["a@x".to_string(), "b@x".to_string(), "c@x".to_string()]
        );
        assert!(extract_all_ids("").is_empty());
    }
}
