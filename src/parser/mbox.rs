//! Streaming MBOX splitter.
//!
//! Reads line by line through a buffered reader and hands every complete
//! message to a callback. Tolerant of malformed input: mixed line endings,
//! `From ` lines without a preceding blank line, a truncated last message,
//! and a UTF-8 BOM at the start of the file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, TrackError};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Messages larger than this are truncated (with a warning).
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Streaming MBOX parser.
pub struct MboxParser {
    path: PathBuf,
    file_size: u64,
}

impl MboxParser {
    /// Create a parser for the given MBOX file.
    ///
    /// Verifies that the file exists, but not that it is an MBOX.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TrackError::FileNotFound(path.clone())
            } else {
                TrackError::io(&path, e)
            }
        })?;
        Ok(Self {
            path,
            file_size: metadata.len(),
        })
    }

    /// Total size of the underlying file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Call `on_message` with the raw bytes (separator line included) of
    /// every message, in file order. Returns the number of messages.
    ///
    /// A non-empty file whose first line is not a `From ` separator is
    /// rejected as [`TrackError::InvalidMbox`].
    pub fn parse(&self, on_message: &mut dyn FnMut(&[u8])) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| TrackError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut count: u64 = 0;
        let mut message_buf: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);
        let mut prev_line_was_empty = true;
        let mut first_line = true;
        let mut offset: u64 = 0;

        loop {
            line_buf.clear();
            let read = reader
                .read_until(b'\n', &mut line_buf)
                .map_err(|e| TrackError::io(&self.path, e))?;
            if read == 0 {
                break;
            }

            let is_from_line = is_mbox_separator(&line_buf);

            if first_line && !is_from_line && !is_blank_line(&line_buf) {
                return Err(TrackError::InvalidMbox(self.path.clone()));
            }

            if is_from_line {
                if !first_line && !prev_line_was_empty {
                    warn!(offset, "Found 'From ' separator without preceding blank line");
                }
                if !message_buf.is_empty() {
                    on_message(&message_buf);
                    count += 1;
                }
                message_buf.clear();
                message_buf.extend_from_slice(&line_buf);
            } else if message_buf.len() + line_buf.len() <= MAX_MESSAGE_SIZE {
                message_buf.extend_from_slice(&line_buf);
            } else if message_buf.len() <= MAX_MESSAGE_SIZE {
                warn!(offset, "Message exceeds maximum size, truncating body");
                // Push past the limit so the warning fires once per message
                message_buf.push(b'\n');
            }

            prev_line_was_empty = is_blank_line(&line_buf);
            first_line = false;
            offset += read as u64;
        }

        if !message_buf.is_empty() {
            on_message(&message_buf);
            count += 1;
        }

        Ok(count)
    }
}

/// Whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Whether a line is blank (only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_mbox_separator() {
        assert!(is_mbox_separator(
            b"From user@example.com Thu Jan 01 00:00:00 2024\n"
        ));
        assert!(!is_mbox_separator(b"from user@example.com\n"));
        assert!(!is_mbox_separator(b">From user@example.com\n"));
        assert!(!is_mbox_separator(b"Subject: From here\n"));
    }

    #[test]
    fn test_is_mbox_separator_with_bom() {
        let mut line = vec![0xEF, 0xBB, 0xBF];
        line.extend_from_slice(b"From user@example.com Thu Jan 01 00:00:00 2024\n");
        assert!(is_mbox_separator(&line));
    }

    #[test]
    fn test_is_blank_line() {
        assert!(is_blank_line(b"\n"));
        assert!(is_blank_line(b"\r\n"));
        assert!(!is_blank_line(b"hello\n"));
    }

    #[test]
    fn test_parse_splits_messages() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "From a@x Mon Jan 01 00:00:00 2024\nSubject: one\n\nbody\n\n\
             From b@x Mon Jan 01 00:00:00 2024\nSubject: two\n\nbody\n"
        )
        .unwrap();
        let parser = MboxParser::new(file.path()).unwrap();
        let mut subjects = Vec::new();
        let count = parser
            .parse(&mut |raw| {
                let text = String::from_utf8_lossy(raw);
                subjects.push(text.lines().nth(1).unwrap_or("").to_string());
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(subjects, vec!["Subject: one", "Subject: two"]);
    }

    #[test]
    fn test_parse_rejects_non_mbox() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Just some text\n").unwrap();
        let parser = MboxParser::new(file.path()).unwrap();
        assert!(matches!(
            parser.parse(&mut |_| {}),
            Err(TrackError::InvalidMbox(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MboxParser::new("/definitely/not/here.mbox"),
            Err(TrackError::FileNotFound(_))
        ));
    }
}
