//! Email parsing for the MBOX mailbox: file splitting, header decoding,
//! and MIME body extraction.

pub mod header;
pub mod mbox;
pub mod mime;
