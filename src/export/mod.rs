//! Export of recorded replies.

pub mod csv;
