//! `replytrack`: tracks replies arriving in a mailbox.
//!
//! Each run searches the mailbox with a list of rules, records every new
//! unread reply as one row of a sheet, labels its conversation, and marks
//! it read. Processed message ids are kept between runs so nothing is
//! recorded twice.

pub mod analysis;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod export;
pub mod mailbox;
pub mod model;
pub mod parser;
pub mod presenter;
pub mod runner;
pub mod schedule;
pub mod store;
