//! Crash-safe, directory-backed queue of pending blob fetch requests.
//!
//! Each pending slot owns one JSON file named after the zero-padded slot, and
//! scans visit entries in ascending slot order. Writes go
//! to a `.tmp` sibling first and are renamed into place; unreadable entries
//! are moved aside with a `.corrupted` suffix.

mod error;
mod request;
mod store;

pub use error::QueueError;
pub use request::BlobFetchRequest;
pub use store::{BlobQueue, EvictionReason, QueueEntry};
