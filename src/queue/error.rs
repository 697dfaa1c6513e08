use super::store::QueueEntry;
use crate::primitives::Slot;
use std::io;
use std::path::PathBuf;

/// Failures surfaced by [`super::BlobQueue`].
#[derive(Debug)]
pub enum QueueError {
    CreateDir { path: PathBuf, source: io::Error },
    ReadDir { path: PathBuf, source: io::Error },
    ReadEntry { entry: QueueEntry, source: io::Error },
    Encode { slot: Slot, source: serde_json::Error },
    Write { path: PathBuf, source: io::Error },
    Remove { entry: QueueEntry, source: io::Error },
}

impl QueueError {
    /// The entry the failure is tied to, if the drain loop should try to drop it.
    pub fn entry(&self) -> Option<&QueueEntry> {
        match self {
            QueueError::ReadEntry { entry, .. } => Some(entry),
            _ => None,
        }
    }
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::CreateDir { path, source } => write!(
                f,
                "failed to create blob fetch queue directory {}: {source}",
                path.display()
            ),
            QueueError::ReadDir { path, source } => write!(
                f,
                "failed to read blob fetch queue directory {}: {source}",
                path.display()
            ),
            QueueError::ReadEntry { entry, source } => write!(
                f,
                "failed to read request file {}: {source}",
                entry.path().display()
            ),
            QueueError::Encode { slot, source } => {
                write!(f, "failed to encode blob fetch request for slot {slot}: {source}")
            }
            QueueError::Write { path, source } => {
                write!(f, "failed to write request file {}: {source}", path.display())
            }
            QueueError::Remove { entry, source } => write!(
                f,
                "failed to delete request file {}: {source}",
                entry.path().display()
            ),
        }
    }
}

impl std::error::Error for QueueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueueError::CreateDir { source, .. }
            | QueueError::ReadDir { source, .. }
            | QueueError::ReadEntry { source, .. }
            | QueueError::Write { source, .. }
            | QueueError::Remove { source, .. } => Some(source),
            QueueError::Encode { source, .. } => Some(source),
        }
    }
}
