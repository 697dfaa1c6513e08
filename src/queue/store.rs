use super::error::QueueError;
use super::request::BlobFetchRequest;
use crate::primitives::Slot;
use crate::runtime::telemetry::Telemetry;
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const ENTRY_SUFFIX: &str = ".json";
const TEMP_SUFFIX: &str = ".tmp";
const CORRUPTED_SUFFIX: &str = ".corrupted";

/// Why a pending request was dropped without being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionReason {
    OutsideWindow,
    MaxRetries,
}

impl EvictionReason {
    /// Metric label for the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::OutsideWindow => "outside_window",
            EvictionReason::MaxRetries => "max_retries",
        }
    }
}

/// Handle to one on-disk request, returned by [`BlobQueue::get_next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    path: PathBuf,
}

impl QueueEntry {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut raw = self.path.clone().into_os_string();
        raw.push(suffix);
        PathBuf::from(raw)
    }
}

/// Directory of pending requests, one `<slot:010>.json` file per slot.
///
/// Only the background fetch loop reads, rewrites and deletes entries; `add`
/// may run concurrently from the block-processing path because every write
/// lands through an atomic rename.
#[derive(Debug)]
pub struct BlobQueue {
    dir: PathBuf,
    telemetry: Arc<Telemetry>,
}

impl BlobQueue {
    /// Opens (creating if needed) the queue at `dir` with private telemetry.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, QueueError> {
        Self::with_telemetry(dir, Arc::new(Telemetry::default()))
    }

    /// Opens the queue at `dir`, reporting depth and evictions to `telemetry`.
    ///
    /// Temp files left behind by a crash mid-write are discarded: the final
    /// file was never renamed into place, so the write never happened.
    pub fn with_telemetry(
        dir: impl Into<PathBuf>,
        telemetry: Arc<Telemetry>,
    ) -> Result<Self, QueueError> {
        let dir = dir.into();
        create_queue_dir(&dir).map_err(|source| QueueError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let queue = Self { dir, telemetry };
        queue.remove_orphaned_temp_files()?;
        Ok(queue)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    /// Path of the file backing `slot`.
    pub fn entry_path(&self, slot: Slot) -> PathBuf {
        self.dir.join(format!("{slot:010}{ENTRY_SUFFIX}"))
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.entry_path(slot).exists()
    }

    /// Number of pending entries currently on disk.
    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.pending_entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }

    /// Persists `request` for `slot`.
    ///
    /// Returns `Ok(false)` without touching the disk when the slot is already
    /// queued.
    pub fn add(&self, slot: Slot, request: &BlobFetchRequest) -> Result<bool, QueueError> {
        let path = self.entry_path(slot);
        if path.exists() {
            tracing::info!(slot, "blob fetch request already queued for slot; skipping");
            return Ok(false);
        }

        let data =
            serde_json::to_vec(request).map_err(|source| QueueError::Encode { slot, source })?;
        write_atomically(&path, &data).map_err(|source| QueueError::Write {
            path: path.clone(),
            source,
        })?;

        self.telemetry.record_queued();
        Ok(true)
    }

    /// Returns the lowest-slot request that is ready to be attempted.
    ///
    /// While scanning, entries outside the availability window (only checked
    /// once `head_slot` is known, i.e. non-zero) and entries that have used up
    /// `max_retries` are deleted; entries that failed less than
    /// `retry_interval` ago are left in place; unreadable JSON is quarantined.
    /// `Ok(None)` means nothing is actionable right now.
    pub fn get_next<F>(
        &self,
        head_slot: Slot,
        retry_interval: Duration,
        max_retries: u32,
        within_window: F,
    ) -> Result<Option<(BlobFetchRequest, QueueEntry)>, QueueError>
    where
        F: Fn(Slot, Slot) -> bool,
    {
        let entries = self.pending_entries()?;
        self.telemetry.record_queue_depth(entries.len());
        let now = Utc::now();

        for entry in entries {
            let data = match fs::read(entry.path()) {
                Ok(data) => data,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => return Err(QueueError::ReadEntry { entry, source }),
            };

            let request: BlobFetchRequest = match serde_json::from_slice(&data) {
                Ok(request) => request,
                Err(err) => {
                    self.quarantine(&entry, &err);
                    continue;
                }
            };

            let slot = request.slot();
            if head_slot > 0 && !within_window(slot, head_slot) {
                tracing::warn!(
                    slot,
                    head_slot,
                    failure_count = request.failure_count,
                    "request is outside availability window; deleting"
                );
                self.evict(&entry, EvictionReason::OutsideWindow);
                continue;
            }

            if request.failure_count >= max_retries {
                tracing::warn!(
                    slot,
                    failure_count = request.failure_count,
                    max_retries,
                    "request exceeded max retry limit; deleting"
                );
                self.evict(&entry, EvictionReason::MaxRetries);
                continue;
            }

            if !request.ready_for_retry(now, retry_interval) {
                continue;
            }

            return Ok(Some((request, entry)));
        }

        Ok(None)
    }

    /// Deletes the file behind `entry`. Missing files count as removed.
    pub fn remove(&self, entry: &QueueEntry) -> Result<(), QueueError> {
        match fs::remove_file(entry.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(QueueError::Remove {
                entry: entry.clone(),
                source,
            }),
        }
    }

    /// Records a failed attempt on `request` and rewrites its file.
    ///
    /// Returns the request as persisted.
    pub fn update_retry(
        &self,
        entry: &QueueEntry,
        mut request: BlobFetchRequest,
    ) -> Result<BlobFetchRequest, QueueError> {
        request.record_failure(Utc::now());

        let data = serde_json::to_vec(&request).map_err(|source| QueueError::Encode {
            slot: request.slot(),
            source,
        })?;
        write_atomically(entry.path(), &data).map_err(|source| QueueError::Write {
            path: entry.path().to_path_buf(),
            source,
        })?;

        self.telemetry.record_retry();
        Ok(request)
    }

    fn pending_entries(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let read_dir_err = |source| QueueError::ReadDir {
            path: self.dir.clone(),
            source,
        };

        let mut names = Vec::new();
        for dir_entry in fs::read_dir(&self.dir).map_err(read_dir_err)? {
            let dir_entry = dir_entry.map_err(read_dir_err)?;
            let is_file = dir_entry
                .file_type()
                .map(|kind| kind.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            let Ok(name) = dir_entry.file_name().into_string() else {
                continue;
            };
            if name.ends_with(ENTRY_SUFFIX) {
                names.push(name);
            }
        }

        names.sort_by_cached_key(|name| scan_order(name));
        Ok(names
            .into_iter()
            .map(|name| QueueEntry::new(self.dir.join(name)))
            .collect())
    }

    fn evict(&self, entry: &QueueEntry, reason: EvictionReason) {
        match self.remove(entry) {
            Ok(()) => self.telemetry.record_expired(reason),
            Err(err) => tracing::error!(
                reason = reason.as_str(),
                error = %err,
                "failed to evict blob fetch request"
            ),
        }
    }

    fn quarantine(&self, entry: &QueueEntry, cause: &serde_json::Error) {
        let target = entry.with_suffix(CORRUPTED_SUFFIX);
        match fs::rename(entry.path(), &target) {
            Ok(()) => tracing::error!(
                file = %entry.path().display(),
                quarantined = %target.display(),
                error = %cause,
                "corrupted blob fetch request quarantined; operator attention required"
            ),
            Err(err) => tracing::error!(
                file = %entry.path().display(),
                error = %err,
                decode_error = %cause,
                "failed to quarantine corrupted blob fetch request"
            ),
        }
    }

    fn remove_orphaned_temp_files(&self) -> Result<(), QueueError> {
        let read_dir_err = |source| QueueError::ReadDir {
            path: self.dir.clone(),
            source,
        };

        for dir_entry in fs::read_dir(&self.dir).map_err(read_dir_err)? {
            let path = dir_entry.map_err(read_dir_err)?.path();
            let is_temp = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.ends_with(TEMP_SUFFIX))
                .unwrap_or(false);
            if !is_temp {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(file = %path.display(), "removed orphaned blob fetch temp file")
                }
                Err(err) => tracing::warn!(
                    file = %path.display(),
                    error = %err,
                    "failed to remove orphaned blob fetch temp file"
                ),
            }
        }
        Ok(())
    }
}

/// Scan order: numeric slot order, so names wider than the zero padding still
/// sort correctly. Names without a numeric stem come last.
fn scan_order(name: &str) -> (bool, Slot, String) {
    let slot = name
        .strip_suffix(ENTRY_SUFFIX)
        .and_then(|stem| stem.parse::<Slot>().ok());
    (slot.is_none(), slot.unwrap_or_default(), name.to_owned())
}

fn create_queue_dir(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o750);
    }
    builder.create(dir)
}

/// Writes `data` to `<path>.tmp`, syncs it, then renames it over `path`.
fn write_atomically(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(TEMP_SUFFIX);
    let temp = PathBuf::from(temp);

    let written = open_private(&temp).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&temp);
        return Err(err);
    }

    if let Err(err) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(err);
    }
    Ok(())
}

fn open_private(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}
