//! Local filesystem storage
//!
//! Every file lives directly under one root directory, named `<id>_<name>`.
//! There is no index: lookups and listings scan the directory each time, and a
//! file is visible to them from the moment it is created, before any bytes land.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs::{self, File};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::types::{validate_filename, FileRecord, StoredName};
use crate::error::{Result, TransferError};

/// Handle to a freshly created, empty file
#[derive(Debug)]
pub struct NewEntry {
    pub id: Uuid,
    pub path: PathBuf,
    pub file: File,
}

/// A stored file located by id
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub id: Uuid,
    pub path: PathBuf,
    pub name: String,
}

/// Flat-directory file storage
#[derive(Debug, Clone)]
pub struct Storage {
    root: Arc<PathBuf>,
}

impl Storage {
    /// Open storage rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a new empty file for `name` under a fresh id.
    ///
    /// The file is created on the blocking pool. If the caller is dropped
    /// before the handle reaches it, the file is removed again.
    pub async fn create_entry(&self, name: &str) -> Result<NewEntry> {
        validate_filename(name)?;

        let id = Uuid::new_v4();
        let path = self.root.join(StoredName::new(id, name).encode());

        let (tx, rx) = oneshot::channel();
        let task_path = path.clone();
        tokio::task::spawn_blocking(move || {
            let created = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&task_path)
                .map(|file| CreatedFile {
                    id,
                    path: task_path,
                    file: Some(file),
                });
            // An undelivered value is dropped here, or with the channel
            let _ = tx.send(created);
        });

        let created = rx
            .await
            .map_err(|_| io::Error::other("file creation task was cancelled"))??;
        let file = created
            .claim()
            .ok_or_else(|| io::Error::other("created file was already claimed"))?;

        tracing::debug!(file_id = %id, path = %path.display(), "Created storage entry");

        Ok(NewEntry {
            id,
            path,
            file: File::from_std(file),
        })
    }

    /// Find the file stored under `id` with a single directory scan.
    pub async fn resolve_by_id(&self, id: &str) -> Result<ResolvedEntry> {
        let wanted = Uuid::try_parse(id)
            .map_err(|_| TransferError::not_found(format!("file {id}")))?;

        let mut entries = fs::read_dir(self.root.as_path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(stored) = decode_entry_name(&entry) else {
                continue;
            };
            if stored.id != wanted {
                continue;
            }
            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => {
                    return Ok(ResolvedEntry {
                        id: stored.id,
                        path: entry.path(),
                        name: stored.name,
                    });
                }
                _ => continue,
            }
        }

        Err(TransferError::not_found(format!("file {id}")))
    }

    /// Enumerate every decodable file, in directory order.
    pub async fn list_all(&self) -> Result<Vec<FileRecord>> {
        let mut records = Vec::new();

        let mut entries = fs::read_dir(self.root.as_path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(stored) = decode_entry_name(&entry) else {
                tracing::debug!(entry = ?entry.file_name(), "Skipping undecodable entry");
                continue;
            };

            // An entry can vanish between readdir and stat (aborted upload)
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_file() {
                continue;
            }

            records.push(FileRecord {
                id: stored.id,
                name: stored.name,
                size: metadata.len(),
                modified_at: metadata
                    .modified()
                    .ok()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_default(),
            });
        }

        Ok(records)
    }

    /// Delete a stored file; a file that is already gone is not an error.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Freshly created file on its way back from the blocking pool; removed on
/// drop unless claimed.
struct CreatedFile {
    id: Uuid,
    path: PathBuf,
    file: Option<std::fs::File>,
}

impl CreatedFile {
    fn claim(mut self) -> Option<std::fs::File> {
        self.file.take()
    }
}

impl Drop for CreatedFile {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            drop(file);
            remove_detached(self.id, self.path.clone());
        }
    }
}

/// Remove an abandoned file from a drop guard without blocking a runtime
/// worker. Outside a runtime the removal runs inline.
pub(crate) fn remove_detached(id: Uuid, path: PathBuf) {
    let remove = move || match std::fs::remove_file(&path) {
        Ok(()) => tracing::info!(file_id = %id, "Removed abandoned file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!(file_id = %id, error = %e, "Failed to remove abandoned file"),
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(remove);
        }
        Err(_) => remove(),
    }
}

fn decode_entry_name(entry: &fs::DirEntry) -> Option<StoredName> {
    let file_name = entry.file_name();
    StoredName::decode(file_name.to_str()?)
}
