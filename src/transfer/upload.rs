//! Upload state machine
//!
//! ```text
//! AwaitFilename --Filename--> Receiving --Chunk--> Receiving
//!       |                         |
//!       |                         +--end of input--> Closed
//!       +--anything else--> Aborting <--write/receive error--+
//! ```
//!
//! The partially written file is owned by the `Receiving` state. Leaving that
//! state any way other than `Closed` deletes it, including when the upload is
//! dropped mid-flight because the caller went away.

use std::io;
use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::types::{UploadMessage, UploadReceipt};
use crate::error::{Result, TransferError};
use crate::storage::{remove_detached, Storage};

/// Observable phase of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    AwaitFilename,
    Receiving,
    Closed,
    Aborting,
}

enum UploadState {
    AwaitFilename,
    Receiving(PartialFile),
    Closed,
    Aborting,
}

/// One upload call in progress
pub struct Upload {
    storage: Storage,
    state: UploadState,
}

impl Upload {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            state: UploadState::AwaitFilename,
        }
    }

    pub fn phase(&self) -> UploadPhase {
        match self.state {
            UploadState::AwaitFilename => UploadPhase::AwaitFilename,
            UploadState::Receiving(_) => UploadPhase::Receiving,
            UploadState::Closed => UploadPhase::Closed,
            UploadState::Aborting => UploadPhase::Aborting,
        }
    }

    /// Id assigned to the file, once the filename has been accepted
    pub fn id(&self) -> Option<Uuid> {
        match &self.state {
            UploadState::Receiving(partial) => Some(partial.id),
            _ => None,
        }
    }

    /// Feed the next inbound message.
    ///
    /// Any error leaves the upload in `Aborting` with nothing left on disk.
    pub async fn accept(&mut self, message: UploadMessage) -> Result<()> {
        let state = std::mem::replace(&mut self.state, UploadState::Aborting);

        match (state, message) {
            (UploadState::AwaitFilename, UploadMessage::Filename(name)) => {
                let entry = self.storage.create_entry(&name).await?;

                tracing::info!(file_id = %entry.id, file_name = %name, "Upload started");

                self.state = UploadState::Receiving(PartialFile {
                    id: entry.id,
                    name,
                    path: entry.path,
                    file: Some(entry.file),
                    bytes_written: 0,
                    settled: false,
                });
                Ok(())
            }
            (UploadState::AwaitFilename, UploadMessage::Chunk(_)) => Err(
                TransferError::validation("first upload message must carry a filename"),
            ),
            (UploadState::Receiving(mut partial), UploadMessage::Chunk(chunk)) => {
                match partial.write(&chunk).await {
                    Ok(()) => {
                        self.state = UploadState::Receiving(partial);
                        Ok(())
                    }
                    Err(e) => Err(self.discard(partial, e.into()).await),
                }
            }
            (UploadState::Receiving(partial), UploadMessage::Filename(_)) => {
                let err = TransferError::validation("filename was already sent for this upload");
                Err(self.discard(partial, err).await)
            }
            (state @ (UploadState::Closed | UploadState::Aborting), _) => {
                self.state = state;
                Err(TransferError::validation("upload is already finished"))
            }
        }
    }

    /// Client signalled end of input.
    pub async fn finish(&mut self) -> Result<UploadReceipt> {
        let state = std::mem::replace(&mut self.state, UploadState::Aborting);

        match state {
            UploadState::Receiving(partial) => {
                let id = partial.id;
                match partial.commit().await {
                    Ok(receipt) => {
                        tracing::info!(
                            file_id = %receipt.id,
                            file_name = %receipt.name,
                            bytes = receipt.size,
                            "Upload complete"
                        );
                        self.state = UploadState::Closed;
                        Ok(receipt)
                    }
                    Err(e) => {
                        tracing::warn!(file_id = %id, error = %e, "Upload aborted while closing file");
                        Err(e.into())
                    }
                }
            }
            UploadState::AwaitFilename => {
                Err(TransferError::validation("upload ended before a filename was sent"))
            }
            state @ (UploadState::Closed | UploadState::Aborting) => {
                self.state = state;
                Err(TransferError::validation("upload is already finished"))
            }
        }
    }

    /// Transport-level failure: abort and hand the error back for propagation.
    pub async fn fail(&mut self, err: TransferError) -> TransferError {
        let state = std::mem::replace(&mut self.state, UploadState::Aborting);

        match state {
            UploadState::Receiving(partial) => self.discard(partial, err).await,
            UploadState::Closed => {
                self.state = UploadState::Closed;
                err
            }
            UploadState::AwaitFilename | UploadState::Aborting => err,
        }
    }

    async fn discard(&self, mut partial: PartialFile, err: TransferError) -> TransferError {
        tracing::warn!(
            file_id = %partial.id,
            bytes = partial.bytes_written,
            error = %err,
            "Upload aborted, removing partial file"
        );

        drop(partial.file.take());
        if let Err(e) = self.storage.remove(&partial.path).await {
            tracing::error!(file_id = %partial.id, error = %e, "Failed to remove partial file");
        }
        partial.settled = true;

        err
    }
}

/// File being written by an upload; deleted on drop unless settled.
struct PartialFile {
    id: Uuid,
    name: String,
    path: PathBuf,
    file: Option<File>,
    bytes_written: u64,
    settled: bool,
}

impl PartialFile {
    async fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("upload file already closed"))?;
        file.write_all(chunk).await?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    async fn commit(mut self) -> io::Result<UploadReceipt> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        self.settled = true;

        Ok(UploadReceipt {
            id: self.id,
            name: std::mem::take(&mut self.name),
            size: self.bytes_written,
        })
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        drop(self.file.take());
        tracing::info!(file_id = %self.id, "Upload cancelled, removing partial file");
        remove_detached(self.id, std::mem::take(&mut self.path));
    }
}
