//! Transfer protocol types

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

/// Maximum payload of one download chunk: 64KB
pub const CHUNK_SIZE: usize = 64 * 1024;

/// One inbound upload message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadMessage {
    /// Must be the first message of every upload
    Filename(String),
    /// File bytes, appended in arrival order
    Chunk(Bytes),
}

/// Result of a completed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
}

/// One outbound download frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadFrame {
    /// Always the first frame
    Info { name: String },
    /// At most [`CHUNK_SIZE`] bytes, never empty
    Chunk(Bytes),
}
