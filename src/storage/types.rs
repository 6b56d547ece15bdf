//! Storage types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, TransferError};

/// Separator between the id and the uploaded name in a stored file name
pub const SEPARATOR: char = '_';

/// Identity of a stored file, encoded entirely in its directory entry name.
///
/// The id is a hyphenated UUID and never contains [`SEPARATOR`], so splitting on
/// the first separator recovers the uploaded name even when the name itself
/// contains underscores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredName {
    pub id: Uuid,
    pub name: String,
}

impl StoredName {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Directory entry name: `<id>_<name>`
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.id.hyphenated(), SEPARATOR, self.name)
    }

    /// Decode a directory entry name; `None` for entries not written by this server.
    pub fn decode(entry: &str) -> Option<Self> {
        let (id, name) = entry.split_once(SEPARATOR)?;
        if name.is_empty() {
            return None;
        }
        let id = Uuid::try_parse(id).ok()?;
        Some(Self {
            id,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for StoredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// One stored file as seen by a directory scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: Uuid,
    pub name: String,
    /// Current byte length; smaller than the final size while an upload is in flight
    pub size: u64,
    /// Filesystem mtime, standing in for both creation and update time
    pub modified_at: DateTime<Utc>,
}

/// Check that a client-supplied name can live as a single entry in a flat directory.
pub fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TransferError::validation("filename must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(TransferError::validation(format!(
            "filename is not allowed: {name:?}"
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(TransferError::validation(format!(
            "filename must not contain path separators: {name:?}"
        )));
    }
    Ok(())
}
