//! Storage module for the flat upload directory
//!
//! File identity (id and uploaded name) is encoded in the directory entry
//! name, so no metadata store is needed.

mod local;
mod types;

pub use local::{NewEntry, ResolvedEntry, Storage};
pub(crate) use local::remove_detached;
pub use types::*;
