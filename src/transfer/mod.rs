//! Chunked Transfer Module
//!
//! Implements the three file operations:
//! - List: every stored file with its synthesized metadata
//! - Upload: filename first, then byte chunks in order; partial files are
//!   removed on any failure
//! - Download: one metadata frame, then 64KB chunks read sequentially

pub mod download;
pub mod service;
pub mod types;
pub mod upload;

pub use download::DownloadStream;
pub use service::TransferService;
pub use types::*;
pub use upload::{Upload, UploadPhase};
