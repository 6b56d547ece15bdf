//! FileVault Server Library
//!
//! Chunked file transfer over HTTP with bounded, non-blocking admission control.
//! The server binary is in main.rs.
//!
//! # Modules
//!
//! - `storage`: Flat-directory file storage, identity encoded in entry names
//! - `transfer`: List/Upload/Download protocol and its state machine
//! - `admission`: Streaming and unary concurrency pools
//! - `routes`: axum HTTP surface

pub mod admission;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod storage;
pub mod transfer;

pub use error::{Result, TransferError};
pub use routes::create_router;
pub use state::AppState;
