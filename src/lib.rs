//! Tubestash - Telegram bot that stores downloaded media in local or cloud-synced storage
//!
//! A user sends a link, picks a source format, an output container and a
//! storage backend; the bot runs the extractor, moves the result into the
//! backend directory and, for cloud backends, follows the sync sidecar's
//! upload through its log.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging and small utilities
//! - `storage`: Backend discovery and liveness, capacity, stored files
//! - `download`: Request model, extractor, progress and the orchestrator
//! - `upload`: Upload log parsing and per-message upload watchers
//! - `telegram`: Chat transport, status messages, dialog and dispatcher

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cli;
pub mod core;
pub mod download;
pub mod storage;
pub mod telegram;
pub mod upload;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use download::{DownloadOrchestrator, DownloadRequest, PipelineSettings};
pub use storage::{BackendRegistry, CapacityMonitor, StorageSettings};
pub use upload::UploadWatchRegistry;
