//! Observing remote uploads performed by the sync sidecar

pub mod log_line;
pub mod registry;
pub mod watcher;

pub use registry::{UploadTicket, UploadWatchRegistry};
pub use watcher::{UnknownReason, UploadOutcome, UploadWatchConfig, UploadWatchTarget};
