//! Storage backends: discovery, capacity and stored files

pub mod capacity;
pub mod files;
pub mod registry;

pub use capacity::{CapacityMonitor, RcloneAbout, RemoteCapacityQuery, StorageUsage};
pub use files::{list_files, StoredFile};
pub use registry::{BackendDescriptor, BackendKind, BackendRegistry, StorageSettings, LOCAL_BACKEND};
