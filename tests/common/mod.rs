//! Common test utilities
//!
//! This module is shared across all integration tests

pub mod extractor;
pub mod fixtures;
pub mod transport;

#[allow(unused_imports)]
pub use extractor::{Script, ScriptedExtractor};
#[allow(unused_imports)]
pub use fixtures::{heartbeat, stale_heartbeat, test_summary, FixedCapacity, TestEnvironment};
#[allow(unused_imports)]
pub use transport::{Call, RecordingTransport};
