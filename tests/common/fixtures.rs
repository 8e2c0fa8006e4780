//! Filesystem fixtures and a fixed capacity query

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tubestash::core::error::AppError;
use tubestash::download::{DownloadOrchestrator, Extractor, OutputContainer, PipelineSettings};
use tubestash::storage::{BackendRegistry, CapacityMonitor, RemoteCapacityQuery, StorageSettings, StorageUsage};
use tubestash::telegram::messages::TransferSummary;
use tubestash::telegram::ChatTransport;
use tubestash::upload::{UploadWatchConfig, UploadWatchRegistry};

/// Writes a fresh heartbeat for `backend_id` under `root`.
pub fn heartbeat(root: &Path, backend_id: &str) {
    write_heartbeat(root, backend_id, chrono::Utc::now().timestamp_millis() as f64 / 1000.0);
}

/// Writes a heartbeat well outside the liveness window.
#[allow(dead_code)]
pub fn stale_heartbeat(root: &Path, backend_id: &str) {
    write_heartbeat(root, backend_id, chrono::Utc::now().timestamp() as f64 - 3600.0);
}

fn write_heartbeat(root: &Path, backend_id: &str, timestamp: f64) {
    let dir = root.join(backend_id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(".heartbeat"), timestamp.to_string()).unwrap();
}

/// Remote capacity query with a canned answer; `None` means unavailable.
pub struct FixedCapacity(pub Option<StorageUsage>);

#[async_trait]
impl RemoteCapacityQuery for FixedCapacity {
    async fn query(&self, backend_id: &str) -> Result<StorageUsage, AppError> {
        self.0
            .ok_or_else(|| AppError::Storage(format!("capacity of {} unavailable", backend_id)))
    }
}

/// Temporary data root, scratch dir and upload log with millisecond timings.
pub struct TestEnvironment {
    _tmp: TempDir,
    pub data_root: PathBuf,
    pub scratch_dir: PathBuf,
    pub log_path: PathBuf,
}

#[allow(dead_code)]
impl TestEnvironment {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let data_root = tmp.path().join("data");
        let scratch_dir = tmp.path().join("scratch");
        let log_path = tmp.path().join("logs").join("rclone-upload.log");
        std::fs::create_dir_all(&data_root).unwrap();
        std::fs::create_dir_all(log_path.parent().unwrap()).unwrap();
        Self {
            _tmp: tmp,
            data_root,
            scratch_dir,
            log_path,
        }
    }

    pub fn registry(&self) -> Arc<BackendRegistry> {
        Arc::new(BackendRegistry::new(StorageSettings::new(&self.data_root)))
    }

    pub fn upload_config(&self) -> UploadWatchConfig {
        UploadWatchConfig {
            log_path: self.log_path.clone(),
            poll_interval: Duration::from_millis(20),
            log_wait: Duration::from_millis(150),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings::new(&self.scratch_dir, self.upload_config())
    }

    /// Orchestrator with a capacity monitor that never warns for local storage.
    pub fn orchestrator(
        &self,
        extractor: Arc<dyn Extractor>,
        transport: Arc<dyn ChatTransport>,
        remote_capacity: Option<StorageUsage>,
        settings: PipelineSettings,
    ) -> (DownloadOrchestrator, UploadWatchRegistry) {
        let watchers = UploadWatchRegistry::new();
        let capacity = Arc::new(CapacityMonitor::new(0, Arc::new(FixedCapacity(remote_capacity))));
        let orchestrator =
            DownloadOrchestrator::new(self.registry(), capacity, extractor, transport, watchers.clone(), settings);
        (orchestrator, watchers)
    }

    pub fn append_log(&self, line: &str) {
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .unwrap();
        writeln!(f, "{}", line).unwrap();
    }
}

/// Summary of a finished download, for watcher tests.
#[allow(dead_code)]
pub fn test_summary(file_name: &str, backend_id: &str, dir: &Path) -> TransferSummary {
    TransferSummary {
        file_name: file_name.to_string(),
        container: OutputContainer::Audio,
        backend_id: backend_id.to_string(),
        backend_display_name: format!("Cloud Storage ({})", backend_id),
        final_path: dir.join(file_name),
        source_url: "https://example.com/watch?v=abc".to_string(),
    }
}
