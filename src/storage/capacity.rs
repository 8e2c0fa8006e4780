//! Free-space checks for storage backends.
//!
//! Local backends are measured with `df` on the target directory; remotes are
//! asked through `rclone about <remote>: --json`. A failed query is never an
//! error for the caller: it comes back as `None` and counts as "capacity OK".
//! Low capacity is advisory and never stops a download.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::ChatId;
use tokio::process::Command;

use crate::core::config;
use crate::core::disk::get_disk_space;
use crate::core::error::AppError;
use crate::core::process::run_with_timeout;
use crate::core::utils::format_size;
use crate::storage::registry::LOCAL_BACKEND;
use crate::telegram::transport::ChatTransport;

/// Space snapshot of one backend, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl StorageUsage {
    pub fn used_percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.used as f64 / self.total as f64 * 100.0
        }
    }

    pub fn free_percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.free as f64 / self.total as f64 * 100.0
        }
    }
}

/// True iff free space is at or below the threshold.
pub fn is_low(usage: &StorageUsage, threshold_bytes: u64) -> bool {
    usage.free <= threshold_bytes
}

/// Capacity query for a remote backend.
#[async_trait]
pub trait RemoteCapacityQuery: Send + Sync {
    async fn query(&self, backend_id: &str) -> Result<StorageUsage, AppError>;
}

/// Runs `rclone about <remote>: --json` with a bounded timeout.
#[derive(Debug, Clone)]
pub struct RcloneAbout {
    bin: String,
    config_path: Option<PathBuf>,
    timeout: Duration,
}

impl RcloneAbout {
    pub fn new(bin: impl Into<String>, config_path: Option<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            config_path,
            timeout: config::capacity::query_timeout(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(config::RCLONE_BIN.clone(), Some(config::RCLONE_CONFIG_PATH.clone()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl RemoteCapacityQuery for RcloneAbout {
    async fn query(&self, backend_id: &str) -> Result<StorageUsage, AppError> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("about").arg(format!("{}:", backend_id)).arg("--json");
        if let Some(path) = &self.config_path {
            cmd.arg("--config").arg(path);
        }

        let output = run_with_timeout(&mut cmd, self.timeout).await?;
        if !output.status.success() {
            return Err(AppError::Storage(format!(
                "rclone about {} exited with {}: {}",
                backend_id,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_about_reply(&String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(Debug, Deserialize)]
struct AboutReply {
    total: Option<f64>,
    used: Option<f64>,
    free: Option<f64>,
}

/// Parses the JSON printed by `rclone about --json`.
///
/// When `free` is missing but `total` is known, it is derived as `total - used`.
/// An explicit `free` (even zero) is taken as reported.
pub fn parse_about_reply(stdout: &str) -> Result<StorageUsage, AppError> {
    let reply: AboutReply = serde_json::from_str(stdout.trim())?;
    if reply.total.is_none() && reply.free.is_none() {
        return Err(AppError::Storage("Capacity reply has neither total nor free".to_string()));
    }

    let as_bytes = |v: Option<f64>| v.filter(|v| v.is_finite() && *v > 0.0).map(|v| v as u64).unwrap_or(0);
    let total = as_bytes(reply.total);
    let used = as_bytes(reply.used);
    let free = match reply.free {
        Some(_) => as_bytes(reply.free),
        None => total.saturating_sub(used),
    };
    Ok(StorageUsage { total, used, free })
}

/// Checks backend capacity against a warning threshold.
#[derive(Clone)]
pub struct CapacityMonitor {
    threshold_bytes: u64,
    remote: Arc<dyn RemoteCapacityQuery>,
}

impl CapacityMonitor {
    pub fn new(threshold_bytes: u64, remote: Arc<dyn RemoteCapacityQuery>) -> Self {
        Self { threshold_bytes, remote }
    }

    pub fn from_env() -> Self {
        Self::new(*config::STORAGE_WARNING_THRESHOLD_BYTES, Arc::new(RcloneAbout::from_env()))
    }

    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    /// Space snapshot for a backend, or `None` when it cannot be determined.
    ///
    /// `path_hint` is the directory measured for the local backend.
    pub async fn check(&self, backend_id: &str, path_hint: &Path) -> Option<StorageUsage> {
        let result = if backend_id == LOCAL_BACKEND {
            get_disk_space(path_hint).await.map(|info| StorageUsage {
                total: info.total_bytes,
                used: info.used_bytes,
                free: info.available_bytes,
            })
        } else {
            self.remote.query(backend_id).await
        };

        match result {
            Ok(usage) => {
                log::debug!("Storage info for {}: {:?}", backend_id, usage);
                Some(usage)
            }
            Err(e) => {
                log::warn!("Could not check storage for {}: {}", backend_id, e);
                None
            }
        }
    }

    pub fn is_low(&self, usage: &StorageUsage) -> bool {
        is_low(usage, self.threshold_bytes)
    }

    /// Sends a warning into the chat when capacity is low.
    ///
    /// Returns `true` when capacity is fine or unknown, `false` when a warning
    /// was due. Every low check warns again; nothing is deduplicated.
    pub async fn notify_if_low(
        &self,
        transport: &dyn ChatTransport,
        chat_id: ChatId,
        backend_id: &str,
        snapshot: Option<StorageUsage>,
    ) -> bool {
        let Some(usage) = snapshot else {
            log::warn!("Capacity of {} unavailable, assuming OK", backend_id);
            return true;
        };
        if !self.is_low(&usage) {
            return true;
        }

        let text = warning_message(backend_id, &usage, self.threshold_bytes);
        match transport.send_message(chat_id, &text).await {
            Ok(_) => log::info!("Sent storage warning for {} to chat {}", backend_id, chat_id),
            Err(e) => log::error!("Failed to send storage warning: {}", e),
        }
        false
    }

    /// Human-readable capacity report with an OK/LOW marker.
    pub async fn status_report(&self, backend_id: &str, path_hint: &Path) -> Option<String> {
        let usage = self.check(backend_id, path_hint).await?;
        Some(render_status(backend_id, &usage, self.threshold_bytes))
    }
}

/// Text of the low-capacity warning.
pub fn warning_message(backend_id: &str, usage: &StorageUsage, threshold_bytes: u64) -> String {
    let (icon, storage_type) = if backend_id == LOCAL_BACKEND {
        ("💾", "local filesystem".to_string())
    } else {
        ("☁️", format!("{} cloud storage", backend_id))
    };

    format!(
        "⚠️ Storage Warning - {}\n\n\
         {} Your {} is running low!\n\n\
         📊 Storage Status:\n\
         • Free space: {}\n\
         • Total space: {}\n\
         • Used: {:.1}%\n\n\
         💡 Consider cleaning up old files or upgrading your storage.\n\n\
         🔧 Warning threshold: {}",
        backend_id.to_uppercase(),
        icon,
        storage_type,
        format_size(usage.free),
        format_size(usage.total),
        usage.used_percent(),
        format_size(threshold_bytes)
    )
}

pub fn render_status(backend_id: &str, usage: &StorageUsage, threshold_bytes: u64) -> String {
    let (emoji, label) = if is_low(usage, threshold_bytes) {
        ("⚠️", "LOW")
    } else {
        ("✅", "OK")
    };
    format!(
        "{} {} Storage ({})\n• Free: {} ({:.1}%)\n• Used: {} ({:.1}%)\n• Total: {}",
        emoji,
        backend_id.to_uppercase(),
        label,
        format_size(usage.free),
        usage.free_percent(),
        format_size(usage.used),
        usage.used_percent(),
        format_size(usage.total)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use teloxide::types::MessageId;

    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * MIB;

    struct FixedQuery(Option<StorageUsage>);

    #[async_trait]
    impl RemoteCapacityQuery for FixedQuery {
        async fn query(&self, backend_id: &str) -> Result<StorageUsage, AppError> {
            self.0
                .ok_or_else(|| AppError::Storage(format!("no answer for {}", backend_id)))
        }
    }

    #[derive(Default)]
    struct Sent(Mutex<Vec<String>>);

    #[async_trait]
    impl ChatTransport for Sent {
        async fn send_message(&self, _chat_id: ChatId, text: &str) -> Result<MessageId, AppError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(MessageId(1))
        }
        async fn edit_message_text(&self, _: ChatId, _: MessageId, _: &str) -> Result<(), AppError> {
            Ok(())
        }
        async fn delete_message(&self, _: ChatId, _: MessageId) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn usage(free: u64) -> StorageUsage {
        StorageUsage {
            total: 10 * GIB,
            used: 10 * GIB - free,
            free,
        }
    }

    #[test]
    fn test_is_low_threshold() {
        assert!(is_low(&usage(500 * MIB), GIB));
        assert!(!is_low(&usage(2 * GIB), GIB));
        assert!(is_low(&usage(GIB), GIB));
    }

    #[test]
    fn test_parse_about_reply_full() {
        let parsed = parse_about_reply(r#"{"total": 1000, "used": 400, "free": 600, "trashed": 0}"#).unwrap();
        assert_eq!(
            parsed,
            StorageUsage {
                total: 1000,
                used: 400,
                free: 600
            }
        );
    }

    #[test]
    fn test_parse_about_reply_derives_free() {
        let parsed = parse_about_reply(r#"{"total": 1000, "used": 250}"#).unwrap();
        assert_eq!(parsed.free, 750);
    }

    #[test]
    fn test_parse_about_reply_keeps_explicit_zero_free() {
        // Trash counted outside `used` still leaves the remote full
        let parsed = parse_about_reply(r#"{"total": 1000, "used": 600, "free": 0, "trashed": 400}"#).unwrap();
        assert_eq!(parsed.free, 0);
        assert!(CapacityMonitor::new(GIB, Arc::new(FixedQuery(None))).is_low(&parsed));
    }

    #[test]
    fn test_parse_about_reply_rejects_bad_input() {
        assert!(parse_about_reply("Failed to about: not supported").is_err());
        assert!(parse_about_reply(r#"{"other": 5}"#).is_err());
    }

    #[tokio::test]
    async fn test_check_remote_unavailable_is_none() {
        let monitor = CapacityMonitor::new(GIB, Arc::new(FixedQuery(None)));
        assert_eq!(monitor.check("gdrive", Path::new("/tmp")).await, None);
    }

    #[tokio::test]
    async fn test_notify_if_low_sends_one_warning_per_call() {
        let monitor = CapacityMonitor::new(GIB, Arc::new(FixedQuery(None)));
        let sent = Sent::default();

        assert!(!monitor.notify_if_low(&sent, ChatId(1), "gdrive", Some(usage(500 * MIB))).await);
        assert!(!monitor.notify_if_low(&sent, ChatId(1), "gdrive", Some(usage(500 * MIB))).await);
        assert!(monitor.notify_if_low(&sent, ChatId(1), "gdrive", Some(usage(5 * GIB))).await);
        assert!(monitor.notify_if_low(&sent, ChatId(1), "gdrive", None).await);

        let sent = sent.0.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("GDRIVE"));
        assert!(sent[0].contains("gdrive cloud storage"));
        assert!(sent[0].contains("Warning threshold: 1.0 GB"));
    }

    #[test]
    fn test_render_status_markers() {
        let ok = render_status("local", &usage(5 * GIB), GIB);
        assert!(ok.starts_with("✅ LOCAL Storage (OK)"));
        assert!(ok.contains("Free: 5.0 GB (50.0%)"));

        let low = render_status("gdrive", &usage(100 * MIB), GIB);
        assert!(low.starts_with("⚠️ GDRIVE Storage (LOW)"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_check_local_uses_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = CapacityMonitor::new(GIB, Arc::new(FixedQuery(None)));
        let usage = monitor.check("local", dir.path()).await.unwrap();
        assert!(usage.total > 0);
    }
}
