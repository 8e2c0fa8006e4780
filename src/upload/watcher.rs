//! Follows one remote upload through the sidecar's shared log.
//!
//! The watcher waits for the log file to exist, then polls it once per tick
//! for lines appended after its byte offset. Only complete lines mentioning
//! the watched file are considered. It ends on a success or failure marker,
//! when the log never shows up, on timeout, or when cancelled.
//!
//! Losing sight of the upload (no log, timeout, bot shutdown) is reported as
//! unknown and never as a failure: the sidecar may well still be uploading.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use teloxide::types::MessageId;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::download::progress::{ProgressState, ThrottlePolicy};
use crate::telegram::messages::{self, TransferSummary, UploadNote};
use crate::telegram::status::StatusMessage;
use crate::upload::log_line::{parse_line, UploadLogEvent};

/// Timings and location of the upload log.
#[derive(Debug, Clone)]
pub struct UploadWatchConfig {
    pub log_path: PathBuf,
    pub poll_interval: Duration,
    /// How long to wait for the log file to appear
    pub log_wait: Duration,
    /// Overall watch limit, counted from the start of the watch
    pub timeout: Duration,
}

impl UploadWatchConfig {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            poll_interval: config::upload::poll_interval(),
            log_wait: config::upload::log_wait(),
            timeout: Duration::from_secs(config::upload::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Self {
        Self {
            timeout: Duration::from_secs(*config::UPLOAD_TIMEOUT_SECS),
            ..Self::new(config::UPLOAD_LOG_PATH.clone())
        }
    }
}

/// Why the upload result is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownReason {
    LogMissing,
    Timeout,
    /// The bot shut down while watching
    Stopped,
}

/// Terminal state of one watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Failed,
    Unknown(UnknownReason),
    /// Stopped from outside (superseded or explicit stop); no terminal message is written
    Cancelled,
}

/// What is being watched and how to report it.
#[derive(Debug, Clone)]
pub struct UploadWatchTarget {
    pub summary: TransferSummary,
    /// User message deleted once the watch ends (unless cancelled)
    pub origin_message_id: Option<MessageId>,
    /// Log length captured before the file was moved; reading starts here
    pub log_offset: u64,
}

/// Length of the upload log right now, 0 if it does not exist.
pub async fn current_log_offset(log_path: &Path) -> u64 {
    tokio::fs::metadata(log_path).await.map(|m| m.len()).unwrap_or(0)
}

/// Watches until a terminal state, writes the final status edit and returns the outcome.
///
/// `cancel` stops this watch silently. When `shutdown` is cancelled as well the
/// watch ends as [`UnknownReason::Stopped`] and still writes its terminal message.
pub async fn watch_upload(
    config: &UploadWatchConfig,
    target: &UploadWatchTarget,
    status: &StatusMessage,
    cancel: &CancellationToken,
    shutdown: &CancellationToken,
) -> UploadOutcome {
    let file_name = &target.summary.file_name;
    log::info!("Started upload progress monitoring for {}", file_name);

    let outcome = match follow_log(config, target, status, cancel).await {
        UploadOutcome::Cancelled if shutdown.is_cancelled() => UploadOutcome::Unknown(UnknownReason::Stopped),
        other => other,
    };

    let final_text = match outcome {
        UploadOutcome::Uploaded => {
            log::info!("Upload completed for {}", file_name);
            Some(messages::download_succeeded(&target.summary, UploadNote::Uploaded))
        }
        UploadOutcome::Failed => {
            log::error!("Upload failed for {}", file_name);
            Some(messages::upload_failed(&target.summary))
        }
        UploadOutcome::Unknown(reason) => {
            log::warn!("Upload monitoring for {} ended without result: {:?}", file_name, reason);
            Some(messages::upload_monitoring_unavailable(&target.summary, reason))
        }
        UploadOutcome::Cancelled => {
            log::info!("Stopped upload progress monitoring for {}", file_name);
            None
        }
    };

    if let Some(text) = final_text {
        let written = if outcome == UploadOutcome::Unknown(UnknownReason::Stopped) {
            status.edit(&text).await;
            true
        } else {
            !edit_or_cancel(status, &text, cancel).await
        };
        if written {
            status.delete_origin(target.origin_message_id).await;
        }
    }
    outcome
}

async fn follow_log(
    config: &UploadWatchConfig,
    target: &UploadWatchTarget,
    status: &StatusMessage,
    cancel: &CancellationToken,
) -> UploadOutcome {
    let started = Instant::now();
    let deadline = started + config.timeout;
    let file_name = target.summary.file_name.as_str();

    while !tokio::fs::try_exists(&config.log_path).await.unwrap_or(false) {
        if started.elapsed() >= config.log_wait {
            log::warn!(
                "Log file {} not found after {:?}",
                config.log_path.display(),
                config.log_wait
            );
            return UploadOutcome::Unknown(UnknownReason::LogMissing);
        }
        if sleep_or_cancel(config.poll_interval, cancel).await {
            return UploadOutcome::Cancelled;
        }
    }
    log::debug!("Monitoring log file: {}", config.log_path.display());

    let mut tail = LogTail::new(config.log_path.clone(), target.log_offset);
    let mut progress = ProgressState::new();
    let mut announced = false;

    loop {
        match tail.read_lines().await {
            Ok(lines) => {
                for line in lines {
                    match parse_line(&line, file_name) {
                        Some(UploadLogEvent::Started) => {
                            if !announced {
                                announced = true;
                                log::info!("Upload started for {}", file_name);
                                let text = messages::upload_started(&target.summary.backend_id);
                                if edit_or_cancel(status, &text, cancel).await {
                                    return UploadOutcome::Cancelled;
                                }
                            }
                        }
                        Some(UploadLogEvent::Completed) => return UploadOutcome::Uploaded,
                        Some(UploadLogEvent::Failed) => return UploadOutcome::Failed,
                        Some(UploadLogEvent::Progress(p)) => {
                            let policy = if p.is_detailed() {
                                ThrottlePolicy::upload_detailed()
                            } else {
                                ThrottlePolicy::upload()
                            };
                            if progress.should_emit(p.percent, Instant::now(), policy) {
                                let text = messages::upload_progress(&target.summary.backend_id, &p);
                                if edit_or_cancel(status, &text, cancel).await {
                                    return UploadOutcome::Cancelled;
                                }
                            }
                        }
                        None => {}
                    }
                }
            }
            Err(e) => log::error!("Error monitoring upload progress: {}", e),
        }

        if Instant::now() >= deadline {
            log::warn!("Upload monitoring timeout for {}", file_name);
            return UploadOutcome::Unknown(UnknownReason::Timeout);
        }
        if sleep_or_cancel(config.poll_interval, cancel).await {
            return UploadOutcome::Cancelled;
        }
    }
}

/// Edits the status message unless cancelled first; returns true if cancelled.
/// A rate-limited edit may wait for seconds, so it must not delay a stop.
async fn edit_or_cancel(status: &StatusMessage, text: &str, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = status.edit(text) => false,
    }
}

/// Sleeps one tick; returns true if cancelled meanwhile.
async fn sleep_or_cancel(interval: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(interval) => false,
    }
}

/// Incremental reader over an append-only log.
struct LogTail {
    path: PathBuf,
    offset: u64,
    partial: String,
}

impl LogTail {
    fn new(path: PathBuf, offset: u64) -> Self {
        Self {
            path,
            offset,
            partial: String::new(),
        }
    }

    /// Complete lines appended since the last call.
    async fn read_lines(&mut self) -> std::io::Result<Vec<String>> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();
        if len < self.offset {
            log::info!("{} was truncated, reading from the start", self.path.display());
            self.offset = 0;
            self.partial.clear();
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut buf = Vec::with_capacity((len - self.offset) as usize);
        let read = file.read_to_end(&mut buf).await?;
        self.offset += read as u64;
        self.partial.push_str(&String::from_utf8_lossy(&buf));

        let Some(last_newline) = self.partial.rfind('\n') else {
            return Ok(Vec::new());
        };
        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        Ok(complete.lines().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_log_tail_returns_only_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.log");
        std::fs::write(&path, "old line\n").unwrap();
        let offset = current_log_offset(&path).await;

        let mut tail = LogTail::new(path.clone(), offset);
        assert!(tail.read_lines().await.unwrap().is_empty());

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        write!(f, "first\nsecond par").unwrap();
        assert_eq!(tail.read_lines().await.unwrap(), vec!["first"]);

        writeln!(f, "t").unwrap();
        assert_eq!(tail.read_lines().await.unwrap(), vec!["second part"]);
    }

    #[tokio::test]
    async fn test_log_tail_restarts_after_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.log");
        std::fs::write(&path, "a long line that will disappear\n").unwrap();
        let mut tail = LogTail::new(path.clone(), current_log_offset(&path).await);

        std::fs::write(&path, "new\n").unwrap();
        assert_eq!(tail.read_lines().await.unwrap(), vec!["new"]);
    }

    #[tokio::test]
    async fn test_current_log_offset_missing_file() {
        assert_eq!(current_log_offset(Path::new("/nonexistent/upload.log")).await, 0);
    }

    #[test]
    fn test_config_defaults() {
        let config = UploadWatchConfig::new("/logs/rclone-upload.log");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.log_wait, Duration::from_secs(30));
        assert_eq!(config.timeout, Duration::from_secs(300));
    }
}
