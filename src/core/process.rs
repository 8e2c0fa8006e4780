//! Process execution utilities with timeout support
//!
//! Provides helpers for running external processes (df, rclone, yt-dlp)
//! with configurable timeouts so a hung process never blocks the pipeline.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::core::error::AppError;

/// Run an async Command with a timeout.
///
/// The child is killed when the timeout elapses (`kill_on_drop`).
/// Returns the process Output on success, or an AppError on timeout/IO failure.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, AppError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(AppError::Io(e)),
        Err(_) => Err(AppError::Download(format!(
            "Process timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_with_timeout_collects_output() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello"]);
        let output = run_with_timeout(&mut cmd, Duration::from_secs(5)).await.unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_with_timeout_expires() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        let result = run_with_timeout(&mut cmd, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(AppError::Download(msg)) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_run_with_timeout_missing_binary() {
        let mut cmd = Command::new("definitely-not-a-real-binary-4242");
        let result = run_with_timeout(&mut cmd, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
