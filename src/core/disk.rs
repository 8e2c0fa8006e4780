//! Filesystem space queries
//!
//! Reads total/used/free bytes for a local path through `df`, which works the
//! same on Linux and macOS and needs no platform-specific syscalls.

use crate::core::config;
use crate::core::error::AppError;
use crate::core::process::run_with_timeout;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Raw result of a `df` query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSpaceInfo {
    /// Total space in bytes
    pub total_bytes: u64,
    /// Used space in bytes
    pub used_bytes: u64,
    /// Available space in bytes
    pub available_bytes: u64,
    /// Path that was checked
    pub path: PathBuf,
}

/// Get disk space information for a path using df command
///
/// If the path does not exist yet, its closest existing ancestor is queried.
pub async fn get_disk_space(path: &Path) -> Result<DiskSpaceInfo, AppError> {
    let check_path = existing_ancestor(path);

    let mut cmd = Command::new("df");
    cmd.arg("-k").arg(&check_path); // -k for 1K blocks
    let output = run_with_timeout(&mut cmd, config::capacity::local_query_timeout()).await?;

    if !output.status.success() {
        return Err(AppError::Storage(format!(
            "df command failed for {}: {}",
            check_path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_df_output(&stdout, check_path)
}

/// Parses `df -k` output: header line, then
/// `Filesystem 1K-blocks Used Available Use% Mounted`.
///
/// Long device names make df wrap the data row onto two lines, so the numeric
/// columns are taken from the joined tail of the output.
pub fn parse_df_output(stdout: &str, path: PathBuf) -> Result<DiskSpaceInfo, AppError> {
    let data: Vec<&str> = stdout.lines().skip(1).flat_map(|l| l.split_whitespace()).collect();
    if data.len() < 4 {
        return Err(AppError::Storage("Unexpected df output format".to_string()));
    }

    let parse = |s: &str, what: &str| -> Result<u64, AppError> {
        s.parse::<u64>()
            .map_err(|_| AppError::Storage(format!("Failed to parse {} from df output", what)))
    };

    let total_kb = parse(data[1], "total blocks")?;
    let used_kb = parse(data[2], "used blocks")?;
    let available_kb = parse(data[3], "available blocks")?;

    Ok(DiskSpaceInfo {
        total_bytes: total_kb * 1024,
        used_bytes: used_kb * 1024,
        available_bytes: available_kb * 1024,
        path,
    })
}

fn existing_ancestor(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(if path.is_absolute() { "/" } else { "." }))
}
