//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Storage configuration logging at startup

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the storage configuration at application startup
///
/// Reports the data root, scratch directory, rclone config, default backend,
/// warning threshold and upload monitoring settings, and flags the common
/// misconfigurations (missing rclone config, missing upload log).
pub fn log_storage_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("💾 Storage Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    log::info!("📂 Data root: {}", config::LOCAL_STORAGE_DIR.display());
    log::info!("🗂️  Scratch dir: {}", config::SCRATCH_DIR.display());

    let rclone_config = &*config::RCLONE_CONFIG_PATH;
    if rclone_config.exists() {
        log::info!("✅ rclone config: {}", rclone_config.display());
    } else {
        log::warn!(
            "⚠️  rclone config: {} (not found, only local storage and heartbeat-discovered remotes)",
            rclone_config.display()
        );
    }

    match config::DEFAULT_STORAGE_BACKEND.as_deref() {
        Some(backend) => log::info!("🎯 Default backend: {}", backend),
        None => log::info!("🎯 Default backend: not set (users choose per download)"),
    }

    match config::DEFAULT_OUTPUT_FORMAT.as_deref() {
        Some(format) => log::info!("🎞️  Default output: {}", format),
        None => log::info!("🎞️  Default output: not set (users choose per download)"),
    }

    log::info!(
        "⚠️  Warning threshold: {:.1} GB",
        *config::STORAGE_WARNING_THRESHOLD_BYTES as f64 / (1024.0 * 1024.0 * 1024.0)
    );

    if *config::UPLOAD_MONITORING {
        let log_path = &*config::UPLOAD_LOG_PATH;
        if log_path.exists() {
            log::info!(
                "☁️  Upload monitoring: {} (timeout {}s)",
                log_path.display(),
                *config::UPLOAD_TIMEOUT_SECS
            );
        } else {
            log::warn!(
                "☁️  Upload monitoring: {} does not exist yet, watchers will wait for it",
                log_path.display()
            );
        }
    } else {
        log::info!("☁️  Upload monitoring: disabled");
    }

    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
