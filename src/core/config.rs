use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the bot.
///
/// Every value is read once from the environment on first access. Components
/// do not touch these statics directly; they take settings structs built by
/// `from_env()` constructors so tests can supply their own values.

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Data root that holds one directory per backend (`local/`, `gdrive/`, ...)
/// Read from LOCAL_STORAGE_DIR environment variable, supports tilde (~) expansion
/// Default: ./data
pub static LOCAL_STORAGE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let raw = env::var("LOCAL_STORAGE_DIR").unwrap_or_else(|_| "./data".to_string());
    expand_path(&raw)
});

/// Shared staging area the extractor writes into before files are relocated
/// Read from SCRATCH_DIR environment variable
/// Default: <system temp>/tubestash-scratch
pub static SCRATCH_DIR: Lazy<PathBuf> = Lazy::new(|| match env::var("SCRATCH_DIR") {
    Ok(raw) => expand_path(&raw),
    Err(_) => env::temp_dir().join("tubestash-scratch"),
});

/// rclone configuration file listing the declared remotes
/// Read from RCLONE_CONFIG_PATH environment variable
pub static RCLONE_CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    let raw = env::var("RCLONE_CONFIG_PATH").unwrap_or_else(|_| "/home/bot/rclone-config/rclone.conf".to_string());
    expand_path(&raw)
});

/// rclone binary used for remote capacity queries
/// Read from RCLONE_BIN environment variable or defaults to "rclone"
pub static RCLONE_BIN: Lazy<String> = Lazy::new(|| env::var("RCLONE_BIN").unwrap_or_else(|_| "rclone".to_string()));

/// Backend used without asking when it is live
/// Read from DEFAULT_STORAGE_BACKEND environment variable
pub static DEFAULT_STORAGE_BACKEND: Lazy<Option<String>> = Lazy::new(|| non_empty_var("DEFAULT_STORAGE_BACKEND"));

/// Output container chosen without asking ("audio"/"mp3" or "video"/"mp4")
/// Read from DEFAULT_OUTPUT_FORMAT environment variable
pub static DEFAULT_OUTPUT_FORMAT: Lazy<Option<String>> = Lazy::new(|| non_empty_var("DEFAULT_OUTPUT_FORMAT"));

/// Free-space warning threshold in bytes
/// Read from STORAGE_WARNING_THRESHOLD_GB environment variable (whole gigabytes)
pub static STORAGE_WARNING_THRESHOLD_BYTES: Lazy<u64> = Lazy::new(|| {
    env_u64("STORAGE_WARNING_THRESHOLD_GB", capacity::DEFAULT_WARNING_THRESHOLD_GB) * 1024 * 1024 * 1024
});

/// Shared log file written by the upload sidecar
/// Read from UPLOAD_LOG_PATH environment variable
pub static UPLOAD_LOG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    let raw = env::var("UPLOAD_LOG_PATH").unwrap_or_else(|_| "/logs/rclone-upload.log".to_string());
    expand_path(&raw)
});

/// Whether remote transfers are followed through the upload log
/// Read from UPLOAD_MONITORING environment variable ("0", "false", "off" disable it)
pub static UPLOAD_MONITORING: Lazy<bool> = Lazy::new(|| {
    env::var("UPLOAD_MONITORING")
        .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "off" | "no"))
        .unwrap_or(true)
});

/// Upload watch timeout in seconds
/// Read from UPLOAD_TIMEOUT_SECS environment variable
pub static UPLOAD_TIMEOUT_SECS: Lazy<u64> =
    Lazy::new(|| env_u64("UPLOAD_TIMEOUT_SECS", upload::DEFAULT_TIMEOUT_SECS));

/// Extraction timeout in seconds, 0 disables it
/// Read from EXTRACT_TIMEOUT_SECS environment variable
pub static EXTRACT_TIMEOUT_SECS: Lazy<u64> =
    Lazy::new(|| env_u64("EXTRACT_TIMEOUT_SECS", download::DEFAULT_EXTRACT_TIMEOUT_SECS));

/// Sidecar liveness configuration
pub mod liveness {
    use super::Duration;

    /// Marker file refreshed by the sync sidecar inside each backend directory
    pub const HEARTBEAT_FILE: &str = ".heartbeat";

    /// Maximum heartbeat age for a remote to count as live (in seconds)
    pub const WINDOW_SECS: u64 = 30;

    /// Liveness window duration
    pub fn window() -> Duration {
        Duration::from_secs(WINDOW_SECS)
    }
}

/// Capacity monitoring configuration
pub mod capacity {
    use super::Duration;

    /// Default free-space warning threshold (in gigabytes)
    pub const DEFAULT_WARNING_THRESHOLD_GB: u64 = 1;

    /// Timeout for the remote capacity query (in seconds)
    pub const QUERY_TIMEOUT_SECS: u64 = 30;

    /// Timeout for the local `df` query (in seconds)
    pub const LOCAL_QUERY_TIMEOUT_SECS: u64 = 10;

    /// Remote capacity query timeout duration
    pub fn query_timeout() -> Duration {
        Duration::from_secs(QUERY_TIMEOUT_SECS)
    }

    /// Local capacity query timeout duration
    pub fn local_query_timeout() -> Duration {
        Duration::from_secs(LOCAL_QUERY_TIMEOUT_SECS)
    }
}

/// Status-message throttling configuration
pub mod progress {
    use super::Duration;

    /// Download phase: minimum percent change between edits
    pub const DOWNLOAD_MIN_DELTA: f64 = 5.0;

    /// Download phase: minimum time between edits (in milliseconds)
    pub const DOWNLOAD_MIN_INTERVAL_MS: u64 = 2000;

    /// Upload phase, percent-only lines: minimum percent change between edits
    pub const UPLOAD_MIN_DELTA: f64 = 10.0;

    /// Upload phase, percent-only lines: minimum time between edits (in seconds)
    pub const UPLOAD_MIN_INTERVAL_SECS: u64 = 5;

    /// Upload phase, lines with speed/ETA: minimum percent change between edits
    pub const UPLOAD_DETAILED_MIN_DELTA: f64 = 5.0;

    /// Upload phase, lines with speed/ETA: minimum time between edits (in seconds)
    pub const UPLOAD_DETAILED_MIN_INTERVAL_SECS: u64 = 3;

    pub fn download_min_interval() -> Duration {
        Duration::from_millis(DOWNLOAD_MIN_INTERVAL_MS)
    }

    pub fn upload_min_interval() -> Duration {
        Duration::from_secs(UPLOAD_MIN_INTERVAL_SECS)
    }

    pub fn upload_detailed_min_interval() -> Duration {
        Duration::from_secs(UPLOAD_DETAILED_MIN_INTERVAL_SECS)
    }
}

/// Upload log watching configuration
pub mod upload {
    use super::Duration;

    /// Interval between upload log reads (in milliseconds)
    pub const POLL_INTERVAL_MS: u64 = 1000;

    /// How long to wait for the upload log to appear (in seconds)
    pub const LOG_WAIT_SECS: u64 = 30;

    /// Default overall watch timeout (in seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Number of URL characters shown in final upload messages
    pub const URL_PREVIEW_CHARS: usize = 50;

    pub fn poll_interval() -> Duration {
        Duration::from_millis(POLL_INTERVAL_MS)
    }

    pub fn log_wait() -> Duration {
        Duration::from_secs(LOG_WAIT_SECS)
    }
}

/// Download configuration
pub mod download {
    /// Default extraction timeout (in seconds)
    pub const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 3600;

    /// Container extension forced for audio output
    pub const AUDIO_EXTENSION: &str = "mp3";

    /// Audio quality passed to the extractor's transcoder
    pub const AUDIO_QUALITY: &str = "192K";

    /// Maximum characters of raw error text shown to users
    pub const ERROR_PREVIEW_CHARS: usize = 300;

    /// Format selector sentinel meaning "let the extractor pick"
    pub const BEST_FORMAT: &str = "best";
}

/// Selection dialog configuration
pub mod dialog {
    use super::Duration;

    /// How long an unanswered selection dialog is kept (in seconds)
    pub const PENDING_TTL_SECS: u64 = 3600;

    pub fn pending_ttl() -> Duration {
        Duration::from_secs(PENDING_TTL_SECS)
    }
}

/// Dispatcher restart configuration
pub mod retry {
    use super::Duration;

    /// How many times a crashed dispatcher is restarted
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Base delay before restarting the dispatcher (in seconds)
    pub const DISPATCHER_DELAY_SECS: u64 = 2;

    pub fn dispatcher_delay(attempt: u32) -> Duration {
        Duration::from_secs(DISPATCHER_DELAY_SECS.saturating_mul(1 << attempt.min(5)))
    }
}

/// Expands `~` and returns an owned path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid {}={:?}, using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
