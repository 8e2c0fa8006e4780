use thiserror::Error;

/// Centralized error types for the application
///
/// Errors that cross module boundaries are converted to this enum. Per-request
/// failures inside the download pipeline never escape as `AppError`: the
/// orchestrator turns them into a terminal status edit instead.
///
/// # Example
///
/// ```no_run
/// use tubestash::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Chat transport errors that did not come from the Bot API itself
    #[error("Transport error: {0}")]
    Transport(String),

    /// Download/yt-dlp errors
    #[error("Download error: {0}")]
    Download(String),

    /// Storage backend errors (paths, capacity queries)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Download(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Download(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_converts_to_download_error() {
        let err: AppError = "yt-dlp exited with code 1".into();
        assert!(matches!(err, AppError::Download(_)));
        assert_eq!(err.to_string(), "Download error: yt-dlp exited with code 1");
    }

    #[test]
    fn test_io_error_display() {
        let err = AppError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.to_string(), "IO error: gone");
    }
}
