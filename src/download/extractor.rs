//! The external extractor/transcoder boundary.
//!
//! [`YtDlpExtractor`] drives the `yt-dlp` binary: it downloads into the
//! scratch directory, transcodes audio to mp3 through ffmpeg, and reports
//! progress parsed from its `[download] NN.N%` lines.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::task::AbortOnDropHandle;

use crate::core::config;
use crate::core::error::AppError;
use crate::core::process::run_with_timeout;
use crate::download::errors::{classify_extraction_error, ExtractionFailure};
use crate::download::progress::{parse_download_line, ExtractorEvent};
use crate::download::request::OutputContainer;

/// Prefix of the line yt-dlp prints with the final path after post-processing.
const FILEPATH_MARKER: &str = "filepath=";

const LIST_FORMATS_TIMEOUT: Duration = Duration::from_secs(60);

/// One extraction to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionJob {
    pub url: String,
    pub format_selector: String,
    pub container: OutputContainer,
    pub scratch_dir: PathBuf,
}

/// The file an extraction produced, still inside the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    pub path: PathBuf,
}

/// A classified extraction failure with the raw extractor text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("extraction failed ({kind}): {detail}")]
pub struct ExtractionError {
    pub kind: ExtractionFailure,
    pub detail: String,
}

impl ExtractionError {
    /// Classifies raw extractor output.
    pub fn from_output(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            kind: classify_extraction_error(&detail),
            detail,
        }
    }

    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            kind: ExtractionFailure::TimedOut,
            detail: format!("Extraction timed out after {}s", timeout.as_secs()),
        }
    }
}

/// A downloadable format offered by the source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormatOption {
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default, rename = "format_note")]
    pub note: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default, alias = "filesize_approx")]
    pub filesize: Option<u64>,
}

impl FormatOption {
    /// Short button label: `137 mp4 1920x1080 30fps (1080p)`
    pub fn label(&self) -> String {
        let mut label = format!("{} {}", self.format_id, self.ext);
        if let (Some(w), Some(h)) = (self.width, self.height) {
            label.push_str(&format!(" {}x{}", w, h));
        }
        if let Some(fps) = self.fps.filter(|f| *f > 0.0) {
            label.push_str(&format!(" {:.0}fps", fps));
        }
        if let Some(note) = self.note.as_deref().filter(|n| !n.is_empty()) {
            label.push_str(&format!(" ({})", note));
        }
        label
    }
}

/// Media extractor used by the pipeline.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Downloads and converts `job`, reporting progress through `progress`.
    async fn extract(
        &self,
        job: &ExtractionJob,
        progress: UnboundedSender<ExtractorEvent>,
    ) -> Result<ExtractedFile, ExtractionError>;

    /// Formats available for a URL, sorted by extension.
    async fn list_formats(&self, url: &str) -> Result<Vec<FormatOption>, AppError>;
}

/// [`Extractor`] backed by the `yt-dlp` binary.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    bin: String,
}

impl YtDlpExtractor {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn from_env() -> Self {
        Self::new(config::YTDL_BIN.clone())
    }
}

/// Command-line arguments for one extraction.
pub fn build_args(job: &ExtractionJob) -> Vec<String> {
    let selector = match (job.format_selector.as_str(), job.container) {
        (config::download::BEST_FORMAT, OutputContainer::Audio) => "bestaudio/best".to_string(),
        (config::download::BEST_FORMAT, OutputContainer::Video) => "bestvideo+bestaudio/best".to_string(),
        (other, _) => other.to_string(),
    };
    let template = job.scratch_dir.join("%(title)s.%(ext)s");

    let mut args = vec![
        "-f".to_string(),
        selector,
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
        "--restrict-filenames".to_string(),
        "--no-playlist".to_string(),
        "--newline".to_string(),
        "--progress".to_string(),
        "--print".to_string(),
        format!("after_move:{}%(filepath)s", FILEPATH_MARKER),
    ];

    if job.container == OutputContainer::Audio {
        args.extend([
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            config::download::AUDIO_EXTENSION.to_string(),
            "--audio-quality".to_string(),
            config::download::AUDIO_QUALITY.to_string(),
        ]);
    } else {
        args.extend(["--merge-output-format".to_string(), "mp4".to_string()]);
    }

    args.push(job.url.clone());
    args
}

/// Parses `yt-dlp -J` output into format options.
pub fn parse_formats(json: &str) -> Result<Vec<FormatOption>, AppError> {
    #[derive(Deserialize)]
    struct Info {
        #[serde(default)]
        formats: Vec<FormatOption>,
    }

    let info: Info = serde_json::from_str(json)?;
    let mut formats = info.formats;
    formats.sort_by(|a, b| a.ext.cmp(&b.ext).then_with(|| a.format_id.cmp(&b.format_id)));
    Ok(formats)
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn extract(
        &self,
        job: &ExtractionJob,
        progress: UnboundedSender<ExtractorEvent>,
    ) -> Result<ExtractedFile, ExtractionError> {
        tokio::fs::create_dir_all(&job.scratch_dir)
            .await
            .map_err(|e| ExtractionError::from_output(format!("Cannot create scratch dir: {}", e)))?;

        let args = build_args(job);
        log::info!("Running {} {}", self.bin, args.join(" "));

        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractionError::from_output(format!("Failed to start {}: {}", self.bin, e)))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(ExtractionError::from_output("Extractor pipes unavailable"));
        };

        // Dies with this future, so a timed-out extraction releases its progress sender
        let stderr_progress = progress.clone();
        let stderr_task = AbortOnDropHandle::new(tokio::spawn(async move {
            let mut collected = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match parse_download_line(&line) {
                    Some(event) => {
                        let _ = stderr_progress.send(event);
                    }
                    None => {
                        collected.push_str(&line);
                        collected.push('\n');
                    }
                }
            }
            collected
        }));

        let mut final_path: Option<PathBuf> = None;
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(path) = line.trim().strip_prefix(FILEPATH_MARKER) {
                        final_path = Some(PathBuf::from(path));
                    } else if let Some(event) = parse_download_line(&line) {
                        let _ = progress.send(event);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Failed to read extractor output: {}", e);
                    break;
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ExtractionError::from_output(format!("Failed to wait for extractor: {}", e)))?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            log::error!("{} exited with {}: {}", self.bin, status, stderr_text.trim());
            let detail = if stderr_text.trim().is_empty() {
                format!("{} exited with {}", self.bin, status)
            } else {
                stderr_text
            };
            return Err(ExtractionError::from_output(detail));
        }

        let Some(path) = final_path else {
            return Err(ExtractionError::from_output(format!(
                "{} finished without reporting an output file",
                self.bin
            )));
        };
        let _ = progress.send(ExtractorEvent::Finished);
        Ok(ExtractedFile { path })
    }

    async fn list_formats(&self, url: &str) -> Result<Vec<FormatOption>, AppError> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("-J").arg("--no-playlist").arg(url);
        let output = run_with_timeout(&mut cmd, LIST_FORMATS_TIMEOUT).await?;
        if !output.status.success() {
            let kind = classify_extraction_error(&String::from_utf8_lossy(&output.stderr));
            return Err(AppError::Download(format!("Could not list formats ({})", kind)));
        }
        parse_formats(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn job(container: OutputContainer, selector: &str) -> ExtractionJob {
        ExtractionJob {
            url: "https://x/1".to_string(),
            format_selector: selector.to_string(),
            container,
            scratch_dir: PathBuf::from("/scratch"),
        }
    }

    #[test]
    fn test_build_args_audio_best() {
        let args = build_args(&job(OutputContainer::Audio, "best"));
        assert_eq!(args[0..4].to_vec(), vec!["-f", "bestaudio/best", "-o", "/scratch/%(title)s.%(ext)s"]);
        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&"192K".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://x/1"));
    }

    #[test]
    fn test_build_args_video_concrete_format() {
        let args = build_args(&job(OutputContainer::Video, "137+140"));
        assert_eq!(args[1], "137+140");
        assert!(!args.contains(&"--extract-audio".to_string()));
    }

    #[test]
    fn test_parse_formats_sorted_by_extension() {
        let json = r#"{
            "title": "x",
            "formats": [
                {"format_id": "251", "ext": "webm", "format_note": "medium", "filesize": 3000},
                {"format_id": "140", "ext": "m4a", "filesize_approx": 2000},
                {"format_id": "137", "ext": "mp4", "width": 1920, "height": 1080, "fps": 30.0}
            ]
        }"#;
        let formats = parse_formats(json).unwrap();
        let ids: Vec<_> = formats.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, vec!["140", "137", "251"]);
        assert_eq!(formats[0].filesize, Some(2000));
        assert_eq!(formats[1].label(), "137 mp4 1920x1080 30fps");
        assert_eq!(formats[2].label(), "251 webm (medium)");
    }

    #[test]
    fn test_extraction_error_classified() {
        let err = ExtractionError::from_output("ERROR: Unsupported URL: https://x");
        assert_eq!(err.kind, ExtractionFailure::Unsupported);
        assert_eq!(ExtractionError::timed_out(Duration::from_secs(5)).kind, ExtractionFailure::TimedOut);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_extract_missing_binary_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = YtDlpExtractor::new("/nonexistent/yt-dlp");
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut job = job(OutputContainer::Audio, "best");
        job.scratch_dir = dir.path().to_path_buf();
        let err = extractor.extract(&job, tx).await.unwrap_err();
        assert!(err.detail.contains("Failed to start"));
    }
}
