//! Texts written into status messages.
//!
//! All texts are plain (no parse mode): file names and URLs are shown as-is
//! and never need escaping.

use std::path::{Path, PathBuf};

use crate::core::config;
use crate::core::utils::truncate_chars;
use crate::download::progress::render_bar;
use crate::download::request::OutputContainer;
use crate::upload::log_line::TransferProgress;
use crate::upload::watcher::UnknownReason;

/// Fields identifying a finished download in every terminal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub file_name: String,
    pub container: OutputContainer,
    pub backend_id: String,
    pub backend_display_name: String,
    pub final_path: PathBuf,
    pub source_url: String,
}

impl TransferSummary {
    pub fn final_dir(&self) -> &Path {
        self.final_path.parent().unwrap_or(&self.final_path)
    }

    fn header_fields(&self) -> String {
        format!(
            "📁 File: {}\n🎵 Format: {}\n💾 Backend: {}\n📂 Location: {}/",
            self.file_name,
            self.container.label(),
            self.backend_display_name,
            self.final_dir().display()
        )
    }

    fn url_line(&self) -> String {
        format!(
            "🔗 URL: {}",
            truncate_chars(&self.source_url, config::upload::URL_PREVIEW_CHARS)
        )
    }
}

/// How the upload phase ended, as far as the final message is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadNote {
    /// Local backend, nothing to upload
    None,
    /// Remote backend without log monitoring
    WillSync,
    /// Upload confirmed by the sidecar log
    Uploaded,
}

pub fn starting(url: &str) -> String {
    format!("⏳ Starting download...\n🔗 {}", truncate_chars(url, config::upload::URL_PREVIEW_CHARS))
}

pub fn downloading(percent: f64) -> String {
    format!("⬇️ Downloading...\n{}", render_bar(percent))
}

pub fn relocating(backend_display_name: &str) -> String {
    format!("📦 Moving file to {}...", backend_display_name)
}

pub fn waiting_for_upload(backend_display_name: &str) -> String {
    format!("☁️ Waiting for upload to {}...", backend_display_name)
}

pub fn upload_started(backend_id: &str) -> String {
    format!("☁️ Starting upload to {}...", backend_id)
}

pub fn upload_progress(backend_id: &str, progress: &TransferProgress) -> String {
    let mut text = format!("☁️ Uploading to {}... {:.0}%", backend_id, progress.percent);
    if let (Some(done), Some(total)) = (&progress.transferred, &progress.total) {
        text.push_str(&format!("\n📊 {} / {}", done, total));
        if let Some(speed) = &progress.speed {
            text.push_str(&format!(" • {}", speed));
        }
        if let Some(eta) = &progress.eta {
            text.push_str(&format!(" • ETA {}", eta));
        }
    }
    text
}

/// Final message of a successful request.
pub fn download_succeeded(summary: &TransferSummary, note: UploadNote) -> String {
    let mut text = format!("✅ Download completed!\n\n{}\n", summary.header_fields());
    match note {
        UploadNote::None => {}
        UploadNote::WillSync => text.push_str(&format!(
            "☁️ Upload: will sync to {} automatically\n",
            summary.backend_id
        )),
        UploadNote::Uploaded => text.push_str(&format!(
            "☁️ Upload: ✅ Uploaded to {} successfully\n",
            summary.backend_id
        )),
    }
    text.push_str(&summary.url_line());
    text
}

pub fn upload_failed(summary: &TransferSummary) -> String {
    format!(
        "❌ Upload failed!\n\n{}\n☁️ Upload failed to {}\n\n\
         The file was downloaded successfully but could not be uploaded to cloud storage.\n{}",
        summary.header_fields(),
        summary.backend_id,
        summary.url_line()
    )
}

/// Observability was lost; says nothing about whether the upload worked.
pub fn upload_monitoring_unavailable(summary: &TransferSummary, reason: UnknownReason) -> String {
    let headline = match reason {
        UnknownReason::Timeout => "⏰ Upload monitoring timeout",
        UnknownReason::LogMissing => "⚠️ Upload monitoring unavailable",
        UnknownReason::Stopped => "⏹️ Upload monitoring stopped",
    };
    format!(
        "{}\n\n✅ Download completed, upload status unknown.\n\n{}\n\
         ☁️ The file will still be synced to {} if the sync service is running.\n{}",
        headline,
        summary.header_fields(),
        summary.backend_id,
        summary.url_line()
    )
}

pub fn relocation_failed(source: &Path, target: &Path, error: &str) -> String {
    format!(
        "❌ Could not move the downloaded file.\n\nFrom: {}\nTo: {}\nError: {}",
        source.display(),
        target.display(),
        truncate_chars(error, config::download::ERROR_PREVIEW_CHARS)
    )
}
