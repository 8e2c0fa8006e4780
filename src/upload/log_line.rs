//! Lines of the shared upload log written by the sync sidecar.
//!
//! Shapes recognised, each only when the line mentions the watched file:
//! - `📤 Uploading: <file>` start marker
//! - `✅ Upload completed: <file>` success marker
//! - `❌ Upload failed: <file>` failure marker
//! - `Transferred: 1.2 MiB / 5.6 MiB, 21%, 500 KiB/s, ETA 30s` progress (speed and ETA optional)

use once_cell::sync::Lazy;
use regex::Regex;

pub const START_MARKER: &str = "📤 Uploading:";
pub const SUCCESS_MARKER: &str = "✅ Upload completed";
pub const FAILURE_MARKER: &str = "❌ Upload failed";

static DETAILED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Transferred:\s*([^,/]+?)\s*/\s*([^,]+?),\s*(\d+(?:\.\d+)?)%(.*)$").expect("detailed progress regex")
});
static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Transferred:.*?(\d+(?:\.\d+)?)%").expect("percent progress regex"));

/// Progress reported by one `Transferred:` line.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    pub percent: f64,
    pub transferred: Option<String>,
    pub total: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

impl TransferProgress {
    /// Lines with speed or ETA are throttled less aggressively.
    pub fn is_detailed(&self) -> bool {
        self.speed.is_some() || self.eta.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadLogEvent {
    Started,
    Completed,
    Failed,
    Progress(TransferProgress),
}

/// Interprets one log line for `filename`; unrelated lines yield `None`.
pub fn parse_line(line: &str, filename: &str) -> Option<UploadLogEvent> {
    let line = line.trim();
    if line.is_empty() || !line.contains(filename) {
        return None;
    }
    if line.contains(START_MARKER) {
        return Some(UploadLogEvent::Started);
    }
    if line.contains(SUCCESS_MARKER) {
        return Some(UploadLogEvent::Completed);
    }
    if line.contains(FAILURE_MARKER) {
        return Some(UploadLogEvent::Failed);
    }
    parse_progress(line).map(UploadLogEvent::Progress)
}

/// Parses the `Transferred:` part of a line.
pub fn parse_progress(line: &str) -> Option<TransferProgress> {
    if let Some(caps) = DETAILED_RE.captures(line) {
        let percent = caps[3].parse::<f64>().ok()?;
        let mut speed = None;
        let mut eta = None;
        for piece in caps[4].split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(rest) = piece.strip_prefix("ETA") {
                let rest = rest.trim();
                if !rest.is_empty() && rest != "-" {
                    eta = Some(rest.to_string());
                }
            } else if speed.is_none() {
                speed = Some(piece.to_string());
            }
        }
        return Some(TransferProgress {
            percent: percent.clamp(0.0, 100.0),
            transferred: Some(caps[1].trim().to_string()),
            total: Some(caps[2].trim().to_string()),
            speed,
            eta,
        });
    }

    let caps = PERCENT_RE.captures(line)?;
    let percent = caps[1].parse::<f64>().ok()?;
    Some(TransferProgress {
        percent: percent.clamp(0.0, 100.0),
        transferred: None,
        total: None,
        speed: None,
        eta: None,
    })
}
