//! Progress normalization and status-edit throttling.

use std::time::{Duration, Instant};

use crate::core::config;

/// Progress event reported by the extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractorEvent {
    /// Transfer in progress. Either byte counts or a percent string may be present.
    Downloading {
        downloaded_bytes: Option<u64>,
        total_bytes: Option<u64>,
        percent_str: Option<String>,
    },
    /// The extractor finished writing the file
    Finished,
}

impl ExtractorEvent {
    pub fn percent(percent: f64) -> Self {
        Self::Downloading {
            downloaded_bytes: None,
            total_bytes: None,
            percent_str: Some(format!("{:.1}%", percent)),
        }
    }

    /// Percentage in `0..=100`, or `None` when the event carries nothing usable.
    ///
    /// Byte counts win over the percent string when both are present.
    pub fn normalized_percent(&self) -> Option<f64> {
        match self {
            Self::Finished => Some(100.0),
            Self::Downloading {
                downloaded_bytes,
                total_bytes,
                percent_str,
            } => {
                if let (Some(done), Some(total)) = (downloaded_bytes, total_bytes) {
                    if *total > 0 {
                        return Some((*done as f64 / *total as f64 * 100.0).clamp(0.0, 100.0));
                    }
                }
                percent_str.as_deref().and_then(parse_percent_str)
            }
        }
    }
}

/// Parses strings like `" 42.3%"` (extractors often pad or colour them).
pub fn parse_percent_str(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(0.0, 100.0))
}

/// Parses a `[download]  42.3% of 10.00MiB at 1.00MiB/s ETA 00:05` line.
pub fn parse_download_line(line: &str) -> Option<ExtractorEvent> {
    let rest = line.trim().strip_prefix("[download]")?.trim_start();
    let token = rest.split_whitespace().next()?;
    if !token.ends_with('%') {
        return None;
    }
    parse_percent_str(token)?;
    Some(ExtractorEvent::Downloading {
        downloaded_bytes: None,
        total_bytes: None,
        percent_str: Some(token.to_string()),
    })
}

/// When a throttled stream of progress values may produce a status edit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottlePolicy {
    pub min_delta: f64,
    pub min_interval: Duration,
}

impl ThrottlePolicy {
    pub fn download() -> Self {
        Self {
            min_delta: config::progress::DOWNLOAD_MIN_DELTA,
            min_interval: config::progress::download_min_interval(),
        }
    }

    /// Upload lines that only carry a percentage.
    pub fn upload() -> Self {
        Self {
            min_delta: config::progress::UPLOAD_MIN_DELTA,
            min_interval: config::progress::upload_min_interval(),
        }
    }

    /// Upload lines that also carry speed/ETA.
    pub fn upload_detailed() -> Self {
        Self {
            min_delta: config::progress::UPLOAD_DETAILED_MIN_DELTA,
            min_interval: config::progress::upload_detailed_min_interval(),
        }
    }
}

/// Throttle state of one logical transfer.
///
/// The reported percentage never goes down: a lower value than the last
/// emitted one is dropped, so a stale update cannot overwrite a newer one.
#[derive(Debug, Clone)]
pub struct ProgressState {
    last_reported_percent: f64,
    last_update: Instant,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            last_reported_percent: 0.0,
            last_update: now,
        }
    }

    pub fn last_reported_percent(&self) -> f64 {
        self.last_reported_percent
    }

    /// Records `percent` and returns whether it should be shown.
    pub fn should_emit(&mut self, percent: f64, now: Instant, policy: ThrottlePolicy) -> bool {
        if percent < self.last_reported_percent {
            return false;
        }
        let delta = percent - self.last_reported_percent;
        let elapsed = now.saturating_duration_since(self.last_update);
        if delta >= policy.min_delta || (elapsed >= policy.min_interval && delta > 0.0) {
            self.mark(percent, now);
            true
        } else {
            false
        }
    }

    /// Final 100% emission on completion, unless 100% was already shown.
    pub fn force_complete(&mut self, now: Instant) -> bool {
        if self.last_reported_percent >= 100.0 {
            return false;
        }
        self.mark(100.0, now);
        true
    }

    fn mark(&mut self, percent: f64, now: Instant) {
        self.last_reported_percent = percent;
        self.last_update = now;
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress bar for status messages: `[█████░░░░░] 50%`
pub fn render_bar(percent: f64) -> String {
    let percent = percent.clamp(0.0, 100.0);
    let filled = (percent / 10.0).floor() as usize;
    format!("[{}{}] {:.0}%", "█".repeat(filled), "░".repeat(10 - filled), percent)
}
