//! Classification of extractor failures into user-facing categories.
//!
//! The extractor reports failures as free text on stderr. Matching is
//! substring based and best effort; everything unmatched falls into
//! [`ExtractionFailure::Other`], which shows the raw (truncated) text.

use std::fmt;

use crate::core::config;
use crate::core::utils::truncate_chars;

/// Category of an extraction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionFailure {
    /// Private, removed or region-locked media
    Unavailable,
    /// Age gate or sign-in required
    AgeRestricted,
    /// Copyright claim or blocked by the site
    Blocked,
    /// Playlist with no entries
    EmptyPlaylist,
    /// URL not supported or no downloadable formats
    Unsupported,
    /// Network or connection problems
    Network,
    /// Extraction exceeded the configured timeout
    TimedOut,
    /// Anything else
    Other,
}

impl ExtractionFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::AgeRestricted => "age_restricted",
            Self::Blocked => "blocked",
            Self::EmptyPlaylist => "empty_playlist",
            Self::Unsupported => "unsupported",
            Self::Network => "network",
            Self::TimedOut => "timed_out",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps extractor error text to a category.
///
/// Checks run from most to least specific: "sign in to confirm your age"
/// must land in `AgeRestricted`, not in `Unavailable`.
pub fn classify_extraction_error(text: &str) -> ExtractionFailure {
    let lower = text.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if has(&["timed out after", "extraction timeout"]) {
        return ExtractionFailure::TimedOut;
    }
    if has(&[
        "age-restricted",
        "age restricted",
        "confirm your age",
        "inappropriate for some users",
        "sign in to confirm",
        "login required",
        "requires authentication",
    ]) {
        return ExtractionFailure::AgeRestricted;
    }
    if has(&["copyright", "blocked", "not available in your country", "geo restriction"]) {
        return ExtractionFailure::Blocked;
    }
    if has(&[
        "private video",
        "video unavailable",
        "this video is not available",
        "has been removed",
        "does not exist",
        "is unavailable",
        "members-only",
    ]) {
        return ExtractionFailure::Unavailable;
    }
    if has(&["playlist does not have any videos", "empty playlist", "playlist is empty"]) {
        return ExtractionFailure::EmptyPlaylist;
    }
    if has(&["unsupported url", "no video formats", "requested format is not available", "no formats found"]) {
        return ExtractionFailure::Unsupported;
    }
    if has(&[
        "network",
        "connection",
        "timed out",
        "timeout",
        "temporary failure in name resolution",
        "unable to download webpage",
        "http error 5",
    ]) {
        return ExtractionFailure::Network;
    }
    ExtractionFailure::Other
}

/// User-facing text for a classified failure. `Other` includes the raw detail.
pub fn user_message(kind: ExtractionFailure, detail: &str) -> String {
    match kind {
        ExtractionFailure::Unavailable => {
            "❌ The media is unavailable.\n\nIt may be private, removed or restricted in this region.".to_string()
        }
        ExtractionFailure::AgeRestricted => {
            "❌ The media is age-restricted or requires signing in.\n\nIt cannot be downloaded anonymously.".to_string()
        }
        ExtractionFailure::Blocked => "❌ The media is blocked (copyright claim or region block).".to_string(),
        ExtractionFailure::EmptyPlaylist => "❌ The playlist is empty.".to_string(),
        ExtractionFailure::Unsupported => {
            "❌ This URL is not supported or has no downloadable formats.\n\nCheck the link and try again.".to_string()
        }
        ExtractionFailure::Network => "❌ Network problem while downloading.\n\nTry again in a minute.".to_string(),
        ExtractionFailure::TimedOut => "⏰ The download took too long and was stopped.".to_string(),
        ExtractionFailure::Other => format!(
            "❌ Download failed:\n\n{}",
            truncate_chars(detail.trim(), config::download::ERROR_PREVIEW_CHARS)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_categories() {
        let cases = [
            ("ERROR: [youtube] abc: Private video. Sign in if you've been granted access", ExtractionFailure::Unavailable),
            ("ERROR: [youtube] abc: Video unavailable", ExtractionFailure::Unavailable),
            ("ERROR: Sign in to confirm your age. This video may be inappropriate", ExtractionFailure::AgeRestricted),
            ("ERROR: This video contains content from UMG, who has blocked it on copyright grounds", ExtractionFailure::Blocked),
            ("ERROR: [youtube:tab] PL1: The playlist does not have any videos", ExtractionFailure::EmptyPlaylist),
            ("ERROR: Unsupported URL: https://example.com/", ExtractionFailure::Unsupported),
            ("ERROR: Requested format is not available", ExtractionFailure::Unsupported),
            ("ERROR: Unable to download webpage: <urlopen error [Errno -3] Temporary failure in name resolution>", ExtractionFailure::Network),
            ("Process timed out after 3600s", ExtractionFailure::TimedOut),
            ("ERROR: something strange happened", ExtractionFailure::Other),
        ];
        for (text, expected) in cases {
            assert_eq!(classify_extraction_error(text), expected, "text: {}", text);
        }
    }

    #[test]
    fn test_other_message_truncates_detail() {
        let detail = "x".repeat(1000);
        let msg = user_message(ExtractionFailure::Other, &detail);
        assert!(msg.ends_with("..."));
        assert!(msg.chars().count() < 400);
    }

    #[test]
    fn test_specific_message_hides_detail() {
        let msg = user_message(ExtractionFailure::Network, "secret internal path /srv/x");
        assert!(!msg.contains("/srv/x"));
    }
}
