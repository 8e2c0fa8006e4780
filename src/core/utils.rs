/// Truncates a string to at most `max_chars` characters on a char boundary,
/// appending `...` when something was cut.
///
/// # Example
///
/// ```
/// use tubestash::core::utils::truncate_chars;
///
/// assert_eq!(truncate_chars("abcdef", 3), "abc...");
/// assert_eq!(truncate_chars("abc", 3), "abc");
/// ```
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Formats a byte count for humans using binary units (B, KB, MB, GB, TB, PB).
///
/// # Example
///
/// ```
/// use tubestash::core::utils::format_size;
///
/// assert_eq!(format_size(1536), "1.5 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} PB", size)
}

#[cfg(test)]
mod tests {
    use super::{format_size, truncate_chars};

    #[test]
    fn test_truncate_chars_respects_utf8() {
        assert_eq!(truncate_chars("привет мир", 6), "привет...");
        assert_eq!(truncate_chars("", 5), "");
        assert_eq!(truncate_chars("exact", 5), "exact");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
        assert_eq!(format_size(1024u64.pow(5) * 2), "2.0 PB");
    }
}
