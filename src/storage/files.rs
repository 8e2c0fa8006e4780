//! Listing and searching files stored in the backends.

use chrono::{DateTime, Utc};
use std::time::SystemTime;

use crate::storage::registry::BackendRegistry;

/// A media file found in a backend directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub backend_id: String,
    pub name: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

/// Files of every available backend, newest first.
///
/// Only the top level of each backend directory is scanned. Hidden files
/// (heartbeat markers, partial uploads) and subdirectories are skipped.
/// `query` filters by case-insensitive substring of the file name.
pub fn list_files(registry: &BackendRegistry, query: Option<&str>, limit: usize) -> Vec<StoredFile> {
    let needle = query.map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty());
    let mut files = Vec::new();

    for backend in registry.available_backends() {
        let entries = match std::fs::read_dir(&backend.root_path) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("Skipping {}: {}", backend.root_path.display(), e);
                continue;
            }
        };

        for entry in entries.filter_map(Result::ok) {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Some(needle) = &needle {
                if !name.to_lowercase().contains(needle.as_str()) {
                    continue;
                }
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push(StoredFile {
                backend_id: backend.id.clone(),
                name,
                size_bytes: meta.len(),
                modified: DateTime::<Utc>::from(modified),
            });
        }
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
    files.truncate(limit);
    files
}
