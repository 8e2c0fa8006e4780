//! Storage backend discovery and routing.
//!
//! A backend is either the built-in local directory or a remote that an
//! external rclone sidecar keeps in sync with `<data_root>/<id>`. Remotes come
//! from two sources:
//! - the rclone config file (every `[section]` is a declared remote)
//! - heartbeat markers (`<data_root>/<id>/.heartbeat`) written by running sidecars
//!
//! A remote is only offered while its heartbeat is fresh, so a configured but
//! crashed sidecar is never a destination. Descriptors are recomputed on every
//! query and never cached.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::config;
use crate::core::error::AppError;

/// Identifier of the built-in local backend
pub const LOCAL_BACKEND: &str = "local";

/// Longest accepted backend id. Ids travel in 64-byte callback data behind a 3-byte prefix.
pub const MAX_BACKEND_ID_LEN: usize = 61;

static BACKEND_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^[A-Za-z0-9_-]{{1,{}}}$", MAX_BACKEND_ID_LEN)).expect("backend id regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

/// A storage destination as seen at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub id: String,
    pub display_name: String,
    pub kind: BackendKind,
    pub root_path: PathBuf,
    /// Always true for local; for remotes, whether the heartbeat is fresh
    pub is_live: bool,
}

impl BackendDescriptor {
    pub fn is_remote(&self) -> bool {
        self.kind == BackendKind::Remote
    }
}

/// Settings for [`BackendRegistry`].
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Root holding one directory per backend
    pub data_root: PathBuf,
    /// rclone config listing declared remotes (None disables static discovery)
    pub rclone_config_path: Option<PathBuf>,
    /// Backend used without prompting when it is live
    pub default_backend: Option<String>,
    /// Maximum heartbeat age for a remote to count as live
    pub liveness_window: Duration,
}

impl StorageSettings {
    /// Settings with defaults for everything but the data root.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            rclone_config_path: None,
            default_backend: None,
            liveness_window: config::liveness::window(),
        }
    }

    pub fn from_env() -> Self {
        Self {
            data_root: config::LOCAL_STORAGE_DIR.clone(),
            rclone_config_path: Some(config::RCLONE_CONFIG_PATH.clone()),
            default_backend: config::DEFAULT_STORAGE_BACKEND.clone(),
            liveness_window: config::liveness::window(),
        }
    }

    pub fn with_rclone_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.rclone_config_path = Some(path.into());
        self
    }

    pub fn with_default_backend(mut self, backend: impl Into<String>) -> Self {
        self.default_backend = Some(backend.into());
        self
    }

    pub fn with_liveness_window(mut self, window: Duration) -> Self {
        self.liveness_window = window;
        self
    }
}

/// Discovers backends, checks their liveness and maps ids to directories.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    settings: StorageSettings,
}

impl BackendRegistry {
    pub fn new(settings: StorageSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    /// Directory for a backend, without touching the filesystem.
    ///
    /// Local resolves to `<root>/local`, every other backend to `<root>/<id>`.
    pub fn storage_path(&self, backend_id: &str) -> Result<PathBuf, AppError> {
        validate_backend_id(backend_id)?;
        Ok(self.settings.data_root.join(backend_id))
    }

    /// Directory for a backend, created if absent. Idempotent.
    pub fn resolve_storage_path(&self, backend_id: &str) -> Result<PathBuf, AppError> {
        let path = self.storage_path(backend_id)?;
        fs_err::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn kind_of(&self, backend_id: &str) -> BackendKind {
        if backend_id == LOCAL_BACKEND {
            BackendKind::Local
        } else {
            BackendKind::Remote
        }
    }

    /// Local is always live; a remote is live iff its heartbeat is fresh right now.
    pub fn is_live(&self, backend_id: &str) -> bool {
        self.is_live_at(backend_id, Utc::now())
    }

    /// Liveness relative to an explicit point in time.
    pub fn is_live_at(&self, backend_id: &str, now: DateTime<Utc>) -> bool {
        if backend_id == LOCAL_BACKEND {
            return true;
        }
        let Ok(dir) = self.storage_path(backend_id) else {
            return false;
        };
        match read_heartbeat(&dir) {
            Some(beat) => {
                let now_secs = now.timestamp_millis() as f64 / 1000.0;
                let age = now_secs - beat;
                age <= self.settings.liveness_window.as_secs_f64()
            }
            None => false,
        }
    }

    /// Remotes listed in the rclone config.
    ///
    /// A missing config yields no remotes; an unreadable one is an error the
    /// caller degrades on.
    pub fn declared_remotes(&self) -> Result<Vec<String>, AppError> {
        let Some(path) = &self.settings.rclone_config_path else {
            return Ok(Vec::new());
        };
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(parse_rclone_sections(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No rclone config at {}, no declared remotes", path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(AppError::Storage(format!(
                "Failed to read rclone config {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Remotes that announced themselves with a heartbeat marker under the data root.
    pub fn discovered_remotes(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.settings.data_root) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        entries
            .filter_map(Result::ok)
            .filter(|e| e.path().join(config::liveness::HEARTBEAT_FILE).is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|id| id != LOCAL_BACKEND && BACKEND_ID_RE.is_match(id))
            .collect()
    }

    /// Every known backend (live or not): local first, then remotes by id.
    ///
    /// An unreadable rclone config degrades to local only.
    pub fn backends(&self) -> Vec<BackendDescriptor> {
        let now = Utc::now();
        let mut result = vec![self.local_descriptor()];

        let declared = match self.declared_remotes() {
            Ok(declared) => declared,
            Err(e) => {
                log::warn!("{}; only local storage available", e);
                return result;
            }
        };

        let remote_ids: BTreeSet<String> = declared
            .into_iter()
            .chain(self.discovered_remotes())
            .filter(|id| id != LOCAL_BACKEND)
            .collect();

        for id in remote_ids {
            let Ok(root_path) = self.storage_path(&id) else {
                log::warn!("Skipping remote with invalid name: {:?}", id);
                continue;
            };
            result.push(BackendDescriptor {
                display_name: remote_display_name(&id),
                is_live: self.is_live_at(&id, now),
                kind: BackendKind::Remote,
                root_path,
                id,
            });
        }
        result
    }

    /// Backends that can receive a download right now.
    pub fn available_backends(&self) -> Vec<BackendDescriptor> {
        self.backends().into_iter().filter(|b| b.is_live).collect()
    }

    /// `backend_id -> display_name` for every available backend. Always contains `local`.
    pub fn list_available(&self) -> BTreeMap<String, String> {
        self.available_backends()
            .into_iter()
            .map(|b| (b.id, b.display_name))
            .collect()
    }

    /// Descriptor for one backend, computed on demand; `None` for invalid ids.
    pub fn descriptor(&self, backend_id: &str) -> Option<BackendDescriptor> {
        if backend_id == LOCAL_BACKEND {
            return Some(self.local_descriptor());
        }
        let root_path = self.storage_path(backend_id).ok()?;
        Some(BackendDescriptor {
            id: backend_id.to_string(),
            display_name: remote_display_name(backend_id),
            kind: BackendKind::Remote,
            root_path,
            is_live: self.is_live(backend_id),
        })
    }

    pub fn display_name(&self, backend_id: &str) -> String {
        if backend_id == LOCAL_BACKEND {
            "Local Storage".to_string()
        } else {
            remote_display_name(backend_id)
        }
    }

    /// The configured default, if it is currently available.
    pub fn default_backend(&self) -> Option<String> {
        let default = self.settings.default_backend.as_deref()?;
        if self.list_available().contains_key(default) {
            Some(default.to_string())
        } else {
            log::warn!("Default backend '{}' not available", default);
            None
        }
    }

    /// Whether the user has to pick a backend.
    ///
    /// No when a live default is configured or when only one backend exists.
    pub fn should_prompt_user(&self) -> bool {
        if self.default_backend().is_some() {
            return false;
        }
        self.list_available().len() > 1
    }

    fn local_descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            id: LOCAL_BACKEND.to_string(),
            display_name: "Local Storage".to_string(),
            kind: BackendKind::Local,
            root_path: self.settings.data_root.join(LOCAL_BACKEND),
            is_live: true,
        }
    }
}

/// Rejects ids that could escape the data root.
pub fn validate_backend_id(backend_id: &str) -> Result<(), AppError> {
    if BACKEND_ID_RE.is_match(backend_id) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid backend id: {:?}", backend_id)))
    }
}

fn remote_display_name(id: &str) -> String {
    format!("Cloud Storage ({})", id)
}

/// Reads the float Unix timestamp from a backend's heartbeat marker.
fn read_heartbeat(dir: &Path) -> Option<f64> {
    let raw = std::fs::read_to_string(dir.join(config::liveness::HEARTBEAT_FILE)).ok()?;
    raw.trim().parse::<f64>().ok().filter(|ts| ts.is_finite())
}

/// Section names of an INI-style rclone config.
fn parse_rclone_sections(content: &str) -> Vec<String> {
    let mut sections = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim();
            if BACKEND_ID_RE.is_match(name) {
                sections.push(name.to_string());
            } else {
                log::warn!("Ignoring rclone remote with unsupported name: {:?}", name);
            }
        }
    }
    sections
}
