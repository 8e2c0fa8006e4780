//! Handler types and dependencies

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use teloxide::types::{ChatId, MessageId};

use crate::download::extractor::Extractor;
use crate::download::orchestrator::DownloadOrchestrator;
use crate::download::request::RequestIdAllocator;
use crate::storage::capacity::CapacityMonitor;
use crate::storage::registry::BackendRegistry;
use crate::telegram::dialog::PendingSelection;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Open selection dialogs, keyed by their keyboard message
pub type PendingSelections = DashMap<(ChatId, MessageId), PendingSelection>;

/// Stores a new dialog, first dropping dialogs older than `ttl` that were never finished.
pub fn remember_selection(
    pending: &PendingSelections,
    key: (ChatId, MessageId),
    selection: PendingSelection,
    now: Instant,
    ttl: Duration,
) {
    let before = pending.len();
    pending.retain(|_, s| !s.is_expired(now, ttl));
    let evicted = before - pending.len();
    if evicted > 0 {
        log::debug!("Dropped {} abandoned selection dialog(s)", evicted);
    }
    pending.insert(key, selection);
}

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub orchestrator: Arc<DownloadOrchestrator>,
    pub registry: Arc<BackendRegistry>,
    pub capacity: Arc<CapacityMonitor>,
    pub extractor: Arc<dyn Extractor>,
    pub request_ids: Arc<RequestIdAllocator>,
    pub pending: Arc<PendingSelections>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(
        orchestrator: Arc<DownloadOrchestrator>,
        registry: Arc<BackendRegistry>,
        capacity: Arc<CapacityMonitor>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            orchestrator,
            registry,
            capacity,
            extractor,
            request_ids: Arc::new(RequestIdAllocator::new()),
            pending: Arc::new(DashMap::new()),
        }
    }
}
