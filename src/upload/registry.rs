//! One background upload watcher per status message.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use teloxide::types::{ChatId, MessageId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::telegram::status::StatusMessage;
use crate::upload::watcher::{watch_upload, UploadOutcome, UploadWatchConfig, UploadWatchTarget};

type WatchKey = (ChatId, MessageId);

struct ActiveWatch {
    generation: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ActiveWatch {
    /// Cancels the watch and waits until its task has exited.
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            log::error!("Upload watcher task failed: {}", e);
        }
    }
}

/// Handle to a running watch, resolving to its outcome.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    outcome: watch::Receiver<Option<UploadOutcome>>,
}

impl UploadTicket {
    /// Waits for the watch to finish. `None` if the task died without reporting.
    pub async fn outcome(mut self) -> Option<UploadOutcome> {
        let waited = self.outcome.wait_for(Option::is_some).await.map(|value| *value);
        match waited {
            Ok(value) => value,
            Err(_) => *self.outcome.borrow(),
        }
    }

    /// Outcome if the watch already finished.
    pub fn try_outcome(&self) -> Option<UploadOutcome> {
        *self.outcome.borrow()
    }
}

/// Tracks active watchers keyed by status message.
///
/// Every watch token is a child of one registry-wide shutdown token, so
/// [`stop_all`](Self::stop_all) can tell a shutdown apart from a supersede.
#[derive(Clone, Default)]
pub struct UploadWatchRegistry {
    active: Arc<DashMap<WatchKey, ActiveWatch>>,
    generations: Arc<AtomicU64>,
    shutdown: CancellationToken,
}

impl UploadWatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a watcher for `status`, first stopping and awaiting any watcher
    /// already attached to the same message.
    pub async fn start(
        &self,
        config: UploadWatchConfig,
        target: UploadWatchTarget,
        status: StatusMessage,
    ) -> UploadTicket {
        let key = status.key();
        if let Some((_, previous)) = self.active.remove(&key) {
            log::info!("Superseding upload watcher for message {} in chat {}", key.1 .0, key.0);
            previous.stop().await;
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();
        let (tx, rx) = watch::channel(None);

        let active = Arc::clone(&self.active);
        let task_cancel = cancel.clone();
        let shutdown = self.shutdown.clone();
        let task = tokio::spawn(async move {
            let outcome = watch_upload(&config, &target, &status, &task_cancel, &shutdown).await;
            let _ = tx.send(Some(outcome));
            active.remove_if(&key, |_, w| w.generation == generation);
        });

        self.active.insert(
            key,
            ActiveWatch {
                generation,
                cancel,
                task,
            },
        );
        // The watch may have ended before it was registered
        let finished = rx.borrow().is_some();
        if finished {
            self.active.remove_if(&key, |_, w| w.generation == generation);
        }
        UploadTicket { outcome: rx }
    }

    /// Stops the watcher attached to a message without touching the message.
    /// Returns whether one was running.
    pub async fn stop(&self, chat_id: ChatId, message_id: MessageId) -> bool {
        match self.active.remove(&(chat_id, message_id)) {
            Some((_, watch)) => {
                watch.stop().await;
                true
            }
            None => false,
        }
    }

    /// Shutdown: stops and awaits every watcher. Each one writes its
    /// "monitoring stopped" terminal message first. Watches started afterwards
    /// end immediately the same way.
    pub async fn stop_all(&self) {
        self.shutdown.cancel();
        let keys: Vec<WatchKey> = self.active.iter().map(|e| *e.key()).collect();
        for key in keys {
            if let Some((_, watch)) = self.active.remove(&key) {
                watch.stop().await;
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
