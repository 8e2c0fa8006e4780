//! The download pipeline.
//!
//! One [`DownloadOrchestrator::run`] call takes a request through
//! `Initiated → CapacityChecked → Extracting → Relocating → (UploadWatching) → Succeeded | Failed`.
//! Every phase catches its own failures and turns them into one terminal edit
//! of the request's status message; nothing is propagated to the caller.
//!
//! For remote backends with upload monitoring enabled, `run` returns as soon
//! as the upload watcher is started. The watcher then owns the status message
//! and writes the terminal edit itself.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::core::config;
use crate::download::errors::{user_message, ExtractionFailure};
use crate::download::extractor::{ExtractionError, ExtractionJob, Extractor};
use crate::download::naming::{final_file_name, relocate};
use crate::download::progress::{ExtractorEvent, ProgressState, ThrottlePolicy};
use crate::download::request::{CallerContext, DownloadRequest, RequestId};
use crate::storage::capacity::CapacityMonitor;
use crate::storage::registry::{BackendKind, BackendRegistry};
use crate::telegram::messages::{self, TransferSummary, UploadNote};
use crate::telegram::status::StatusMessage;
use crate::telegram::transport::ChatTransport;
use crate::upload::registry::{UploadTicket, UploadWatchRegistry};
use crate::upload::watcher::{current_log_offset, UploadWatchConfig, UploadWatchTarget};

/// Upper bound for flushing queued progress edits after a finished extraction.
const PROGRESS_DRAIN: Duration = Duration::from_secs(5);

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Shared staging directory the extractor writes into
    pub scratch_dir: PathBuf,
    /// Upper bound for one extraction, `None` for no limit
    pub extract_timeout: Option<Duration>,
    /// Whether remote uploads are followed through the sidecar log
    pub upload_monitoring: bool,
    pub upload: UploadWatchConfig,
}

impl PipelineSettings {
    pub fn new(scratch_dir: impl Into<PathBuf>, upload: UploadWatchConfig) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            extract_timeout: Some(Duration::from_secs(config::download::DEFAULT_EXTRACT_TIMEOUT_SECS)),
            upload_monitoring: true,
            upload,
        }
    }

    pub fn from_env() -> Self {
        let secs = *config::EXTRACT_TIMEOUT_SECS;
        Self {
            scratch_dir: config::SCRATCH_DIR.clone(),
            extract_timeout: (secs > 0).then(|| Duration::from_secs(secs)),
            upload_monitoring: *config::UPLOAD_MONITORING,
            upload: UploadWatchConfig::from_env(),
        }
    }

    pub fn with_extract_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.extract_timeout = timeout;
        self
    }

    pub fn with_upload_monitoring(mut self, enabled: bool) -> Self {
        self.upload_monitoring = enabled;
        self
    }
}

/// Pipeline states, recorded in order in [`PipelineReport::trace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initiated,
    CapacityChecked,
    Extracting,
    Relocating,
    UploadWatching,
    Succeeded,
    Failed,
}

/// Why a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The status message could not be created
    Transport,
    /// Unknown or invalid backend, or its directory could not be created
    Backend,
    Extraction(ExtractionFailure),
    Relocation,
}

/// Terminal result of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Succeeded { final_path: PathBuf, backend_id: String },
    Failed { reason_kind: FailureKind, detail: String },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// What happens after the file reached its backend directory.
#[derive(Debug, Clone)]
pub enum UploadPhase {
    /// Local backend, or the request failed earlier
    NotApplicable,
    /// Remote backend without upload monitoring
    Unmonitored,
    /// A watcher is following the upload
    Watching(UploadTicket),
}

/// Everything a run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub request_id: RequestId,
    pub outcome: TransferOutcome,
    pub upload: UploadPhase,
    pub trace: Vec<PipelineState>,
}

impl PipelineReport {
    pub fn reached(&self, state: PipelineState) -> bool {
        self.trace.contains(&state)
    }
}

/// Runs download requests end to end.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    registry: Arc<BackendRegistry>,
    capacity: Arc<CapacityMonitor>,
    extractor: Arc<dyn Extractor>,
    transport: Arc<dyn ChatTransport>,
    watchers: UploadWatchRegistry,
    settings: PipelineSettings,
}

impl DownloadOrchestrator {
    pub fn new(
        registry: Arc<BackendRegistry>,
        capacity: Arc<CapacityMonitor>,
        extractor: Arc<dyn Extractor>,
        transport: Arc<dyn ChatTransport>,
        watchers: UploadWatchRegistry,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            capacity,
            extractor,
            transport,
            watchers,
            settings,
        }
    }

    /// Runs one request. Never fails: the outcome is in the report and in the status message.
    pub async fn run(&self, request: DownloadRequest) -> PipelineReport {
        let mut run = Run {
            request_id: request.id,
            trace: vec![PipelineState::Initiated],
        };
        log::info!(
            "[{}] Initiated: url={} backend={} format={} container={}",
            request.id,
            request.source_url,
            request.backend_id,
            request.source_format_selector,
            request.output_container.as_str()
        );

        let status = match self.open_status(&request).await {
            Ok(status) => status,
            Err(detail) => return run.fail(FailureKind::Transport, detail),
        };
        let origin = request.caller_context.origin_message_id();

        // Backend resolution and advisory capacity check
        let target_dir = match self.registry.resolve_storage_path(&request.backend_id) {
            Ok(dir) => dir,
            Err(e) => {
                status
                    .edit(&format!("❌ Storage backend '{}' is not usable: {}", request.backend_id, e))
                    .await;
                status.delete_origin(origin).await;
                return run.fail(FailureKind::Backend, e.to_string());
            }
        };
        let kind = self.registry.kind_of(&request.backend_id);
        if kind == BackendKind::Remote && !self.registry.is_live(&request.backend_id) {
            log::warn!(
                "[{}] Backend {} has no fresh heartbeat, continuing anyway",
                request.id,
                request.backend_id
            );
        }
        let snapshot = self.capacity.check(&request.backend_id, &target_dir).await;
        let capacity_ok = self
            .capacity
            .notify_if_low(self.transport.as_ref(), status.chat_id(), &request.backend_id, snapshot)
            .await;
        run.enter(PipelineState::CapacityChecked);
        log::info!("[{}] CapacityChecked: ok={}", request.id, capacity_ok);

        // Extraction into scratch
        run.enter(PipelineState::Extracting);
        let extracted = match self.extract(&request, &status).await {
            Ok(file) => file,
            Err(e) => {
                log::error!("[{}] Extraction failed ({}): {}", request.id, e.kind, e.detail.trim());
                status.edit(&user_message(e.kind, &e.detail)).await;
                status.delete_origin(origin).await;
                return run.fail(FailureKind::Extraction(e.kind), e.detail);
            }
        };
        log::info!("[{}] Extracted {}", request.id, extracted.display());

        // Relocation into the backend directory
        run.enter(PipelineState::Relocating);
        let Some(file_name) = final_file_name(&extracted, &self.settings.scratch_dir, request.output_container)
        else {
            let detail = format!("Cannot derive a file name from {}", extracted.display());
            status
                .edit(&messages::relocation_failed(&extracted, &target_dir, &detail))
                .await;
            status.delete_origin(origin).await;
            return run.fail(FailureKind::Relocation, detail);
        };

        let watch_upload = kind == BackendKind::Remote && self.settings.upload_monitoring;
        let log_offset = if watch_upload {
            current_log_offset(&self.settings.upload.log_path).await
        } else {
            0
        };

        let display_name = self.registry.display_name(&request.backend_id);
        status.edit(&messages::relocating(&display_name)).await;
        let final_path = match relocate(&extracted, &target_dir, &file_name).await {
            Ok(path) => path,
            Err(e) => {
                let attempted = target_dir.join(&file_name);
                log::error!(
                    "[{}] Failed to move {} to {}: {}",
                    request.id,
                    extracted.display(),
                    attempted.display(),
                    e
                );
                status
                    .edit(&messages::relocation_failed(&extracted, &attempted, &e.to_string()))
                    .await;
                status.delete_origin(origin).await;
                return run.fail(FailureKind::Relocation, e.to_string());
            }
        };
        log::info!("[{}] Relocated to {}", request.id, final_path.display());

        let summary = TransferSummary {
            file_name: final_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(file_name),
            container: request.output_container,
            backend_id: request.backend_id.clone(),
            backend_display_name: display_name,
            final_path: final_path.clone(),
            source_url: request.source_url.clone(),
        };

        let upload = match kind {
            BackendKind::Local => {
                status
                    .edit(&messages::download_succeeded(&summary, UploadNote::None))
                    .await;
                status.delete_origin(origin).await;
                UploadPhase::NotApplicable
            }
            BackendKind::Remote if !watch_upload => {
                status
                    .edit(&messages::download_succeeded(&summary, UploadNote::WillSync))
                    .await;
                status.delete_origin(origin).await;
                UploadPhase::Unmonitored
            }
            BackendKind::Remote => {
                run.enter(PipelineState::UploadWatching);
                log::info!("[{}] UploadWatching {}", request.id, summary.file_name);
                status
                    .edit(&messages::waiting_for_upload(&summary.backend_display_name))
                    .await;
                let target = UploadWatchTarget {
                    summary,
                    origin_message_id: origin,
                    log_offset,
                };
                let ticket = self
                    .watchers
                    .start(self.settings.upload.clone(), target, status.clone())
                    .await;
                UploadPhase::Watching(ticket)
            }
        };

        run.enter(PipelineState::Succeeded);
        log::info!("[{}] Succeeded", request.id);
        PipelineReport {
            request_id: run.request_id,
            outcome: TransferOutcome::Succeeded {
                final_path,
                backend_id: request.backend_id,
            },
            upload,
            trace: run.trace,
        }
    }

    async fn open_status(&self, request: &DownloadRequest) -> Result<StatusMessage, String> {
        let text = messages::starting(&request.source_url);
        match request.caller_context {
            CallerContext::FromCallback { chat_id, message_id, .. } => {
                let status = StatusMessage::existing(Arc::clone(&self.transport), chat_id, message_id);
                status.edit(&text).await;
                Ok(status)
            }
            CallerContext::FromMessage { chat_id, .. } => {
                StatusMessage::send(Arc::clone(&self.transport), chat_id, &text)
                    .await
                    .map_err(|e| {
                        log::error!("[{}] Could not send status message: {}", request.id, e);
                        e.to_string()
                    })
            }
        }
    }

    /// Runs the extractor with throttled progress forwarding and the optional timeout.
    async fn extract(&self, request: &DownloadRequest, status: &StatusMessage) -> Result<PathBuf, ExtractionError> {
        let job = ExtractionJob {
            url: request.source_url.clone(),
            format_selector: request.source_format_selector.clone(),
            container: request.output_container,
            scratch_dir: self.settings.scratch_dir.clone(),
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<ExtractorEvent>();
        let progress_status = status.clone();
        let mut forwarder = tokio::spawn(async move {
            let mut state = ProgressState::new();
            while let Some(event) = rx.recv().await {
                let now = Instant::now();
                let emit = match &event {
                    ExtractorEvent::Finished => state.force_complete(now),
                    other => match other.normalized_percent() {
                        Some(percent) => state.should_emit(percent, now, ThrottlePolicy::download()),
                        None => false,
                    },
                };
                if emit {
                    progress_status
                        .edit(&messages::downloading(state.last_reported_percent()))
                        .await;
                }
            }
        });

        let extraction = self.extractor.extract(&job, tx);
        let (result, timed_out) = match self.settings.extract_timeout {
            Some(limit) => match tokio::time::timeout(limit, extraction).await {
                Ok(result) => (result, false),
                Err(_) => (Err(ExtractionError::timed_out(limit)), true),
            },
            None => (extraction.await, false),
        };

        // Stray sender clones (e.g. a reader task still attached to a grandchild's
        // pipe) must not hold the run open
        if timed_out {
            forwarder.abort();
        } else {
            match tokio::time::timeout(PROGRESS_DRAIN, &mut forwarder).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("[{}] Progress forwarder failed: {}", request.id, e),
                Err(_) => {
                    log::warn!("[{}] Progress forwarder still busy, dropping it", request.id);
                    forwarder.abort();
                }
            }
        }
        result.map(|file| file.path)
    }
}

/// Bookkeeping of one run.
struct Run {
    request_id: RequestId,
    trace: Vec<PipelineState>,
}

impl Run {
    fn enter(&mut self, state: PipelineState) {
        self.trace.push(state);
    }

    fn fail(mut self, reason_kind: FailureKind, detail: String) -> PipelineReport {
        log::info!("[{}] Failed: {:?}", self.request_id, reason_kind);
        self.enter(PipelineState::Failed);
        PipelineReport {
            request_id: self.request_id,
            outcome: TransferOutcome::Failed { reason_kind, detail },
            upload: UploadPhase::NotApplicable,
            trace: self.trace,
        }
    }
}
