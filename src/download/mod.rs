//! Download pipeline: request model, extractor, progress, relocation and the orchestrator.

pub mod errors;
pub mod extractor;
pub mod naming;
pub mod orchestrator;
pub mod progress;
pub mod request;

pub use errors::{classify_extraction_error, ExtractionFailure};
pub use extractor::{ExtractedFile, ExtractionError, ExtractionJob, Extractor, FormatOption, YtDlpExtractor};
pub use orchestrator::{
    DownloadOrchestrator, FailureKind, PipelineReport, PipelineSettings, PipelineState, TransferOutcome, UploadPhase,
};
pub use progress::{ExtractorEvent, ProgressState, ThrottlePolicy};
pub use request::{CallerContext, DownloadRequest, OutputContainer, RequestId, RequestIdAllocator};
