//! Scripted `Extractor` mock

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tubestash::core::error::AppError;
use tubestash::download::{ExtractedFile, ExtractionError, ExtractionJob, Extractor, ExtractorEvent, FormatOption};

/// What the mock does when asked to extract
#[derive(Debug, Clone)]
pub enum Script {
    /// Emits `events`, then writes `file_name` into the scratch dir
    Produce { file_name: String, events: Vec<ExtractorEvent> },
    /// Reports `file_name` in the scratch dir without ever writing it
    ProduceNothing { file_name: String },
    /// Fails with the given extractor stderr
    Fail(String),
    /// Never finishes
    Hang,
    /// Leaves a detached task holding a progress sender, then never finishes
    HangWithStraySender,
}

pub struct ScriptedExtractor {
    script: Script,
}

#[allow(dead_code)]
impl ScriptedExtractor {
    pub fn new(script: Script) -> Self {
        Self { script }
    }

    pub fn producing(file_name: &str) -> Self {
        Self::new(Script::Produce {
            file_name: file_name.to_string(),
            events: vec![ExtractorEvent::percent(50.0), ExtractorEvent::Finished],
        })
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(
        &self,
        job: &ExtractionJob,
        progress: UnboundedSender<ExtractorEvent>,
    ) -> Result<ExtractedFile, ExtractionError> {
        match &self.script {
            Script::Produce { file_name, events } => {
                for event in events {
                    let _ = progress.send(event.clone());
                }
                tokio::fs::create_dir_all(&job.scratch_dir).await.unwrap();
                let path = job.scratch_dir.join(file_name);
                tokio::fs::write(&path, b"media bytes").await.unwrap();
                Ok(ExtractedFile { path })
            }
            Script::ProduceNothing { file_name } => Ok(ExtractedFile {
                path: job.scratch_dir.join(file_name),
            }),
            Script::Fail(stderr) => Err(ExtractionError::from_output(stderr.clone())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ExtractionError::from_output("unreachable"))
            }
            Script::HangWithStraySender => {
                let stray = progress.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    drop(stray);
                });
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ExtractionError::from_output("unreachable"))
            }
        }
    }

    async fn list_formats(&self, _url: &str) -> Result<Vec<FormatOption>, AppError> {
        Ok(Vec::new())
    }
}
