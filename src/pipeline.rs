use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::{AnnotateScope, Settings};
use crate::core::HistoryStore;
use crate::detection::annotate::save_jpeg;
use crate::detection::{self, Annotator, Detector, filter};
use crate::error::{Error, Result};
use crate::models::RunRecord;
use crate::report::{Report, ReportGenerator};

/// Result of one processed photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Fixed-path copy of the uploaded image.
    pub input_image: PathBuf,
    /// Fixed-path annotated image.
    pub output_image: PathBuf,
    /// Detections of the target class.
    pub detected_count: usize,
    /// Detections of any class, before filtering.
    pub total_detections: usize,
    /// The history entry appended for this run.
    pub record: RunRecord,
}

/// Everything a pipeline run needs, passed explicitly instead of living in globals.
///
/// The detector is shared read-only. The fixed-path artifacts (input image,
/// annotated image, report) are single-slot files; `artifacts` serializes runs
/// that touch them so one run cannot clobber another's files half-way.
pub struct PipelineContext {
    detector: Arc<dyn Detector>,
    settings: Settings,
    history: HistoryStore,
    annotator: Annotator,
    reports: ReportGenerator,
    artifacts: Mutex<()>,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("detector", &self.detector.name())
            .field("settings", &self.settings)
            .field("history", &self.history)
            .finish()
    }
}

impl PipelineContext {
    pub fn new(detector: Arc<dyn Detector>, settings: Settings) -> Self {
        let font = Annotator::load_font(&settings.font_path);
        Self {
            annotator: Annotator::new(settings.output_image_path(), font),
            history: HistoryStore::new(&settings.history_path),
            reports: ReportGenerator::from_settings(&settings),
            detector,
            settings,
            artifacts: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Run detection on uploaded bytes, write both fixed-path images and log the run.
    ///
    /// Nothing is written when the upload cannot be decoded.
    #[instrument(skip(self, bytes), fields(run_id = %Uuid::new_v4(), size = bytes.len()))]
    pub async fn process_upload(&self, filename: &str, bytes: Vec<u8>) -> Result<ProcessOutcome> {
        if filename.is_empty() {
            return Err(Error::input("no file selected"));
        }
        if bytes.is_empty() {
            return Err(Error::input(format!("{} is empty", filename)));
        }

        let _artifacts = self.artifacts.lock().await;

        let detector = Arc::clone(&self.detector);
        let annotator = self.annotator.clone();
        let input_image = self.settings.input_image_path();
        let target = self.settings.target_class_id;
        let scope = self.settings.annotate_scope;

        let stored_input = input_image.clone();
        let (total_detections, detected_count, output_image) =
            tokio::task::spawn_blocking(move || -> Result<(usize, usize, PathBuf)> {
                let image = detection::decode_image(&bytes)?;
                save_jpeg(&image, &stored_input)?;

                let detections = detector.detect(&image)?;
                let (count, matched) = filter(&detections, target);
                let drawn = match scope {
                    AnnotateScope::Target => &matched,
                    AnnotateScope::All => &detections,
                };
                let output = annotator.annotate(detector.as_ref(), &image, drawn)?;
                Ok((detections.len(), count, output))
            })
            .await??;

        let record = RunRecord::now(filename, detected_count as u64);
        self.history.append(record.clone()).await?;

        info!(
            filename,
            detected_count,
            total_detections,
            target_class_id = target,
            "image processed"
        );
        Ok(ProcessOutcome {
            input_image,
            output_image,
            detected_count,
            total_detections,
            record,
        })
    }

    /// Process an image file from disk, logging it under its file name.
    pub async fn process_file(&self, path: &Path) -> Result<ProcessOutcome> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::input(format!("cannot read {:?}: {}", path, e)))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.process_upload(&filename, bytes).await
    }

    /// Regenerate the report from the current history.
    pub async fn generate_report(&self) -> Result<Report> {
        let _artifacts = self.artifacts.lock().await;
        build_report(&self.history, &self.reports).await
    }
}

/// Read the whole history and render it, off the async executor.
pub async fn build_report(history: &HistoryStore, reports: &ReportGenerator) -> Result<Report> {
    let records = history.read_all().await?;
    let reports = reports.clone();
    tokio::task::spawn_blocking(move || reports.generate(&records)).await?
}
