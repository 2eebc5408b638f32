pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod server;

pub use config::{AnnotateScope, Settings};
pub use crate::core::HistoryStore;
pub use detection::{Annotator, Detector, YoloConfig, YoloDetector};
pub use error::{Error, Result};
pub use models::{BoundingBox, DetectedObject, RunRecord};
pub use pipeline::{PipelineContext, ProcessOutcome};
pub use report::{RenderMode, Report, ReportGenerator};
