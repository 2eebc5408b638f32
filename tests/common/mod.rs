mod fixtures;
#[allow(unused_imports)]
pub use fixtures::*;

// Re-export commonly used types from dryercount for tests
#[allow(unused_imports)]
pub use dryercount::{
    DetectedObject, Error, HistoryStore, PipelineContext, RenderMode, ReportGenerator, RunRecord,
    Settings,
};
