use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dryercount::{BoundingBox, DetectedObject, Detector, PipelineContext, RunRecord, Settings};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};

/// Detector returning a canned answer for every image.
pub struct FixedDetector {
    pub detections: Vec<DetectedObject>,
}

impl Detector for FixedDetector {
    fn detect(&self, _image: &DynamicImage) -> dryercount::Result<Vec<DetectedObject>> {
        Ok(self.detections.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

pub fn detection(class_id: u32, x1: f32, y1: f32, x2: f32, y2: f32) -> DetectedObject {
    DetectedObject {
        class_id,
        confidence: 0.8,
        bbox: BoundingBox::new(x1, y1, x2, y2),
    }
}

/// Encodes a 100x100 gray PNG in memory.
pub fn test_png() -> Vec<u8> {
    let img = ImageBuffer::from_fn(100, 100, |_, _| Rgb([128u8, 128u8, 128u8]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .expect("Failed to encode test image");
    buf.into_inner()
}

/// Settings pointing every artifact into `dir`, with no Unicode font available.
pub fn test_settings(dir: &Path) -> Settings {
    Settings {
        output_dir: dir.join("static"),
        history_path: dir.join("history.jsonl"),
        font_path: dir.join("missing-font.ttf"),
        ..Settings::default()
    }
}

/// Creates a PipelineContext backed by a temporary directory.
/// Returns both the context and the temp directory (which must be kept alive).
pub fn create_test_context(
    detections: Vec<DetectedObject>,
) -> (Arc<PipelineContext>, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let settings = test_settings(dir.path());
    let ctx = PipelineContext::new(Arc::new(FixedDetector { detections }), settings);
    (Arc::new(ctx), dir)
}

pub fn record(timestamp: &str, filename: &str, detected_count: u64) -> RunRecord {
    RunRecord {
        timestamp: timestamp.to_string(),
        filename: filename.to_string(),
        detected_count,
    }
}

/// A Unicode TTF installed on this machine, if any.
pub fn find_unicode_font() -> Option<PathBuf> {
    [
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.is_file())
}
