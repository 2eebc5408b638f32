pub mod annotate;
pub mod filter;
pub mod labels;
pub mod yolo;

use std::path::Path;

use ab_glyph::FontArc;
use image::{DynamicImage, ImageReader, RgbImage};

use crate::error::{Error, Result};
use crate::models::DetectedObject;

pub use annotate::Annotator;
pub use filter::filter;
pub use yolo::{YoloConfig, YoloDetector};

/// Opaque object-detection model.
///
/// Implementations are loaded once and shared read-only between requests;
/// `detect` must not mutate model state.
pub trait Detector: Send + Sync {
    /// Detections in the model's native order, already confidence-thresholded.
    fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectedObject>>;

    /// Human-readable name for this detector (used in logs).
    fn name(&self) -> &str;

    /// Label for a class id in the model's taxonomy.
    fn class_name(&self, class_id: u32) -> Option<&str> {
        labels::coco_name(class_id)
    }

    /// Draw `detections` with their labels onto a copy of `image`.
    fn render(
        &self,
        image: &DynamicImage,
        detections: &[DetectedObject],
        font: Option<&FontArc>,
    ) -> RgbImage {
        let mut canvas = image.to_rgb8();
        annotate::draw_detections(&mut canvas, detections, font, |det| {
            let name = self.class_name(det.class_id).unwrap_or("unknown");
            format!("{} {:.2}", name, det.confidence)
        });
        canvas
    }
}

/// Open and decode an image file; anything unreadable is an input error.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    ImageReader::open(path)
        .map_err(|e| Error::input(format!("cannot open {:?}: {}", path, e)))?
        .with_guessed_format()
        .map_err(|e| Error::input(format!("cannot read {:?}: {}", path, e)))?
        .decode()
        .map_err(|e| Error::input(format!("cannot decode {:?}: {}", path, e)))
}

/// Decode uploaded bytes, guessing the format from content.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| Error::input(format!("cannot decode image: {}", e)))
}

/// Run `detector` on the image stored at `path`.
pub fn detect_path(detector: &dyn Detector, path: &Path) -> Result<Vec<DetectedObject>> {
    let image = load_image(path)?;
    detector.detect(&image)
}
