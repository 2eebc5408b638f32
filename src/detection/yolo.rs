//! YOLOv8 adapter on top of the `rten` runtime.
//!
//! The model is treated as an opaque `[1, 3, S, S] -> [1, 4 + C, N]` function:
//! letterboxed RGB in, `cx, cy, w, h` plus per-class scores out.

use std::path::Path;

use image::DynamicImage;
use image::imageops::FilterType;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use tracing::{debug, info, instrument};

use crate::config::Settings;
use crate::detection::Detector;
use crate::detection::labels::COCO_CLASSES;
use crate::error::{Error, Result};
use crate::models::{BoundingBox, DetectedObject};

/// Gray used by Ultralytics for letterbox padding.
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Post-processing knobs applied inside the adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloConfig {
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Classes in the model head; decides which output axis holds features.
    pub num_classes: usize,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
            num_classes: COCO_CLASSES.len(),
        }
    }
}

impl From<&Settings> for YoloConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            input_size: settings.input_size,
            confidence_threshold: settings.confidence_threshold,
            iou_threshold: settings.iou_threshold,
            max_detections: settings.max_detections,
            num_classes: COCO_CLASSES.len(),
        }
    }
}

/// How the source image was fitted into the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_width: u32,
    pub orig_height: u32,
}

impl Letterbox {
    /// Map a box from model-input space back to source pixels.
    pub fn restore(&self, bbox: BoundingBox) -> BoundingBox {
        BoundingBox::new(
            (bbox.x1 - self.pad_x) / self.scale,
            (bbox.y1 - self.pad_y) / self.scale,
            (bbox.x2 - self.pad_x) / self.scale,
            (bbox.y2 - self.pad_y) / self.scale,
        )
        .clamp(self.orig_width, self.orig_height)
    }
}

/// Resize keeping aspect ratio, pad to `size`x`size`, and lay out as CHW floats.
pub fn letterbox(image: &DynamicImage, size: u32) -> (Vec<f32>, Letterbox) {
    let (orig_w, orig_h) = (image.width().max(1), image.height().max(1));
    let scale = (size as f32 / orig_w as f32).min(size as f32 / orig_h as f32);
    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, size);

    let resized = image
        .resize_exact(new_w, new_h, FilterType::Triangle)
        .to_rgb8();

    let pad_x = ((size - new_w) / 2) as usize;
    let pad_y = ((size - new_h) / 2) as usize;
    let side = size as usize;
    let plane = side * side;

    let mut data = vec![PAD_VALUE; 3 * plane];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let idx = (y as usize + pad_y) * side + x as usize + pad_x;
        for c in 0..3 {
            data[c * plane + idx] = pixel[c] as f32 / 255.0;
        }
    }

    (
        data,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            orig_width: orig_w,
            orig_height: orig_h,
        },
    )
}

/// Turn a raw `[1, F, N]` (or `[1, N, F]`) head output into scored boxes.
///
/// `F = 4 + num_classes`. The axis of that length holds features; when neither
/// axis matches, the shorter one is taken, since YOLOv8 heads have far more
/// anchors than features.
pub fn decode(
    output: &[f32],
    shape: [usize; 3],
    letterbox: &Letterbox,
    confidence_threshold: f32,
    num_classes: usize,
) -> Result<Vec<DetectedObject>> {
    let [batch, a, b] = shape;
    if batch != 1 || output.len() != a * b {
        return Err(Error::Model(format!(
            "unexpected output shape {:?} for {} values",
            shape,
            output.len()
        )));
    }
    let expected = 4 + num_classes;
    let features_major = if a == expected {
        true
    } else if b == expected {
        false
    } else {
        a <= b
    };
    let (features, anchors) = if features_major { (a, b) } else { (b, a) };
    if features < 5 {
        return Err(Error::Model(format!(
            "output has {} features, need at least 5",
            features
        )));
    }
    let at = |feature: usize, anchor: usize| -> f32 {
        if features_major {
            output[feature * anchors + anchor]
        } else {
            output[anchor * features + feature]
        }
    };

    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let (class_id, confidence) = (4..features)
            .map(|f| (f - 4, at(f, anchor)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if confidence < confidence_threshold {
            continue;
        }
        let bbox = BoundingBox::from_center(
            at(0, anchor),
            at(1, anchor),
            at(2, anchor),
            at(3, anchor),
        );
        detections.push(DetectedObject {
            class_id: class_id as u32,
            confidence,
            bbox: letterbox.restore(bbox),
        });
    }
    Ok(detections)
}

/// Class-aware non-maximum suppression, highest confidence first.
pub fn non_max_suppression(
    mut detections: Vec<DetectedObject>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<DetectedObject> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<DetectedObject> = Vec::new();
    for det in detections {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == det.class_id && k.bbox.iou(&det.bbox) > iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}

/// Pretrained YOLOv8 weights loaded once and shared read-only.
pub struct YoloDetector {
    model: Model,
    config: YoloConfig,
    name: String,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

impl YoloDetector {
    /// Load `.rten` weights. Meant to run once at start-up; a failure here is fatal.
    pub fn load<P: AsRef<Path>>(model_path: P, config: YoloConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.is_file() {
            return Err(Error::Model(format!(
                "model not found at {:?}; convert YOLOv8 weights with `rten-convert`",
                model_path
            )));
        }
        let model = Model::load_file(model_path)
            .map_err(|e| Error::Model(format!("failed to load {:?}: {}", model_path, e)))?;
        let name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("yolo")
            .to_string();
        info!(model = %name, input_size = config.input_size, "detection model loaded");
        Ok(Self {
            model,
            config,
            name,
        })
    }

    pub fn config(&self) -> &YoloConfig {
        &self.config
    }
}

impl Detector for YoloDetector {
    #[instrument(skip_all, fields(model = %self.name, width = image.width(), height = image.height()))]
    fn detect(&self, image: &DynamicImage) -> Result<Vec<DetectedObject>> {
        let side = self.config.input_size as usize;
        let (data, letterbox) = letterbox(image, self.config.input_size);
        let input = NdTensor::from_data([1, 3, side, side], data);

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| Error::Model(format!("inference failed: {}", e)))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|e| Error::Model(format!("unexpected output tensor: {:?}", e)))?;

        let raw = decode(
            &output.to_vec(),
            output.shape(),
            &letterbox,
            self.config.confidence_threshold,
            self.config.num_classes,
        )?;
        let candidates = raw.len();
        let detections =
            non_max_suppression(raw, self.config.iou_threshold, self.config.max_detections);
        debug!(candidates, kept = detections.len(), "detection finished");
        Ok(detections)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn det(class_id: u32, confidence: f32, bbox: BoundingBox) -> DetectedObject {
        DetectedObject {
            class_id,
            confidence,
            bbox,
        }
    }

    fn identity(size: u32) -> Letterbox {
        Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_width: size,
            orig_height: size,
        }
    }

    #[test]
    fn letterbox_pads_wide_images_vertically() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([255, 0, 0])));
        let (data, lb) = letterbox(&img, 32);
        assert_eq!(data.len(), 3 * 32 * 32);
        assert_eq!(lb.scale, 0.5);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 8.0);
        // Top row is padding, middle row is image.
        assert_eq!(data[0], PAD_VALUE);
        assert_eq!(data[16 * 32 + 16], 1.0);
        // Green plane of the red image is zero.
        assert_eq!(data[32 * 32 + 16 * 32 + 16], 0.0);
    }

    #[test]
    fn restore_undoes_letterbox() {
        let lb = Letterbox {
            scale: 0.5,
            pad_x: 0.0,
            pad_y: 8.0,
            orig_width: 64,
            orig_height: 32,
        };
        let restored = lb.restore(BoundingBox::new(4.0, 10.0, 12.0, 18.0));
        assert_eq!(restored, BoundingBox::new(8.0, 4.0, 24.0, 20.0));
    }

    #[test]
    fn decode_features_major_output() -> anyhow::Result<()> {
        // Two anchors, two classes: F = 6, N = 2, laid out as [1, 6, 2].
        #[rustfmt::skip]
        let output = vec![
            50.0, 10.0,  // cx
            50.0, 10.0,  // cy
            20.0, 4.0,   // w
            10.0, 4.0,   // h
            0.1, 0.05,   // class 0
            0.9, 0.10,   // class 1
        ];
        let dets = decode(&output, [1, 6, 2], &identity(100), 0.25, 2)?;
        assert_eq!(dets.len(), 1, "second anchor is below threshold");
        assert_eq!(dets[0].class_id, 1);
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(dets[0].bbox, BoundingBox::new(40.0, 45.0, 60.0, 55.0));
        Ok(())
    }

    #[test]
    fn decode_anchor_major_output() -> anyhow::Result<()> {
        // Same data transposed to [1, N, F] with more anchors than features.
        let mut output = vec![0.0f32; 8 * 6];
        output[..6].copy_from_slice(&[50.0, 50.0, 20.0, 10.0, 0.8, 0.1]);
        let dets = decode(&output, [1, 8, 6], &identity(100), 0.25, 2)?;
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 0);
        Ok(())
    }

    #[test]
    fn decode_square_output_follows_class_count() -> anyhow::Result<()> {
        // Square output: the first axis matching 4 + classes wins.
        let mut output = vec![0.0f32; 6 * 6];
        // Features-major: anchor 0 column.
        for (f, v) in [50.0, 50.0, 20.0, 10.0, 0.0, 0.9].iter().enumerate() {
            output[f * 6] = *v;
        }
        let dets = decode(&output, [1, 6, 6], &identity(100), 0.25, 2)?;
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(40.0, 45.0, 60.0, 55.0));
        Ok(())
    }

    #[test]
    fn decode_uses_class_count_when_features_outnumber_anchors() -> anyhow::Result<()> {
        // Full COCO head with only 3 anchors: [1, 84, 3].
        let anchors = 3;
        let mut output = vec![0.0f32; 84 * anchors];
        for (f, v) in [30.0, 30.0, 10.0, 10.0].iter().enumerate() {
            output[f * anchors + 2] = *v;
        }
        output[(4 + 78) * anchors + 2] = 0.8;
        let dets = decode(&output, [1, 84, 3], &identity(100), 0.25, 80)?;
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 78);
        assert_eq!(dets[0].bbox, BoundingBox::new(25.0, 25.0, 35.0, 35.0));
        Ok(())
    }

    #[test]
    fn decode_rejects_mismatched_shape() {
        assert!(decode(&[0.0; 10], [1, 6, 2], &identity(10), 0.25, 2).is_err());
        assert!(decode(&[0.0; 8], [1, 4, 2], &identity(10), 0.25, 80).is_err());
    }

    #[test]
    fn nms_suppresses_overlaps_within_a_class_only() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let a_shifted = BoundingBox::new(1.0, 0.0, 11.0, 10.0);
        let far = BoundingBox::new(50.0, 50.0, 60.0, 60.0);
        let kept = non_max_suppression(
            vec![
                det(78, 0.6, a_shifted),
                det(78, 0.9, a),
                det(0, 0.7, a),
                det(78, 0.5, far),
            ],
            0.7,
            300,
        );
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].confidence, 0.9);
        assert!(kept.iter().all(|d| d.confidence != 0.6));
    }

    #[test]
    fn nms_honours_max_detections() {
        let dets = (0..10)
            .map(|i| {
                let x = i as f32 * 20.0;
                det(1, 0.5, BoundingBox::new(x, 0.0, x + 10.0, 10.0))
            })
            .collect();
        assert_eq!(non_max_suppression(dets, 0.7, 4).len(), 4);
    }

    #[test]
    fn load_reports_missing_model() {
        let err = YoloDetector::load("/nonexistent/yolov8l.rten", YoloConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }
}
