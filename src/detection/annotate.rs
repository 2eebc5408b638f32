use std::io::Cursor;
use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::debug;

use crate::core::artifact::write_atomic;
use crate::detection::Detector;
use crate::error::{Error, Result};
use crate::models::DetectedObject;

const LINE_WIDTH: u32 = 3;
const LABEL_SCALE: f32 = 20.0;
const LABEL_PADDING: u32 = 2;
const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);

/// Stable per-class box color.
pub fn class_color(class_id: u32) -> Rgb<u8> {
    const PALETTE: [[u8; 3]; 8] = [
        [255, 56, 56],
        [255, 157, 151],
        [255, 112, 31],
        [255, 178, 29],
        [207, 210, 49],
        [72, 249, 10],
        [0, 194, 255],
        [132, 56, 255],
    ];
    Rgb(PALETTE[class_id as usize % PALETTE.len()])
}

/// Draw each detection as a thick rectangle, captioned when a font is available.
pub fn draw_detections<F>(
    canvas: &mut RgbImage,
    detections: &[DetectedObject],
    font: Option<&FontArc>,
    label: F,
) where
    F: Fn(&DetectedObject) -> String,
{
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 {
        return;
    }

    for det in detections {
        let bbox = det.bbox.clamp(w, h);
        let x = bbox.x1.round() as i32;
        let y = bbox.y1.round() as i32;
        let rw = (bbox.width().round() as u32).max(1);
        let rh = (bbox.height().round() as u32).max(1);
        let color = class_color(det.class_id);

        // Nested outlines give the line its width.
        for t in 0..LINE_WIDTH.min(rw / 2).min(rh / 2).max(1) {
            let rect = Rect::at(x + t as i32, y + t as i32)
                .of_size((rw - 2 * t).max(1), (rh - 2 * t).max(1));
            draw_hollow_rect_mut(canvas, rect, color);
        }

        if let Some(font) = font {
            let text = label(det);
            let scale = PxScale::from(LABEL_SCALE);
            let (tw, th) = text_size(scale, font, &text);
            let bw = tw + 2 * LABEL_PADDING;
            let bh = th + 2 * LABEL_PADDING;
            // Caption sits above the box, or inside it at the top edge.
            let ty = if y >= bh as i32 { y - bh as i32 } else { y };
            draw_filled_rect_mut(canvas, Rect::at(x, ty).of_size(bw, bh), color);
            draw_text_mut(
                canvas,
                LABEL_TEXT,
                x + LABEL_PADDING as i32,
                ty + LABEL_PADDING as i32,
                scale,
                font,
                &text,
            );
        }
    }
}

/// Encode as JPEG and atomically replace `path`.
pub fn save_jpeg(image: &DynamicImage, path: &Path) -> Result<()> {
    let mut buf = Cursor::new(Vec::new());
    image
        .to_rgb8()
        .write_to(&mut buf, ImageFormat::Jpeg)
        .map_err(|e| Error::io(path, std::io::Error::other(e)))?;
    write_atomic(path, buf.get_ref()).map_err(|e| Error::io(path, e))
}

/// Renders detections onto a copy of the source image at a fixed output path.
#[derive(Clone)]
pub struct Annotator {
    output_path: PathBuf,
    font: Option<FontArc>,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("output_path", &self.output_path)
            .field("labels", &self.font.is_some())
            .finish()
    }
}

impl Annotator {
    pub fn new<P: AsRef<Path>>(output_path: P, font: Option<FontArc>) -> Self {
        Self {
            output_path: output_path.as_ref().to_path_buf(),
            font,
        }
    }

    /// Load a label font; boxes are drawn without captions when this fails.
    pub fn load_font(path: &Path) -> Option<FontArc> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(?path, error = %e, "label font unavailable, captions disabled");
                return None;
            }
        };
        match FontArc::try_from_vec(bytes) {
            Ok(font) => Some(font),
            Err(e) => {
                debug!(?path, error = %e, "label font unreadable, captions disabled");
                None
            }
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn font(&self) -> Option<&FontArc> {
        self.font.as_ref()
    }

    /// Draw `boxes` with the detector's renderer and write the result.
    ///
    /// An empty `boxes` slice still writes a valid, unannotated copy.
    pub fn annotate(
        &self,
        detector: &dyn Detector,
        source: &DynamicImage,
        boxes: &[DetectedObject],
    ) -> Result<PathBuf> {
        let canvas = detector.render(source, boxes, self.font());
        save_jpeg(&DynamicImage::ImageRgb8(canvas), &self.output_path)?;
        debug!(path = ?self.output_path, boxes = boxes.len(), "annotated image written");
        Ok(self.output_path.clone())
    }
}
