use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Axis-aligned box in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from a center point and size, as YOLO heads emit them.
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union; 0.0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// Clamp to an image of the given size.
    pub fn clamp(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x1: self.x1.clamp(0.0, w),
            y1: self.y1.clamp(0.0, h),
            x2: self.x2.clamp(0.0, w),
            y2: self.y2.clamp(0.0, h),
        }
    }
}

/// One object reported by the detection model.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedObject {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// One line of the history log.
///
/// Field names on disk match the `history.json` files written by earlier
/// deployments, so existing logs keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: String,
    pub filename: String,
    #[serde(rename = "detected_hair_dryers")]
    pub detected_count: u64,
}

impl RunRecord {
    /// Record a run that finished now, stamped with local time.
    pub fn now(filename: impl Into<String>, detected_count: u64) -> Self {
        Self {
            timestamp: local_timestamp(),
            filename: filename.into(),
            detected_count,
        }
    }

    /// Timestamp cut to second precision (`YYYY-MM-DDTHH:MM:SS`).
    pub fn timestamp_seconds(&self) -> &str {
        match self.timestamp.char_indices().nth(19) {
            Some((idx, _)) => &self.timestamp[..idx],
            None => &self.timestamp,
        }
    }
}

fn local_timestamp() -> String {
    // The local offset can be indeterminate once other threads exist on Unix.
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| {
        tracing::debug!("local UTC offset unavailable, stamping in UTC");
        OffsetDateTime::now_utc()
    });
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = BoundingBox::new(10.0, 10.0, 50.0, 30.0);
        assert!((b.iou(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        // intersection 50, union 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn clamp_keeps_box_inside_image() {
        let b = BoundingBox::new(-5.0, 3.0, 120.0, 90.0).clamp(100, 80);
        assert_eq!(b, BoundingBox::new(0.0, 3.0, 100.0, 80.0));
    }

    #[test]
    fn from_center_round_trips_size() {
        let b = BoundingBox::from_center(50.0, 40.0, 20.0, 10.0);
        assert_eq!(b, BoundingBox::new(40.0, 35.0, 60.0, 45.0));
        assert_eq!(b.width(), 20.0);
        assert_eq!(b.height(), 10.0);
    }

    #[test]
    fn timestamp_is_truncated_to_seconds() {
        let record = RunRecord {
            timestamp: "2024-05-01T12:34:56.123456+03:00".to_string(),
            filename: "a.jpg".to_string(),
            detected_count: 1,
        };
        assert_eq!(record.timestamp_seconds(), "2024-05-01T12:34:56");

        let short = RunRecord {
            timestamp: "2024-05-01".to_string(),
            ..record
        };
        assert_eq!(short.timestamp_seconds(), "2024-05-01");
    }

    #[test]
    fn new_records_carry_a_parseable_timestamp() {
        let record = RunRecord::now("desk.jpg", 2);
        assert_eq!(record.filename, "desk.jpg");
        assert_eq!(record.detected_count, 2);
        assert_eq!(record.timestamp_seconds().len(), 19);
    }

    #[test]
    fn serializes_with_legacy_field_names() {
        let record = RunRecord {
            timestamp: "2024-05-01T12:34:56".to_string(),
            filename: "фен.jpg".to_string(),
            detected_count: 3,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"detected_hair_dryers\":3"));
        let back: RunRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
