use crate::models::DetectedObject;

/// Keep the detections of `target_class_id`.
///
/// Pure classification on `class_id`: confidence thresholding already
/// happened inside the detector, nothing is re-scored here.
pub fn filter(detections: &[DetectedObject], target_class_id: u32) -> (usize, Vec<DetectedObject>) {
    let matched: Vec<DetectedObject> = detections
        .iter()
        .filter(|d| d.class_id == target_class_id)
        .cloned()
        .collect();
    (matched.len(), matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    fn det(class_id: u32, confidence: f32) -> DetectedObject {
        DetectedObject {
            class_id,
            confidence,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        }
    }

    #[test]
    fn empty_input_yields_nothing() {
        let (count, matched) = filter(&[], 78);
        assert_eq!(count, 0);
        assert!(matched.is_empty());
    }

    #[test]
    fn counts_only_the_target_class() {
        let detections = vec![det(78, 0.9), det(0, 0.8), det(78, 0.3), det(7, 0.99)];
        let (count, matched) = filter(&detections, 78);
        assert_eq!(count, 2);
        assert!(matched.iter().all(|d| d.class_id == 78));
        // Input order is preserved.
        assert_eq!(matched[0].confidence, 0.9);
        assert_eq!(matched[1].confidence, 0.3);
    }

    #[test]
    fn count_matches_membership_for_every_class() {
        let detections: Vec<DetectedObject> =
            (0..200u32).map(|i| det((i * 7) % 13, 0.5)).collect();
        for target in 0..15 {
            let expected = detections.iter().filter(|d| d.class_id == target).count();
            let (count, matched) = filter(&detections, target);
            assert_eq!(count, expected);
            assert_eq!(matched.len(), expected);
        }
    }

    #[test]
    fn low_confidence_matches_still_count() {
        let (count, _) = filter(&[det(78, 0.01)], 78);
        assert_eq!(count, 1);
    }
}
