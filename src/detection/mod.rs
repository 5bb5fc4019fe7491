pub mod annotate;
pub mod classes;
pub mod ssd;

use image::RgbImage;

use crate::models::DetectedObject;

/// Effective default confidence threshold for keeping a detection.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Typed view of a detection model's output, one entry per detection slot.
///
/// The three vectors run in parallel: `boxes[i]` is the normalized
/// [ymin, xmin, ymax, xmax] box for the detection scored by `scores[i]`
/// with COCO class id `classes[i]`. Adapters from concrete model runtimes
/// produce this so nothing downstream touches the untyped output contract.
#[derive(Debug, Clone, Default)]
pub struct RawDetections {
    pub boxes: Vec<[f32; 4]>,
    pub scores: Vec<f32>,
    pub classes: Vec<i64>,
}

impl RawDetections {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// An object-detection model. Implementations are stateless after load and
/// shared process-wide; the output is assumed to already be
/// non-max-suppressed, as the SSD export's postprocessing graph does.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> anyhow::Result<RawDetections>;

    /// Human-readable name for this model (used in logs).
    fn name(&self) -> &str;
}

/// Keep detections scored strictly above `threshold`, resolve class names,
/// and assign 1-based ids within the result set. No count cap is applied.
pub fn filter_detections(raw: &RawDetections, threshold: f32) -> Vec<DetectedObject> {
    raw.scores
        .iter()
        .zip(raw.boxes.iter())
        .zip(raw.classes.iter())
        .filter(|((score, _), _)| **score > threshold)
        .enumerate()
        .map(|(idx, ((score, bbox), class_id))| DetectedObject {
            id: idx as u32 + 1,
            class_id: *class_id,
            class_name: classes::class_name(*class_id).to_string(),
            confidence: *score,
            bbox: *bbox,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawDetections {
        RawDetections {
            boxes: vec![
                [0.1, 0.1, 0.4, 0.4],
                [0.2, 0.3, 0.6, 0.7],
                [0.5, 0.5, 0.9, 0.9],
                [0.0, 0.0, 0.2, 0.2],
            ],
            scores: vec![0.95, 0.75, 0.5, 0.1],
            classes: vec![1, 18, 3, 44],
        }
    }

    #[test]
    fn keeps_exactly_the_strictly_greater_scores() {
        let kept = filter_detections(&sample(), 0.5);
        // 0.5 itself is excluded: the comparison is strict
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|d| d.confidence > 0.5));
    }

    #[test]
    fn raising_threshold_never_increases_count() {
        let raw = sample();
        let mut prev = usize::MAX;
        for t in [0.0, 0.1, 0.5, 0.75, 0.9, 1.0] {
            let count = filter_detections(&raw, t).len();
            assert!(count <= prev, "count grew when raising threshold to {t}");
            prev = count;
        }
    }

    #[test]
    fn ids_start_at_one_and_increment() {
        let kept = filter_detections(&sample(), 0.0);
        let ids: Vec<u32> = kept.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn class_names_resolved_with_unknown_fallback() {
        let raw = RawDetections {
            boxes: vec![[0.0, 0.0, 1.0, 1.0], [0.0, 0.0, 1.0, 1.0]],
            scores: vec![0.9, 0.8],
            classes: vec![18, 12],
        };
        let kept = filter_detections(&raw, 0.5);
        assert_eq!(kept[0].class_name, "dog");
        assert_eq!(kept[1].class_name, "unknown");
    }
}
