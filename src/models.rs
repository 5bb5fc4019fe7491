use serde::{Deserialize, Serialize};

/// One detected object, as stored in a record's result payload.
///
/// `bbox` is the model's normalized [ymin, xmin, ymax, xmax], fractions of
/// the image dimensions. `id` counts from 1 within a single result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub id: u32,
    pub class_id: i64,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

/// The persisted payload of a processed detection record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub objects: Vec<DetectedObject>,
    pub total_objects: usize,
    pub confidence_threshold: f32,
}

/// A bounding box denormalized to pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl PixelBox {
    /// Denormalize a [ymin, xmin, ymax, xmax] fraction box to pixel
    /// coordinates. X fractions scale by width and y fractions by height
    /// independently; fractions are clamped to [0, 1] first so the result
    /// always lies inside the image.
    pub fn from_normalized(bbox: [f32; 4], width: u32, height: u32) -> Self {
        let [ymin, xmin, ymax, xmax] = bbox.map(|v| v.clamp(0.0, 1.0));
        let (ymin, ymax) = if ymin <= ymax { (ymin, ymax) } else { (ymax, ymin) };
        let (xmin, xmax) = if xmin <= xmax { (xmin, xmax) } else { (xmax, xmin) };
        Self {
            x_min: (xmin * width as f32) as u32,
            y_min: (ymin * height as f32) as u32,
            x_max: (xmax * width as f32) as u32,
            y_max: (ymax * height as f32) as u32,
        }
    }

    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denormalized_box_stays_within_image() {
        let sizes = [(640u32, 480u32), (480, 640), (1, 1), (1920, 1080)];
        let boxes = [
            [0.2, 0.3, 0.6, 0.7],
            [0.0, 0.0, 1.0, 1.0],
            [-0.5, -0.1, 1.2, 1.5],
            [0.99, 0.99, 1.0, 1.0],
        ];
        for (w, h) in sizes {
            for bbox in boxes {
                let px = PixelBox::from_normalized(bbox, w, h);
                assert!(px.x_min <= px.x_max);
                assert!(px.y_min <= px.y_max);
                assert!(px.x_max <= w);
                assert!(px.y_max <= h);
            }
        }
    }

    #[test]
    fn x_and_y_scale_independently() {
        let px = PixelBox::from_normalized([0.0, 0.0, 0.5, 0.25], 400, 200);
        assert_eq!(px.x_max, 100); // 0.25 * width
        assert_eq!(px.y_max, 100); // 0.5 * height
    }

    #[test]
    fn inverted_fractions_are_reordered() {
        let px = PixelBox::from_normalized([0.8, 0.9, 0.2, 0.1], 100, 100);
        assert!(px.x_min <= px.x_max);
        assert!(px.y_min <= px.y_max);
    }
}
