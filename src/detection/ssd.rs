use std::path::Path;

use anyhow::Context;
use image::RgbImage;
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use super::{Detector, RawDetections};

/// Side length the exported detection graph was frozen with.
const INPUT_SIZE: u32 = 320;

/// Output tensor names in the SSD MobileNet V2 ONNX export.
const OUTPUT_NAMES: [&str; 3] = ["detection_boxes", "detection_scores", "detection_classes"];

type OnnxPlan = TypedRunnableModel<TypedModel>;

/// SSD MobileNet V2 backend. Loads the ONNX export once and runs it through
/// tract; the plan is immutable after load so one instance serves every
/// request. The export's postprocessing graph already applies NMS and emits
/// normalized boxes, so detections map back to the original image without
/// any coordinate fixup despite the fixed-size input resize.
pub struct SsdMobileNet {
    plan: OnnxPlan,
}

impl SsdMobileNet {
    /// Load the detection model from an ONNX file.
    pub fn load<P: AsRef<Path>>(model_path: P) -> anyhow::Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.is_file() {
            anyhow::bail!(
                "detection model not found at {}.\n\
                 Export SSD MobileNet V2 to ONNX (e.g. with tf2onnx) and point \
                 --model / SPOTTER_MODEL at the file.",
                model_path.display()
            );
        }

        let mut model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to read ONNX model {}", model_path.display()))?;
        model.set_output_names(OUTPUT_NAMES)?;
        let plan = model
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    u8::datum_type(),
                    tvec!(1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3),
                ),
            )?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { plan })
    }

    /// Resize to the frozen input shape and lay the pixels out as a
    /// batched [1, H, W, 3] u8 tensor.
    fn tensorize(image: &RgbImage) -> Tensor {
        let resized = image::imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        tract_ndarray::Array4::from_shape_fn(
            (1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3),
            |(_, y, x, c)| resized.get_pixel(x as u32, y as u32)[c],
        )
        .into()
    }
}

impl Detector for SsdMobileNet {
    fn detect(&self, image: &RgbImage) -> anyhow::Result<RawDetections> {
        let input = Self::tensorize(image);
        let outputs = self
            .plan
            .run(tvec!(input.into_tvalue()))
            .context("detection model run failed")?;

        // Adapter boundary: everything past here is typed. The export emits
        // boxes [1, N, 4], scores [1, N] and float class ids [1, N].
        let boxes = outputs[0]
            .to_array_view::<f32>()
            .context("detection_boxes output has unexpected type")?;
        let scores = outputs[1]
            .to_array_view::<f32>()
            .context("detection_scores output has unexpected type")?;
        let classes = outputs[2]
            .to_array_view::<f32>()
            .context("detection_classes output has unexpected type")?;

        let slots = scores.shape().get(1).copied().unwrap_or(0);
        let mut raw = RawDetections::default();
        for i in 0..slots {
            raw.boxes.push([
                boxes[[0, i, 0]],
                boxes[[0, i, 1]],
                boxes[[0, i, 2]],
                boxes[[0, i, 3]],
            ]);
            raw.scores.push(scores[[0, i]]);
            raw.classes.push(classes[[0, i]] as i64);
        }
        Ok(raw)
    }

    fn name(&self) -> &str {
        "ssd_mobilenet_v2"
    }
}
