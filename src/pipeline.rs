use std::sync::Arc;
use std::time::Instant;

use ab_glyph::FontArc;
use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::db::{
    AppDb, DetectionRecord, DetectionRecordRepository, ProcessedUpdate,
};
use crate::core::media::MediaStore;
use crate::detection::{Detector, annotate::annotate, filter_detections};
use crate::models::{DetectedObject, DetectionReport};

/// Why a pipeline run failed. Every failure aborts the run and leaves the
/// record unprocessed; callers branch on the variant for user messaging.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not decode the uploaded image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("object detection failed: {0}")]
    Inference(#[source] anyhow::Error),
    #[error("could not store the result: {0}")]
    Io(#[source] anyhow::Error),
}

/// In-memory result of one pipeline run, before persistence.
pub struct PipelineRun {
    pub objects: Vec<DetectedObject>,
    pub annotated: RgbImage,
    pub elapsed_seconds: f64,
}

/// Decode an arbitrary-format compressed image to an RGB pixel grid.
/// Alpha channels are dropped here, which is the 3-channel truncation the
/// model input requires.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    let img = image::load_from_memory(bytes).map_err(PipelineError::Decode)?;
    Ok(img.to_rgb8())
}

/// Run the full detection pipeline on raw image bytes:
/// decode, infer, filter by threshold, annotate.
pub fn run_detection(
    detector: &dyn Detector,
    bytes: &[u8],
    threshold: f32,
    font: Option<&FontArc>,
) -> Result<PipelineRun, PipelineError> {
    let started = Instant::now();
    let image = decode_image(bytes)?;
    let raw = detector.detect(&image).map_err(PipelineError::Inference)?;
    let objects = filter_detections(&raw, threshold);
    let annotated = annotate(&image, &objects, font);
    Ok(PipelineRun {
        objects,
        annotated,
        elapsed_seconds: started.elapsed().as_secs_f64(),
    })
}

/// What processing a record produced.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// No record with that id belongs to the user.
    NotFound,
    /// Both processed fields were already set; the stored result is
    /// returned untouched and the pipeline is not run again.
    AlreadyProcessed(DetectionRecord),
    Processed(DetectionRecord),
}

/// Process one detection record end to end: load the original, run the
/// model, write the annotated image, and attach the results to the record
/// in a single final update. Pipeline failures are reported as
/// [`PipelineError`] values inside the error chain.
pub async fn process_record(
    db: &AppDb,
    media: &MediaStore,
    detector: Arc<dyn Detector>,
    font: Option<FontArc>,
    user_id: i64,
    record_id: i64,
    threshold: f32,
) -> anyhow::Result<ProcessOutcome> {
    let Some(record) = db.get_record(user_id, record_id).await? else {
        return Ok(ProcessOutcome::NotFound);
    };
    if record.is_processed() {
        return Ok(ProcessOutcome::AlreadyProcessed(record));
    }

    let started = Instant::now();
    let bytes = media
        .load_original(&record.original_fname)
        .await
        .map_err(PipelineError::Io)?;

    let model = detector.name().to_string();
    let run = tokio::task::spawn_blocking(move || {
        run_detection(detector.as_ref(), &bytes, threshold, font.as_ref())
    })
    .await?;
    let run = match run {
        Ok(run) => run,
        Err(err) => {
            warn!(record_id, %err, "detection pipeline failed");
            return Err(err.into());
        }
    };

    let processed_fname = media
        .store_processed(record.id, &run.annotated)
        .map_err(PipelineError::Io)?;

    let report = DetectionReport {
        total_objects: run.objects.len(),
        objects: run.objects,
        confidence_threshold: threshold,
    };
    let update = ProcessedUpdate {
        processed_fname,
        report,
        processing_time: started.elapsed().as_secs_f64(),
    };
    let record = db.mark_processed(&record, &update).await?;

    info!(
        record_id = record.id,
        model,
        objects = record.objects_detected,
        elapsed_seconds = record.processing_time,
        "detection complete"
    );
    Ok(ProcessOutcome::Processed(record))
}
