//! Upload, process, history and detail endpoints for detection records.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::extract::{ApiResult, CurrentUser, bad_request, internal, invalid, not_found};
use super::{AppState, RecordBody};
use crate::core::db::{DetectionRecordRepository, NewDetectionRecord};
use crate::pipeline::{PipelineError, ProcessOutcome, process_record};
use crate::validate::validate_upload;

#[derive(Debug, Serialize)]
pub struct UploadBody {
    pub message: String,
    pub record: RecordBody,
}

pub async fn upload(
    State(state): State<AppState>,
    current: CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadBody>)> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| bad_request(err.to_string()))?
    {
        if field.name() == Some("image") {
            let fname = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| bad_request(err.to_string()))?;
            upload = Some((fname, bytes));
        }
    }
    let (fname, bytes) = upload.ok_or_else(|| bad_request("missing image field"))?;
    validate_upload(&fname, bytes.len() as u64).map_err(invalid)?;

    let stored = state
        .media
        .store_original(&fname, &bytes)
        .await
        .map_err(internal)?;
    let record = state
        .db
        .add_record(&NewDetectionRecord {
            user_id: current.user.id,
            original_fname: stored,
        })
        .await
        .map_err(internal)?;

    tracing::info!(user_id = current.user.id, record_id = record.id, "image uploaded");
    Ok((
        StatusCode::CREATED,
        Json(UploadBody {
            message: "Image uploaded. Run detection to see the results.".to_string(),
            record: RecordBody::from_record(record),
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct ProcessBody {
    pub message: String,
    pub record: RecordBody,
}

pub async fn process(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProcessBody>> {
    let outcome = process_record(
        &state.db,
        &state.media,
        state.detector.clone(),
        state.label_font.clone(),
        current.user.id,
        id,
        state.confidence_threshold,
    )
    .await
    .map_err(|err| match err.downcast::<PipelineError>() {
        Ok(pipeline) => match pipeline {
            PipelineError::Decode(_) => bad_request(pipeline.to_string()),
            PipelineError::Inference(_) | PipelineError::Io(_) => internal(pipeline.into()),
        },
        Err(other) => internal(other),
    })?;

    match outcome {
        ProcessOutcome::NotFound => Err(not_found("detection record not found")),
        ProcessOutcome::AlreadyProcessed(record) => Ok(Json(ProcessBody {
            message: "This image was already processed.".to_string(),
            record: RecordBody::from_record(record),
        })),
        ProcessOutcome::Processed(record) => Ok(Json(ProcessBody {
            message: format!("Detection finished: {} object(s) found.", record.objects_detected),
            record: RecordBody::from_record(record),
        })),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct HistoryBody {
    pub records: Vec<RecordBody>,
    pub page: u32,
    pub total_pages: u32,
    pub total_records: u64,
}

pub async fn history(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryBody>> {
    let page = state
        .db
        .record_page(current.user.id, query.page.unwrap_or(1))
        .await
        .map_err(internal)?;
    Ok(Json(HistoryBody {
        records: page
            .records
            .into_iter()
            .map(RecordBody::from_record)
            .collect(),
        page: page.page,
        total_pages: page.total_pages,
        total_records: page.total_records,
    }))
}

pub async fn detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<RecordBody>> {
    let record = state
        .db
        .get_record(current.user.id, id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("detection record not found"))?;
    Ok(Json(RecordBody::from_record(record)))
}
