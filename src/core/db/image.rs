use time::OffsetDateTime;

use super::{AppDb, format_ts, parse_ts};
use crate::models::DetectionReport;

/// History pagination size, newest first.
pub const HISTORY_PAGE_SIZE: u32 = 10;

/// One detection request/result pair. Unprocessed records have neither a
/// processed image nor a results payload; processed records have both and
/// are never mutated again.
#[derive(Debug, Clone)]
pub struct DetectionRecord {
    pub id: i64,
    pub user_id: i64,
    pub original_fname: String,
    pub processed_fname: Option<String>,
    pub detection_results: Option<DetectionReport>,
    pub objects_detected: i64,
    pub processing_time: f64,
    pub uploaded_at: OffsetDateTime,
    pub processed_at: Option<OffsetDateTime>,
    pub(super) _guard: (),
}

impl DetectionRecord {
    pub fn is_processed(&self) -> bool {
        self.processed_fname.is_some() && self.detection_results.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewDetectionRecord {
    pub user_id: i64,
    pub original_fname: String,
}

/// The single mutation a record ever receives.
#[derive(Debug, Clone)]
pub struct ProcessedUpdate {
    pub processed_fname: String,
    pub report: DetectionReport,
    pub processing_time: f64,
}

#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<DetectionRecord>,
    pub page: u32,
    pub total_pages: u32,
    pub total_records: u64,
}

pub trait DetectionRecordRepository {
    fn add_record(
        &self,
        record: &NewDetectionRecord,
    ) -> impl Future<Output = anyhow::Result<DetectionRecord>>;
    /// Fetch a record only if it belongs to the given user.
    fn get_record(
        &self,
        user_id: i64,
        id: i64,
    ) -> impl Future<Output = anyhow::Result<Option<DetectionRecord>>>;
    fn recent_records(
        &self,
        user_id: i64,
        limit: u32,
    ) -> impl Future<Output = anyhow::Result<Vec<DetectionRecord>>>;
    fn record_page(
        &self,
        user_id: i64,
        page: u32,
    ) -> impl Future<Output = anyhow::Result<RecordPage>>;
    /// Attach the processed output to an unprocessed record. Fails if the
    /// record was already processed; the guard WHERE clause makes the write
    /// first-wins under concurrent attempts.
    fn mark_processed(
        &self,
        record: &DetectionRecord,
        update: &ProcessedUpdate,
    ) -> impl Future<Output = anyhow::Result<DetectionRecord>>;
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: i64,
    user_id: i64,
    original_fname: String,
    processed_fname: Option<String>,
    detection_results: Option<String>,
    objects_detected: i64,
    processing_time: f64,
    uploaded_at: String,
    processed_at: Option<String>,
}

impl RecordRow {
    fn into_record(self) -> anyhow::Result<DetectionRecord> {
        let detection_results = self
            .detection_results
            .as_deref()
            .map(serde_json::from_str::<DetectionReport>)
            .transpose()?;
        Ok(DetectionRecord {
            id: self.id,
            user_id: self.user_id,
            original_fname: self.original_fname,
            processed_fname: self.processed_fname,
            detection_results,
            objects_detected: self.objects_detected,
            processing_time: self.processing_time,
            uploaded_at: parse_ts(&self.uploaded_at)?,
            processed_at: self.processed_at.as_deref().map(parse_ts).transpose()?,
            _guard: (),
        })
    }
}

const RECORD_COLUMNS: &str = "id, user_id, original_fname, processed_fname, detection_results, \
     objects_detected, processing_time, uploaded_at, processed_at";

impl DetectionRecordRepository for AppDb {
    async fn add_record(&self, record: &NewDetectionRecord) -> anyhow::Result<DetectionRecord> {
        let now = format_ts(OffsetDateTime::now_utc())?;
        let row: RecordRow = sqlx::query_as(&format!(
            "INSERT INTO detection_image (user_id, original_fname, uploaded_at) \
             VALUES (?1, ?2, ?3) \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(record.user_id)
        .bind(&record.original_fname)
        .bind(&now)
        .fetch_one(self.pool())
        .await?;
        row.into_record()
    }

    async fn get_record(&self, user_id: i64, id: i64) -> anyhow::Result<Option<DetectionRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM detection_image WHERE id = ?1 AND user_id = ?2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(RecordRow::into_record).transpose()
    }

    async fn recent_records(
        &self,
        user_id: i64,
        limit: u32,
    ) -> anyhow::Result<Vec<DetectionRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM detection_image \
             WHERE user_id = ?1 \
             ORDER BY id DESC \
             LIMIT ?2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(RecordRow::into_record).collect()
    }

    async fn record_page(&self, user_id: i64, page: u32) -> anyhow::Result<RecordPage> {
        let page = page.max(1);
        let total_records: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM detection_image WHERE user_id = ?1")
                .bind(user_id)
                .fetch_one(self.pool())
                .await?;
        let total_records = total_records as u64;
        let total_pages = (total_records.div_ceil(HISTORY_PAGE_SIZE as u64) as u32).max(1);

        let offset = (page as u64 - 1) * HISTORY_PAGE_SIZE as u64;
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM detection_image \
             WHERE user_id = ?1 \
             ORDER BY id DESC \
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(user_id)
        .bind(HISTORY_PAGE_SIZE)
        .bind(offset as i64)
        .fetch_all(self.pool())
        .await?;

        Ok(RecordPage {
            records: rows
                .into_iter()
                .map(RecordRow::into_record)
                .collect::<anyhow::Result<_>>()?,
            page,
            total_pages,
            total_records,
        })
    }

    async fn mark_processed(
        &self,
        record: &DetectionRecord,
        update: &ProcessedUpdate,
    ) -> anyhow::Result<DetectionRecord> {
        let now = format_ts(OffsetDateTime::now_utc())?;
        let payload = serde_json::to_string(&update.report)?;
        let objects_detected = update.report.total_objects as i64;

        let row: Option<RecordRow> = sqlx::query_as(&format!(
            "UPDATE detection_image SET \
                processed_fname = ?1, \
                detection_results = ?2, \
                objects_detected = ?3, \
                processing_time = ?4, \
                processed_at = ?5 \
             WHERE id = ?6 AND user_id = ?7 AND processed_fname IS NULL \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(&update.processed_fname)
        .bind(&payload)
        .bind(objects_detected)
        .bind(update.processing_time)
        .bind(&now)
        .bind(record.id)
        .bind(record.user_id)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => row.into_record(),
            None => Err(anyhow::anyhow!(
                "detection record {} is already processed",
                record.id
            )),
        }
    }
}
