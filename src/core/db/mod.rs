mod image;
mod profile;
mod session;
mod state;
mod user;

use std::path::Path;

use sqlx::SqlitePool;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

pub use image::{
    DetectionRecord, DetectionRecordRepository, HISTORY_PAGE_SIZE, NewDetectionRecord,
    ProcessedUpdate, RecordPage,
};
pub use profile::{ProfileRepository, ProfileUpdate, UserProfile};
pub use session::{PasswordResetRepository, Session, SessionRepository};
pub use user::{NewUser, User, UserRepository, UserUpdate};

/// Handle to the application database. Cheap to clone; all repositories
/// are implemented directly on it.
#[derive(Debug, Clone)]
pub struct AppDb {
    pool: SqlitePool,
}

impl AppDb {
    pub async fn connect<P: AsRef<Path>>(db_file: P) -> anyhow::Result<Self> {
        Ok(Self {
            pool: state::open_pool(db_file).await?,
        })
    }

    pub(super) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

pub(super) fn format_ts(ts: OffsetDateTime) -> anyhow::Result<String> {
    Ok(ts.format(&Rfc3339)?)
}

pub(super) fn parse_ts(raw: &str) -> anyhow::Result<OffsetDateTime> {
    Ok(OffsetDateTime::parse(raw, &Rfc3339)?)
}

pub(super) fn format_date(date: time::Date) -> anyhow::Result<String> {
    Ok(date.format(DATE_FORMAT)?)
}

/// Parse a `YYYY-MM-DD` date, as accepted in account forms.
pub fn parse_date(raw: &str) -> anyhow::Result<time::Date> {
    Ok(time::Date::parse(raw, DATE_FORMAT)?)
}
