//! HTTP surface. JSON in, JSON out; session state lives in a cookie
//! backed by the session table.

pub mod account;
pub mod auth;
pub mod detect;
pub mod extract;

use std::sync::Arc;

use ab_glyph::FontArc;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::db::{AppDb, DetectionRecord, User, UserProfile};
use crate::core::media::MediaStore;
use crate::detection::Detector;
use crate::validate::MAX_UPLOAD_BYTES;

/// Slack on top of the upload cap for multipart framing overhead.
const MAX_BODY_BYTES: usize = MAX_UPLOAD_BYTES as usize + 2 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: AppDb,
    pub media: MediaStore,
    pub detector: Arc<dyn Detector>,
    pub label_font: Option<FontArc>,
    pub confidence_threshold: f32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/password-reset", post(auth::reset_request))
        .route("/password-reset/done", get(auth::reset_done))
        .route("/password-reset/confirm/:token", post(auth::reset_confirm))
        .route("/password-reset/complete", get(auth::reset_complete))
        .route("/dashboard", get(account::dashboard))
        .route("/profile", get(account::profile).put(account::update_account))
        .route("/profile/social", put(account::update_social))
        .route("/profile/avatar", post(account::upload_avatar))
        .route("/profile/password", post(account::change_password))
        .route("/account/delete", post(account::delete_account))
        .route("/detect", post(detect::upload))
        .route("/detect/history", get(detect::history))
        .route("/detect/:id", get(detect::detail))
        .route("/detect/:id/process", post(detect::process))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

fn fmt_ts(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_default()
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub birth_date: Option<String>,
    pub city: String,
    pub address: String,
    pub is_verified: bool,
    pub newsletter: bool,
    pub created_at: String,
}

impl UserBody {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
            birth_date: user.birth_date.map(|d| d.to_string()),
            city: user.city.clone(),
            address: user.address.clone(),
            is_verified: user.is_verified,
            newsletter: user.newsletter,
            created_at: fmt_ts(user.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileBody {
    pub bio: String,
    pub website: String,
    pub facebook: String,
    pub twitter: String,
    pub linkedin: String,
    pub avatar: Option<String>,
}

impl ProfileBody {
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            bio: profile.bio.clone(),
            website: profile.website.clone(),
            facebook: profile.facebook.clone(),
            twitter: profile.twitter.clone(),
            linkedin: profile.linkedin.clone(),
            avatar: profile
                .avatar_fname
                .as_ref()
                .map(|f| format!("/media/avatars/{f}")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordBody {
    pub id: i64,
    pub original_image: String,
    pub processed_image: Option<String>,
    pub detection_results: Option<crate::models::DetectionReport>,
    pub objects_detected: i64,
    pub processing_time: f64,
    pub uploaded_at: String,
    pub processed_at: Option<String>,
}

impl RecordBody {
    pub fn from_record(record: DetectionRecord) -> Self {
        Self {
            id: record.id,
            original_image: format!("/media/original/{}", record.original_fname),
            processed_image: record
                .processed_fname
                .map(|f| format!("/media/processed/{f}")),
            detection_results: record.detection_results,
            objects_detected: record.objects_detected,
            processing_time: record.processing_time,
            uploaded_at: fmt_ts(record.uploaded_at),
            processed_at: record.processed_at.map(fmt_ts),
        }
    }
}
