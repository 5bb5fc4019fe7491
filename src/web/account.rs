//! Dashboard, profile management and account lifecycle.

use axum::Json;
use axum::extract::{Multipart, State};
use serde::{Deserialize, Serialize};

use super::auth::{MessageBody, SetCookie, clear_session_header, set_session_header};
use super::extract::{ApiResult, CurrentUser, bad_request, internal, invalid, unauthorized};
use super::{AppState, ProfileBody, RecordBody, UserBody};
use crate::auth::{hash_password, verify_password};
use crate::core::db::{
    DetectionRecordRepository, ProfileRepository, ProfileUpdate, SessionRepository, UserRepository,
    UserUpdate, parse_date,
};
use crate::validate::{
    ValidationError, validate_email, validate_password, validate_phone, validate_upload,
    validate_username,
};

const DASHBOARD_RECENT: u32 = 5;

#[derive(Debug, Serialize)]
pub struct DashboardBody {
    pub user: UserBody,
    pub profile: ProfileBody,
    pub recent_uploads: Vec<RecordBody>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<DashboardBody>> {
    let profile = state
        .db
        .get_profile(current.user.id)
        .await
        .map_err(internal)?
        .ok_or_else(|| internal(anyhow::anyhow!("profile missing for user {}", current.user.id)))?;
    let recent = state
        .db
        .recent_records(current.user.id, DASHBOARD_RECENT)
        .await
        .map_err(internal)?;
    Ok(Json(DashboardBody {
        user: UserBody::from_user(&current.user),
        profile: ProfileBody::from_profile(&profile),
        recent_uploads: recent.into_iter().map(RecordBody::from_record).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ProfilePageBody {
    pub user: UserBody,
    pub profile: ProfileBody,
}

pub async fn profile(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<ProfilePageBody>> {
    let profile = state
        .db
        .get_profile(current.user.id)
        .await
        .map_err(internal)?
        .ok_or_else(|| internal(anyhow::anyhow!("profile missing for user {}", current.user.id)))?;
    Ok(Json(ProfilePageBody {
        user: UserBody::from_user(&current.user),
        profile: ProfileBody::from_profile(&profile),
    }))
}

/// Absent fields are left untouched; present fields are replaced.
#[derive(Debug, Default, Deserialize)]
pub struct AccountUpdateRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub newsletter: Option<bool>,
}

pub async fn update_account(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<AccountUpdateRequest>,
) -> ApiResult<Json<UserBody>> {
    if let Some(username) = &req.username {
        validate_username(username).map_err(invalid)?;
        if username != &current.user.username
            && state
                .db
                .get_user_by_username(username)
                .await
                .map_err(internal)?
                .is_some()
        {
            return Err(invalid(ValidationError::UsernameTaken));
        }
    }
    if let Some(email) = &req.email {
        validate_email(email).map_err(invalid)?;
        if state
            .db
            .email_taken(email, Some(current.user.id))
            .await
            .map_err(internal)?
        {
            return Err(invalid(ValidationError::EmailTaken));
        }
    }
    if let Some(phone) = &req.phone {
        validate_phone(phone).map_err(invalid)?;
    }
    let birth_date = match req.birth_date.as_deref() {
        None => None,
        Some("") => Some(None),
        Some(raw) => Some(Some(
            parse_date(raw).map_err(|_| bad_request("birth_date must be YYYY-MM-DD"))?,
        )),
    };

    let user = state
        .db
        .update_user(
            &current.user,
            &UserUpdate {
                username: req.username,
                email: req.email,
                first_name: req.first_name,
                last_name: req.last_name,
                phone: req.phone,
                birth_date,
                city: req.city,
                address: req.address,
                newsletter: req.newsletter,
            },
        )
        .await
        .map_err(internal)?;
    Ok(Json(UserBody::from_user(&user)))
}

#[derive(Debug, Default, Deserialize)]
pub struct SocialUpdateRequest {
    pub bio: Option<String>,
    pub website: Option<String>,
    pub facebook: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
}

pub async fn update_social(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<SocialUpdateRequest>,
) -> ApiResult<Json<ProfileBody>> {
    let profile = state
        .db
        .get_profile(current.user.id)
        .await
        .map_err(internal)?
        .ok_or_else(|| internal(anyhow::anyhow!("profile missing for user {}", current.user.id)))?;
    let profile = state
        .db
        .update_profile(
            &profile,
            &ProfileUpdate {
                avatar_fname: None,
                bio: req.bio,
                website: req.website,
                facebook: req.facebook,
                twitter: req.twitter,
                linkedin: req.linkedin,
            },
        )
        .await
        .map_err(internal)?;
    Ok(Json(ProfileBody::from_profile(&profile)))
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    current: CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<Json<ProfileBody>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| bad_request(err.to_string()))?
    {
        if field.name() == Some("avatar") {
            let fname = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| bad_request(err.to_string()))?;
            upload = Some((fname, bytes));
        }
    }
    let (fname, bytes) = upload.ok_or_else(|| bad_request("missing avatar field"))?;
    validate_upload(&fname, bytes.len() as u64).map_err(invalid)?;

    let stored = state
        .media
        .store_avatar(&fname, &bytes)
        .await
        .map_err(internal)?;
    let profile = state
        .db
        .get_profile(current.user.id)
        .await
        .map_err(internal)?
        .ok_or_else(|| internal(anyhow::anyhow!("profile missing for user {}", current.user.id)))?;
    let profile = state
        .db
        .update_profile(
            &profile,
            &ProfileUpdate {
                avatar_fname: Some(Some(stored)),
                ..ProfileUpdate::default()
            },
        )
        .await
        .map_err(internal)?;
    Ok(Json(ProfileBody::from_profile(&profile)))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Changing the password invalidates every other session but keeps the
/// caller logged in on a fresh one.
pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<(SetCookie, Json<MessageBody>)> {
    let hash = state
        .db
        .get_password_hash(current.user.id)
        .await
        .map_err(internal)?;
    if !verify_password(&hash, &req.old_password).map_err(internal)? {
        return Err(unauthorized("current password is incorrect"));
    }
    validate_password(&req.new_password).map_err(invalid)?;

    let new_hash = hash_password(&req.new_password).map_err(internal)?;
    state
        .db
        .set_password_hash(current.user.id, &new_hash)
        .await
        .map_err(internal)?;
    state
        .db
        .delete_user_sessions(current.user.id)
        .await
        .map_err(internal)?;
    let session = state
        .db
        .create_session(current.user.id)
        .await
        .map_err(internal)?;

    tracing::info!(user_id = current.user.id, "password changed");
    Ok((
        set_session_header(session.token),
        Json(MessageBody {
            message: "Your password has been updated.".to_string(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    #[serde(default)]
    pub confirm: bool,
}

pub async fn delete_account(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<DeleteAccountRequest>,
) -> ApiResult<(SetCookie, Json<MessageBody>)> {
    if !req.confirm {
        return Err(bad_request("account deletion must be confirmed"));
    }
    let user_id = current.user.id;
    state.db.delete_user(current.user).await.map_err(internal)?;
    tracing::info!(user_id, "account deleted");
    Ok((
        clear_session_header(),
        Json(MessageBody {
            message: "Your account has been deleted.".to_string(),
        }),
    ))
}
