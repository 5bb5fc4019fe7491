use time::OffsetDateTime;

use super::{AppDb, format_ts, parse_ts};

/// One-to-one social extension of a user, created automatically at
/// registration.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: i64,
    pub avatar_fname: Option<String>,
    pub bio: String,
    pub website: String,
    pub facebook: String,
    pub twitter: String,
    pub linkedin: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub(super) _guard: (),
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub avatar_fname: Option<Option<String>>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub facebook: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
}

pub trait ProfileRepository {
    fn get_profile(&self, user_id: i64)
    -> impl Future<Output = anyhow::Result<Option<UserProfile>>>;
    fn update_profile(
        &self,
        profile: &UserProfile,
        update: &ProfileUpdate,
    ) -> impl Future<Output = anyhow::Result<UserProfile>>;
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: i64,
    avatar_fname: Option<String>,
    bio: String,
    website: String,
    facebook: String,
    twitter: String,
    linkedin: String,
    created_at: String,
    updated_at: String,
}

impl ProfileRow {
    fn into_profile(self) -> anyhow::Result<UserProfile> {
        Ok(UserProfile {
            user_id: self.user_id,
            avatar_fname: self.avatar_fname,
            bio: self.bio,
            website: self.website,
            facebook: self.facebook,
            twitter: self.twitter,
            linkedin: self.linkedin,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            _guard: (),
        })
    }
}

const PROFILE_COLUMNS: &str =
    "user_id, avatar_fname, bio, website, facebook, twitter, linkedin, created_at, updated_at";

impl ProfileRepository for AppDb {
    async fn get_profile(&self, user_id: i64) -> anyhow::Result<Option<UserProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profile WHERE user_id = ?1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(ProfileRow::into_profile).transpose()
    }

    async fn update_profile(
        &self,
        profile: &UserProfile,
        update: &ProfileUpdate,
    ) -> anyhow::Result<UserProfile> {
        let now = format_ts(OffsetDateTime::now_utc())?;
        let avatar_fname = match &update.avatar_fname {
            Some(value) => value.clone(),
            None => profile.avatar_fname.clone(),
        };

        let row: ProfileRow = sqlx::query_as(&format!(
            "UPDATE user_profile SET \
                avatar_fname = ?1, \
                bio = COALESCE(?2, bio), \
                website = COALESCE(?3, website), \
                facebook = COALESCE(?4, facebook), \
                twitter = COALESCE(?5, twitter), \
                linkedin = COALESCE(?6, linkedin), \
                updated_at = ?7 \
             WHERE user_id = ?8 \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(&avatar_fname)
        .bind(&update.bio)
        .bind(&update.website)
        .bind(&update.facebook)
        .bind(&update.twitter)
        .bind(&update.linkedin)
        .bind(&now)
        .bind(profile.user_id)
        .fetch_one(self.pool())
        .await?;

        row.into_profile()
    }
}
