use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::{AppDb, User, UserRepository, format_ts, parse_ts};

const SESSION_TTL: Duration = Duration::days(14);
const RESET_TOKEN_TTL: Duration = Duration::hours(1);

#[derive(Debug, Clone)]
pub struct Session {
    pub token: Uuid,
    pub user_id: i64,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub(super) _guard: (),
}

pub trait SessionRepository {
    fn create_session(&self, user_id: i64) -> impl Future<Output = anyhow::Result<Session>>;
    /// Resolve a session token to its user, ignoring expired sessions.
    fn get_session_user(&self, token: Uuid)
    -> impl Future<Output = anyhow::Result<Option<User>>>;
    fn delete_session(&self, token: Uuid) -> impl Future<Output = anyhow::Result<()>>;
    fn delete_user_sessions(&self, user_id: i64) -> impl Future<Output = anyhow::Result<()>>;
}

pub trait PasswordResetRepository {
    /// Issue a fresh single-use reset token.
    fn create_reset_token(&self, user_id: i64) -> impl Future<Output = anyhow::Result<Uuid>>;
    /// Burn a token and return its user id. `None` for unknown, expired
    /// or already-used tokens.
    fn consume_reset_token(
        &self,
        token: Uuid,
    ) -> impl Future<Output = anyhow::Result<Option<i64>>>;
}

impl SessionRepository for AppDb {
    async fn create_session(&self, user_id: i64) -> anyhow::Result<Session> {
        let token = Uuid::new_v4();
        let created_at = OffsetDateTime::now_utc();
        let expires_at = created_at + SESSION_TTL;
        sqlx::query(
            "INSERT INTO session (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(token.to_string())
        .bind(user_id)
        .bind(format_ts(created_at)?)
        .bind(format_ts(expires_at)?)
        .execute(self.pool())
        .await?;
        Ok(Session {
            token,
            user_id,
            created_at,
            expires_at,
            _guard: (),
        })
    }

    async fn get_session_user(&self, token: Uuid) -> anyhow::Result<Option<User>> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT user_id, expires_at FROM session WHERE token = ?1")
                .bind(token.to_string())
                .fetch_optional(self.pool())
                .await?;
        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };
        if parse_ts(&expires_at)? <= OffsetDateTime::now_utc() {
            self.delete_session(token).await?;
            return Ok(None);
        }
        self.get_user_by_id(user_id).await
    }

    async fn delete_session(&self, token: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM session WHERE token = ?1")
            .bind(token.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: i64) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM session WHERE user_id = ?1")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

impl PasswordResetRepository for AppDb {
    async fn create_reset_token(&self, user_id: i64) -> anyhow::Result<Uuid> {
        let token = Uuid::new_v4();
        let created_at = OffsetDateTime::now_utc();
        let expires_at = created_at + RESET_TOKEN_TTL;
        sqlx::query(
            "INSERT INTO password_reset_token (token, user_id, created_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(token.to_string())
        .bind(user_id)
        .bind(format_ts(created_at)?)
        .bind(format_ts(expires_at)?)
        .execute(self.pool())
        .await?;
        Ok(token)
    }

    async fn consume_reset_token(&self, token: Uuid) -> anyhow::Result<Option<i64>> {
        let now = format_ts(OffsetDateTime::now_utc())?;
        let user_id: Option<i64> = sqlx::query_scalar(
            "UPDATE password_reset_token SET used = 1 \
             WHERE token = ?1 AND used = 0 AND expires_at > ?2 \
             RETURNING user_id",
        )
        .bind(token.to_string())
        .bind(&now)
        .fetch_optional(self.pool())
        .await?;
        Ok(user_id)
    }
}
