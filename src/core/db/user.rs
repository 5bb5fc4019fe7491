use time::{Date, OffsetDateTime};

use super::{AppDb, format_date, format_ts, parse_date, parse_ts};

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub birth_date: Option<Date>,
    pub city: String,
    pub address: String,
    pub is_verified: bool,
    pub newsletter: bool,
    pub terms_accepted: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub(super) _guard: (),
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub birth_date: Option<Date>,
    pub city: String,
    pub address: String,
    pub newsletter: bool,
    pub terms_accepted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<Option<Date>>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub newsletter: Option<bool>,
}

pub trait UserRepository {
    /// Insert the user and its empty profile row in one transaction.
    fn add_user(&self, user: &NewUser) -> impl Future<Output = anyhow::Result<User>>;
    fn get_user_by_id(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<User>>>;
    fn get_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = anyhow::Result<Option<User>>>;
    fn get_user_by_email(&self, email: &str)
    -> impl Future<Output = anyhow::Result<Option<User>>>;
    fn email_taken(
        &self,
        email: &str,
        exclude_user: Option<i64>,
    ) -> impl Future<Output = anyhow::Result<bool>>;
    fn update_user(
        &self,
        user: &User,
        update: &UserUpdate,
    ) -> impl Future<Output = anyhow::Result<User>>;
    fn get_password_hash(&self, user_id: i64) -> impl Future<Output = anyhow::Result<String>>;
    fn set_password_hash(
        &self,
        user_id: i64,
        hash: &str,
    ) -> impl Future<Output = anyhow::Result<()>>;
    /// Deletes the user; profiles, sessions, reset tokens and detection
    /// records go with it via FK cascades.
    fn delete_user(&self, user: User) -> impl Future<Output = anyhow::Result<()>>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    phone: String,
    birth_date: Option<String>,
    city: String,
    address: String,
    is_verified: bool,
    newsletter: bool,
    terms_accepted: bool,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn into_user(self) -> anyhow::Result<User> {
        Ok(User {
            id: self.id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            birth_date: self.birth_date.as_deref().map(parse_date).transpose()?,
            city: self.city,
            address: self.address,
            is_verified: self.is_verified,
            newsletter: self.newsletter,
            terms_accepted: self.terms_accepted,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            _guard: (),
        })
    }
}

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, phone, birth_date, \
     city, address, is_verified, newsletter, terms_accepted, created_at, updated_at";

impl UserRepository for AppDb {
    async fn add_user(&self, user: &NewUser) -> anyhow::Result<User> {
        let now = format_ts(OffsetDateTime::now_utc())?;
        let birth_date = user.birth_date.map(format_date).transpose()?;

        let mut tx = self.pool().begin().await?;
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO user \
             (username, email, password_hash, first_name, last_name, phone, birth_date, \
              city, address, newsletter, terms_accepted, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(&birth_date)
        .bind(&user.city)
        .bind(&user.address)
        .bind(user.newsletter)
        .bind(user.terms_accepted)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO user_profile (user_id, created_at, updated_at) VALUES (?1, ?2, ?2)",
        )
        .bind(row.id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        row.into_user()
    }

    async fn get_user_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM user WHERE id = ?1"))
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn get_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM user WHERE username = ?1"))
                .bind(username)
                .fetch_optional(self.pool())
                .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM user WHERE email = ?1"))
                .bind(email)
                .fetch_optional(self.pool())
                .await?;
        row.map(UserRow::into_user).transpose()
    }

    async fn email_taken(&self, email: &str, exclude_user: Option<i64>) -> anyhow::Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user WHERE email = ?1 AND (?2 IS NULL OR id != ?2))",
        )
        .bind(email)
        .bind(exclude_user)
        .fetch_one(self.pool())
        .await?;
        Ok(taken)
    }

    async fn update_user(&self, user: &User, update: &UserUpdate) -> anyhow::Result<User> {
        let now = format_ts(OffsetDateTime::now_utc())?;
        let birth_date = match &update.birth_date {
            Some(value) => value.map(format_date).transpose()?,
            None => user.birth_date.map(format_date).transpose()?,
        };

        let row: UserRow = sqlx::query_as(&format!(
            "UPDATE user SET \
                username = COALESCE(?1, username), \
                email = COALESCE(?2, email), \
                first_name = COALESCE(?3, first_name), \
                last_name = COALESCE(?4, last_name), \
                phone = COALESCE(?5, phone), \
                birth_date = ?6, \
                city = COALESCE(?7, city), \
                address = COALESCE(?8, address), \
                newsletter = COALESCE(?9, newsletter), \
                updated_at = ?10 \
             WHERE id = ?11 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&update.username)
        .bind(&update.email)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.phone)
        .bind(&birth_date)
        .bind(&update.city)
        .bind(&update.address)
        .bind(update.newsletter)
        .bind(&now)
        .bind(user.id)
        .fetch_one(self.pool())
        .await?;

        row.into_user()
    }

    async fn get_password_hash(&self, user_id: i64) -> anyhow::Result<String> {
        let hash: String = sqlx::query_scalar("SELECT password_hash FROM user WHERE id = ?1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await?;
        Ok(hash)
    }

    async fn set_password_hash(&self, user_id: i64, hash: &str) -> anyhow::Result<()> {
        let now = format_ts(OffsetDateTime::now_utc())?;
        sqlx::query("UPDATE user SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(hash)
            .bind(&now)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn delete_user(&self, user: User) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM user WHERE id = ?1")
            .bind(user.id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
