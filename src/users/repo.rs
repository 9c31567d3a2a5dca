use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::repo_types::{NewUser, User};

/// A write hit the unique username or email constraint. Carries the column.
#[derive(Debug, thiserror::Error)]
#[error("{0} already taken")]
pub struct Duplicate(pub &'static str);

fn map_unique(err: sqlx::Error, what: &'static str) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let column = match db.constraint() {
                Some(name) if name.contains("email") => "email",
                _ => "username",
            };
            return Duplicate(column).into();
        }
    }
    anyhow::Error::new(err).context(what)
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    /// Fails with [`Duplicate`] when the username or email is taken.
    async fn create(&self, user: &NewUser) -> anyhow::Result<User>;
    /// Writes username, email and bio. `None` when no row has `user.id`.
    /// Fails with [`Duplicate`] like `create`.
    async fn update(&self, user: &User) -> anyhow::Result<Option<OffsetDateTime>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, bio)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, bio, created_at, updated_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.bio)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique(e, "insert user"))?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, bio, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select user by id")?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, bio, created_at, updated_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("select user by username")?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> anyhow::Result<Option<OffsetDateTime>> {
        let updated_at = sqlx::query_scalar::<_, OffsetDateTime>(
            r#"
            UPDATE users
            SET username = $1, email = $2, bio = $3, updated_at = CURRENT_TIMESTAMP
            WHERE id = $4
            RETURNING updated_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.bio)
        .bind(user.id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_unique(e, "update user"))?;
        Ok(updated_at)
    }
}
