use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;

use crate::error::AppError;
use crate::lifecycle::Role;
use crate::session::{Session, SessionStore, SessionUser};

pub async fn get_db_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sessions (
            chat_id BIGINT PRIMARY KEY,
            token TEXT NOT NULL,
            user_id TEXT NOT NULL,
            email TEXT NOT NULL,
            full_name TEXT,
            role TEXT NOT NULL,
            issued_at TIMESTAMPTZ NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

/// Sessions kept in Postgres so a bot restart does not log everyone out.
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        PgSessionStore { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, chat_id: i64) -> Result<Option<Session>, AppError> {
        let row = sqlx::query(
            "SELECT token, user_id, email, full_name, role, issued_at, expires_at
             FROM sessions WHERE chat_id = $1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role: String = row.try_get("role")?;
        let Some(role) = Role::parse(&role) else {
            // Unreadable row, treat as logged out.
            self.clear(chat_id).await?;
            return Ok(None);
        };

        Ok(Some(Session {
            token: row.try_get("token")?,
            user: SessionUser {
                id: row.try_get("user_id")?,
                email: row.try_get("email")?,
                full_name: row.try_get("full_name")?,
                role,
            },
            issued_at: row.try_get::<OffsetDateTime, _>("issued_at")?,
            expires_at: row.try_get::<OffsetDateTime, _>("expires_at")?,
        }))
    }

    async fn save(&self, chat_id: i64, session: &Session) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO sessions (chat_id, token, user_id, email, full_name, role, issued_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (chat_id) DO UPDATE
             SET token = $2, user_id = $3, email = $4, full_name = $5, role = $6,
                 issued_at = $7, expires_at = $8",
        )
        .bind(chat_id)
        .bind(&session.token)
        .bind(&session.user.id)
        .bind(&session.user.email)
        .bind(&session.user.full_name)
        .bind(session.user.role.as_str())
        .bind(session.issued_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self, chat_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE chat_id = $1")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
