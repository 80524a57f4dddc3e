use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Server-side session row.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: i64,
    pub csrf_token: String,
    pub remember: bool,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, record: &SessionRecord) -> anyhow::Result<()>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<SessionRecord>>;
    /// Returns whether a row was removed; deleting a missing id is not an error.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, record: &SessionRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, csrf_token, remember, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.csrf_token)
        .bind(record.remember)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<SessionRecord>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, user_id, csrf_token, remember, expires_at, created_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(record)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
