use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

/// Server-side record of an issued bearer token. Deleting the row
/// revokes the token regardless of its JWT expiry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiToken {
    /// Issues a token row for a user/device pair.
    pub async fn create(pool: &PgPool, user_id: Uuid, name: &str) -> Result<Self, DatabaseError> {
        let token = sqlx::query_as::<_, ApiToken>(
            r#"
            INSERT INTO api_tokens (id, user_id, name)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, name, last_used_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .fetch_one(pool)
        .await?;

        Ok(token)
    }

    /// Revokes a single token (logout).
    pub async fn revoke(pool: &PgPool, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM api_tokens WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Revokes every token of a user (logout from all devices).
    pub async fn revoke_all(pool: &PgPool, user_id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM api_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Stamps the token as just used.
    pub async fn touch(pool: &PgPool, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE api_tokens SET last_used_at = now() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
