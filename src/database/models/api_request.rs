use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseError;

/// One audited API call, written by the audit middleware after the
/// response has been produced. Headers and bodies arrive here already
/// redacted.
#[derive(Debug, Clone)]
pub struct ApiRequestLog {
    pub user_id: Option<Uuid>,
    pub method: String,
    pub path: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub headers: Value,
    pub query_params: Option<Value>,
    pub request_body: Option<Value>,
    pub status_code: i32,
    pub response_body: Option<Value>,
    pub response_time_ms: i32,
    pub device_name: Option<String>,
    pub token_id: Option<Uuid>,
}

impl ApiRequestLog {
    pub async fn insert(&self, pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO api_requests (
                user_id, method, path, ip_address, user_agent,
                headers, query_params, request_body,
                status_code, response_body, response_time_ms,
                device_name, token_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(self.user_id)
        .bind(&self.method)
        .bind(&self.path)
        .bind(&self.ip_address)
        .bind(&self.user_agent)
        .bind(&self.headers)
        .bind(&self.query_params)
        .bind(&self.request_body)
        .bind(self.status_code)
        .bind(&self.response_body)
        .bind(self.response_time_ms)
        .bind(&self.device_name)
        .bind(self.token_id)
        .execute(pool)
        .await?;

        Ok(())
    }
}
