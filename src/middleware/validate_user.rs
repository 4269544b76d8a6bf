use axum::{extract::Request, middleware::Next, response::Response};

use super::auth::AuthUser;
use crate::database::manager::DatabaseManager;
use crate::database::models::{ApiToken, User};
use crate::error::ApiError;

/// Middleware that validates the JWT claims against the database:
/// the token row must still exist (logout deletes it) and the account
/// must be active. An inactive account has its current token revoked
/// on the spot, mirroring the panel's behavior.
pub async fn validate_user_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| {
            tracing::error!("validate_user ran without jwt_auth in front of it");
            ApiError::unauthorized("Unauthenticated.")
        })?
        .clone();

    let pool = DatabaseManager::app_pool().await.map_err(|e| {
        tracing::error!("App database unavailable during user validation: {}", e);
        ApiError::service_unavailable("Serviço indisponível. Tente novamente mais tarde.")
    })?;

    let user: Option<User> = sqlx::query_as(
        r#"
        SELECT u.id, u.name, u.email, u.password, u.is_active, u.created_at, u.updated_at
        FROM api_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.id = $1 AND u.id = $2
        "#,
    )
    .bind(auth_user.token_id)
    .bind(auth_user.user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Database error validating token {}: {}", auth_user.token_id, e);
        ApiError::service_unavailable("Serviço indisponível. Tente novamente mais tarde.")
    })?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Unauthenticated."))?;

    if !user.is_active {
        // Revoke the token so the account stays locked out even if the
        // flag is flipped back later with the old JWT still around.
        if let Err(e) = ApiToken::revoke(&pool, auth_user.token_id).await {
            tracing::warn!("Failed to revoke token for inactive user {}: {}", user.id, e);
        }
        tracing::warn!(user_id = %user.id, "Rejected request from inactive account");
        return Err(ApiError::unauthorized("Sua conta está desativada."));
    }

    if let Err(e) = ApiToken::touch(&pool, auth_user.token_id).await {
        tracing::warn!("Failed to touch last_used_at for token {}: {}", auth_user.token_id, e);
    }

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
