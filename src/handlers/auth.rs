use axum::{extract::Extension, http::HeaderMap, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{generate_jwt, verify_password, Claims};
use crate::database::manager::DatabaseManager;
use crate::database::models::{ApiToken, User};
use crate::error::{ApiError, FieldErrors};
use crate::middleware::auth::AuthUser;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub device_name: Option<String>,
}

/// POST /api/login - exchange credentials for a bearer token.
///
/// Wrong credentials and inactive accounts both answer 422 with a field
/// error on `email`, so the endpoint does not reveal which part failed.
pub async fn login(
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let (email, password) = validate_login(&payload)?;

    let pool = DatabaseManager::app_pool().await?;

    let user: Option<User> = sqlx::query_as(
        "SELECT id, name, email, password, is_active, created_at, updated_at FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(&pool)
    .await?;

    let user = match user {
        Some(user) if verify_password(&password, &user.password) => user,
        _ => {
            return Err(credentials_error("As credenciais informadas estão incorretas."));
        }
    };

    if !user.is_active {
        return Err(credentials_error("Sua conta está desativada."));
    }

    let device_name = payload
        .device_name
        .filter(|d| !d.trim().is_empty())
        .or_else(|| {
            headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let api_token = ApiToken::create(&pool, user.id, &device_name).await?;

    let claims = Claims::new(user.id, api_token.id, device_name);
    let token = generate_jwt(&claims).map_err(|e| {
        tracing::error!("Failed to generate JWT: {}", e);
        ApiError::internal_server_error("Erro ao gerar token de acesso.")
    })?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(json!({ "token": token, "user": user })))
}

/// GET /api/user - the authenticated user.
pub async fn user(Extension(user): Extension<User>) -> Json<Value> {
    Json(json!({ "user": user }))
}

/// POST /api/logout - revoke the current token.
pub async fn logout(Extension(auth): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::app_pool().await?;

    ApiToken::revoke(&pool, auth.token_id).await?;

    Ok(Json(json!({ "message": "Logout realizado com sucesso." })))
}

/// POST /api/logout-all - revoke every token of the authenticated user.
pub async fn logout_all(Extension(auth): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::app_pool().await?;

    ApiToken::revoke_all(&pool, auth.user_id).await?;

    Ok(Json(json!({ "message": "Todos os dispositivos foram desconectados." })))
}

fn validate_login(payload: &LoginRequest) -> Result<(String, String), ApiError> {
    let mut errors = FieldErrors::new();

    let email = payload.email.clone().unwrap_or_default();
    if email.trim().is_empty() {
        errors
            .entry("email".to_string())
            .or_default()
            .push("O campo e-mail é obrigatório.".to_string());
    } else if !email.contains('@') {
        errors
            .entry("email".to_string())
            .or_default()
            .push("O campo e-mail deve ser um endereço de e-mail válido.".to_string());
    }

    let password = payload.password.clone().unwrap_or_default();
    if password.is_empty() {
        errors
            .entry("password".to_string())
            .or_default()
            .push("O campo senha é obrigatório.".to_string());
    }

    if !errors.is_empty() {
        return Err(ApiError::validation_failed(errors));
    }

    Ok((email, password))
}

fn credentials_error(message: &str) -> ApiError {
    let mut errors = FieldErrors::new();
    errors
        .entry("email".to_string())
        .or_default()
        .push(message.to_string());
    ApiError::validation_failed(errors)
}
