use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use uuid::Uuid;

use crate::auth::Claims;
use crate::config;
use crate::error::ApiError;

/// Authenticated caller context extracted from the bearer JWT. The
/// token row is verified against the database by the user-validation
/// middleware that runs after this one.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub token_id: Uuid,
    pub device: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            token_id: claims.token_id,
            device: claims.device,
        }
    }
}

/// JWT authentication middleware that validates tokens and injects the
/// caller context. The context is mirrored into the response extensions
/// so the audit middleware (which runs outside of auth) can attribute
/// the request.
pub async fn jwt_auth_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers)?;
    let claims = validate_jwt(&token)?;

    let auth_user = AuthUser::from(claims);
    request.extensions_mut().insert(auth_user.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(auth_user);
    Ok(response)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| ApiError::unauthorized("Unauthenticated."))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Unauthenticated."))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.to_string()),
        _ => Err(ApiError::unauthorized("Unauthenticated.")),
    }
}

/// Validate JWT token and extract claims
fn validate_jwt(token: &str) -> Result<Claims, ApiError> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        tracing::error!("JWT secret not configured");
        return Err(ApiError::unauthorized("Unauthenticated."));
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|_| ApiError::unauthorized("Unauthenticated."))?;

    Ok(token_data.claims)
}
