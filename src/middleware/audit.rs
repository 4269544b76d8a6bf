use std::time::Instant;

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header::CONTENT_LENGTH, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::{json, Map, Value};

use super::auth::AuthUser;
use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::models::ApiRequestLog;

/// Header names whose values are never stored.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "x-csrf-token", "x-xsrf-token"];

/// Body field names masked recursively before storage.
const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "password_confirmation",
    "current_password",
    "token",
    "secret",
    "api_key",
];

const REDACTED: &str = "[REDACTED]";

/// Records every request/response pair to the `api_requests` table.
/// Runs outside authentication, so unauthenticated calls are audited
/// too; caller identity is picked up from the response extensions when
/// the auth middleware ran. The insert happens off the request path and
/// is never allowed to fail the request itself.
pub async fn audit_log_middleware(request: Request, next: Next) -> Response {
    let audit = &config::config().audit;
    if !audit.enabled {
        return next.run(request).await;
    }

    let started = Instant::now();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query_params = request.uri().query().map(parse_query);
    let headers = redact_headers(request.headers());
    let user_agent = header_value(request.headers(), "user-agent");
    let ip_address =
        header_value(request.headers(), "x-forwarded-for").unwrap_or_else(|| "unknown".to_string());

    // Buffer the request body so it can be logged and replayed to the
    // handler. Bodies whose declared size exceeds the cap (or is absent)
    // pass through unbuffered and are not captured.
    let (request, request_body) = if capturable(request.headers(), audit.max_body_bytes) {
        let (parts, body) = request.into_parts();
        let body_bytes = match to_bytes(body, audit.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to buffer request body for audit: {}", e);
                Default::default()
            }
        };
        let captured = capture_json(&body_bytes, audit.max_body_bytes);
        (Request::from_parts(parts, Body::from(body_bytes)), captured)
    } else {
        (request, None)
    };

    let response = next.run(request).await;

    let response_time_ms = started.elapsed().as_millis() as i32;
    let status_code = response.status().as_u16() as i32;
    let auth_user = response.extensions().get::<AuthUser>().cloned();

    // Buffer the response body the same way
    let (response, response_body) = if capturable(response.headers(), audit.max_body_bytes) {
        let (parts, body) = response.into_parts();
        let body_bytes = match to_bytes(body, audit.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to buffer response body for audit: {}", e);
                Default::default()
            }
        };
        let captured = capture_json(&body_bytes, audit.max_body_bytes);
        (Response::from_parts(parts, Body::from(body_bytes)), captured)
    } else {
        (response, None)
    };

    let entry = ApiRequestLog {
        user_id: auth_user.as_ref().map(|u| u.user_id),
        method,
        path,
        ip_address,
        user_agent,
        headers,
        query_params,
        request_body,
        status_code,
        response_body,
        response_time_ms,
        device_name: auth_user.as_ref().map(|u| u.device.clone()),
        token_id: auth_user.as_ref().map(|u| u.token_id),
    };

    tokio::spawn(async move {
        match DatabaseManager::app_pool().await {
            Ok(pool) => {
                if let Err(e) = entry.insert(&pool).await {
                    tracing::warn!("Failed to write audit log entry: {}", e);
                }
            }
            Err(e) => tracing::warn!("Audit log skipped, app database unavailable: {}", e),
        }
    });

    response
}

/// A body is worth buffering only when its declared `content-length`
/// fits the capture cap. Chunked bodies carry no length and are never
/// buffered, so a streaming upload or download cannot pin memory.
fn capturable(headers: &HeaderMap, max_bytes: usize) -> bool {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len > 0 && len <= max_bytes)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Headers as a JSON object with sensitive values replaced.
fn redact_headers(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        let key = name.as_str().to_string();
        if SENSITIVE_HEADERS.contains(&key.as_str()) {
            map.insert(key, json!(REDACTED));
        } else {
            map.insert(key, json!(value.to_str().unwrap_or(REDACTED)));
        }
    }
    Value::Object(map)
}

fn parse_query(query: &str) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        map.insert(key.into_owned(), json!(value.into_owned()));
    }
    mask_sensitive(Value::Object(map))
}

/// Parse a JSON body for storage; oversized or non-JSON bodies are
/// dropped rather than stored raw.
fn capture_json(bytes: &[u8], max_bytes: usize) -> Option<Value> {
    if bytes.is_empty() || bytes.len() > max_bytes {
        return None;
    }
    serde_json::from_slice::<Value>(bytes).ok().map(mask_sensitive)
}

/// Recursively replace values of sensitive fields with the redaction
/// marker.
fn mask_sensitive(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    if SENSITIVE_FIELDS.contains(&key.to_lowercase().as_str()) {
                        (key, json!(REDACTED))
                    } else {
                        (key, mask_sensitive(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(mask_sensitive).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn authorization_header_is_redacted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer secret"));
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let redacted = redact_headers(&headers);
        assert_eq!(redacted["authorization"], REDACTED);
        assert_eq!(redacted["accept"], "application/json");
    }

    #[test]
    fn sensitive_fields_are_masked_recursively() {
        let body = json!({
            "email": "a@b.com",
            "password": "hunter2",
            "nested": { "api_key": "xyz", "ok": 1 },
            "list": [{ "token": "t" }]
        });

        let masked = mask_sensitive(body);
        assert_eq!(masked["email"], "a@b.com");
        assert_eq!(masked["password"], REDACTED);
        assert_eq!(masked["nested"]["api_key"], REDACTED);
        assert_eq!(masked["nested"]["ok"], 1);
        assert_eq!(masked["list"][0]["token"], REDACTED);
    }

    #[test]
    fn field_masking_is_case_insensitive() {
        let masked = mask_sensitive(json!({ "Password": "x" }));
        assert_eq!(masked["Password"], REDACTED);
    }

    #[test]
    fn oversized_bodies_are_not_captured() {
        let big = vec![b'a'; 64];
        assert!(capture_json(&big, 10).is_none());
    }

    #[test]
    fn buffering_is_gated_on_declared_length() {
        let mut headers = HeaderMap::new();
        assert!(!capturable(&headers, 1000), "no content-length");

        headers.insert("content-length", HeaderValue::from_static("64"));
        assert!(capturable(&headers, 1000));
        assert!(!capturable(&headers, 10), "declared length above the cap");

        headers.insert("content-length", HeaderValue::from_static("0"));
        assert!(!capturable(&headers, 1000), "empty body");

        headers.insert("content-length", HeaderValue::from_static("garbage"));
        assert!(!capturable(&headers, 1000));
    }

    #[test]
    fn non_json_bodies_are_dropped() {
        assert!(capture_json(b"not json", 1000).is_none());
        assert!(capture_json(b"", 1000).is_none());
    }

    #[test]
    fn query_string_is_parsed_and_masked() {
        let parsed = parse_query("codauxiliar=789&token=abc");
        assert_eq!(parsed["codauxiliar"], "789");
        assert_eq!(parsed["token"], REDACTED);
    }
}
