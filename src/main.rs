use axum::{routing::get, routing::post, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use winthor_gateway::config;
use winthor_gateway::database::manager::DatabaseManager;
use winthor_gateway::handlers::{auth, pedidos, produtos};
use winthor_gateway::middleware::audit::audit_log_middleware;
use winthor_gateway::middleware::auth::jwt_auth_middleware;
use winthor_gateway::middleware::validate_user::validate_user_middleware;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, ERP_DATABASE_URL, JWT_SECRET
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting WinThor gateway in {:?} mode", config.environment);

    // App schema migrations; a missing database only degrades /health,
    // so the server still boots and reports it instead of crashing.
    if let Err(e) = DatabaseManager::migrate().await {
        tracing::warn!("Application database migrations skipped: {}", e);
    }

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("WinThor gateway listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(api_routes())
        // Global middleware
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// The audited API surface: one public login route plus the protected
/// ERP proxy routes. Layers run outermost-first: audit, then JWT, then
/// database-backed user validation.
fn api_routes() -> Router {
    let protected = Router::new()
        .route("/api/user", get(auth::user))
        .route("/api/logout", post(auth::logout))
        .route("/api/logout-all", post(auth::logout_all))
        .route("/api/produtos/consulta-cadastro", get(produtos::consulta_cadastro))
        .route("/api/produtos/consulta-estoque", get(produtos::consulta_estoque))
        .route("/api/produtos/consulta-preco", get(produtos::consulta_preco))
        .route("/api/pedidos", post(pedidos::criar))
        .layer(axum::middleware::from_fn(validate_user_middleware))
        .layer(axum::middleware::from_fn(jwt_auth_middleware));

    Router::new()
        .route("/api/login", post(auth::login))
        .merge(protected)
        .layer(axum::middleware::from_fn(audit_log_middleware))
}

fn cors_layer() -> CorsLayer {
    let origins = &config::config().security.cors_origins;
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let parsed: Vec<axum::http::HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "name": "WinThor Gateway",
        "version": version,
        "description": "JSON API gateway for the WinThor ERP",
        "endpoints": {
            "login": "POST /api/login (public)",
            "user": "GET /api/user (protected)",
            "logout": "POST /api/logout, /api/logout-all (protected)",
            "produtos": "GET /api/produtos/consulta-{cadastro,estoque,preco} (protected)",
            "pedidos": "POST /api/pedidos (protected)",
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "status": "degraded",
                "timestamp": now,
                "database_error": e.to_string()
            })),
        ),
    }
}
