use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Centralized connection pool manager for the application database
/// (users, tokens, audit log) and the external ERP database (WinThor
/// schema). Pools are created lazily on first use.
pub struct DatabaseManager {
    pools: Arc<RwLock<HashMap<&'static str, PgPool>>>,
}

impl DatabaseManager {
    fn instance() -> &'static DatabaseManager {
        use std::sync::OnceLock;
        static INSTANCE: OnceLock<DatabaseManager> = OnceLock::new();
        INSTANCE.get_or_init(|| DatabaseManager {
            pools: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    const APP_POOL: &'static str = "app";
    const ERP_POOL: &'static str = "erp";

    /// Pool for the application's own schema (users, api_tokens, api_requests)
    pub async fn app_pool() -> Result<PgPool, DatabaseError> {
        Self::instance()
            .get_pool(Self::APP_POOL, "DATABASE_URL")
            .await
    }

    /// Pool for the WinThor ERP schema. The schema is owned by the ERP;
    /// this side only reads catalog data and writes order rows.
    pub async fn erp_pool() -> Result<PgPool, DatabaseError> {
        Self::instance()
            .get_pool(Self::ERP_POOL, "ERP_DATABASE_URL")
            .await
    }

    /// Get existing pool or create a new one lazily
    async fn get_pool(
        &self,
        name: &'static str,
        env_var: &'static str,
    ) -> Result<PgPool, DatabaseError> {
        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(name) {
                return Ok(pool.clone());
            }
        }

        let connection_string =
            std::env::var(env_var).map_err(|_| DatabaseError::ConfigMissing(env_var))?;

        // Validate up front so a malformed URL fails with a clear error
        // instead of a connect timeout; also lets us log without credentials.
        let url = url::Url::parse(&connection_string)
            .map_err(|_| DatabaseError::InvalidDatabaseUrl(env_var))?;

        let db_config = &config::config().database;
        let pool = PgPoolOptions::new()
            .max_connections(db_config.max_connections)
            .acquire_timeout(Duration::from_secs(db_config.connect_timeout_secs))
            .connect(&connection_string)
            .await?;

        {
            let mut pools = self.pools.write().await;
            pools.insert(name, pool.clone());
        }

        info!(
            "Created {} database pool: {}{}",
            name,
            url.host_str().unwrap_or("?"),
            url.path()
        );
        Ok(pool)
    }

    /// Pings the application pool to ensure connectivity
    pub async fn health_check() -> Result<(), DatabaseError> {
        let pool = Self::app_pool().await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Run pending migrations against the application database. The ERP
    /// schema is owned externally and is never migrated from here.
    pub async fn migrate() -> Result<(), DatabaseError> {
        let pool = Self::app_pool().await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Sqlx(sqlx::Error::Migrate(Box::new(e))))?;
        info!("Application database migrations up to date");
        Ok(())
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all() {
        let manager = Self::instance();
        let mut pools = manager.pools.write().await;
        for (name, pool) in pools.drain() {
            pool.close().await;
            info!("Closed database pool: {}", name);
        }
    }
}
