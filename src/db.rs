use crate::config::AppConfig;
use crate::errors::AppError;
use crate::migrator::Migrator;
use metrics::{counter, histogram};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
    pub sqlx_logging: bool,
    /// PostgreSQL schema put on the `search_path` of every session
    pub schema: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(30),
            sqlx_logging: false,
            schema: None,
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
            sqlx_logging: cfg.sqlx_logging,
            schema: cfg.schema.clone(),
        }
    }
}

impl DbConfig {
    /// The schema to search, only for PostgreSQL URLs.
    pub fn search_path(&self) -> Option<&str> {
        let postgres =
            self.url.starts_with("postgres://") || self.url.starts_with("postgresql://");
        self.schema.as_deref().filter(|_| postgres)
    }
}

/// Opens the single connection the migration runs on.
///
/// Every step is sequential, so the pool is pinned to one connection. A
/// configured schema is set on the session before any statement runs, so the
/// structural step and `seaql_migrations` live there too.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, AppError> {
    debug!("Configuring database connection with: {:?}", redacted(config));

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(1)
        .min_connections(1)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(config.sqlx_logging);
    if let Some(schema) = config.search_path() {
        opt.set_schema_search_path(schema.to_string());
    }

    let db = Database::connect(opt).await.map_err(|e| {
        error!("Database connection failed: {}", e);
        AppError::DatabaseError(e)
    })?;

    info!(
        backend = ?db.get_database_backend(),
        schema = ?config.search_path(),
        "Database connection established"
    );
    Ok(db)
}

/// Establish the connection using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, AppError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Applies pending steps, at most `steps` of them when given.
pub async fn run_migrations(pool: &DbPool, steps: Option<u32>) -> Result<(), AppError> {
    check_steps(steps)?;
    info!(?steps, "Running database migrations");
    let start = Instant::now();

    let result = Migrator::up(pool, steps)
        .await
        .map_err(AppError::DatabaseError);

    record("up", start, result.is_ok());
    result
}

/// Reverts applied steps, the last one when `steps` is not given.
pub async fn revert_migrations(pool: &DbPool, steps: Option<u32>) -> Result<(), AppError> {
    check_steps(steps)?;
    info!(?steps, "Reverting database migrations");
    let start = Instant::now();

    let result = Migrator::down(pool, Some(steps.unwrap_or(1)))
        .await
        .map_err(AppError::DatabaseError);

    record("down", start, result.is_ok());
    result
}

/// `Some(0)` would be a silent no-op for `up` and `down` alike.
fn check_steps(steps: Option<u32>) -> Result<(), AppError> {
    match steps {
        Some(0) => Err(AppError::InvalidArgument(
            "--steps must be at least 1".into(),
        )),
        _ => Ok(()),
    }
}

fn record(direction: &'static str, start: Instant, ok: bool) {
    let elapsed = start.elapsed();
    histogram!(
        "order_line_migrate.migration_duration_seconds",
        elapsed.as_secs_f64(),
        "direction" => direction
    );
    if ok {
        info!("Database migrations ({}) completed in {:?}", direction, elapsed);
    } else {
        counter!("order_line_migrate.migration_failures_total", 1, "direction" => direction);
        error!("Database migrations ({}) failed after {:?}", direction, elapsed);
    }
}

/// Strips credentials from the URL for logging.
fn redacted(config: &DbConfig) -> DbConfig {
    let url = match (config.url.find("://"), config.url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***{}", &config.url[..scheme], &config.url[at..])
        }
        _ => config.url.clone(),
    };
    DbConfig {
        url,
        ..config.clone()
    }
}
