use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::data::{AggregationStrategy, DataMigrationOptions};
use crate::migrator::DataStepSettings;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
pub const CONFIG_DIR: &str = "config";
const DEFAULT_LANGUAGE_CODE: &str = "en";
const DEFAULT_STOCK_LOCATION_NAME: &str = "Default Stock Location";
const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

static SCHEMA_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("valid schema name pattern"));

/// Migration tool configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL (postgres://, mysql:// or sqlite://)
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Non-default PostgreSQL schema holding the tables
    #[serde(default)]
    #[validate(custom = "validate_schema_name")]
    pub schema: Option<String>,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Language code for the translations created from untranslated names
    #[serde(default = "default_language_code")]
    #[validate(length(min = 1))]
    pub language_code: String,

    #[serde(default = "default_stock_location_name")]
    #[validate(length(min = 1))]
    pub stock_location_name: String,

    #[serde(default)]
    pub aggregation: AggregationStrategy,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Log every statement through sqlx as well
    #[serde(default)]
    pub sqlx_logging: bool,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the URL.
    pub fn new(database_url: String) -> Self {
        Self {
            database_url,
            schema: None,
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            language_code: default_language_code(),
            stock_location_name: default_stock_location_name(),
            aggregation: AggregationStrategy::default(),
            db_connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
            db_acquire_timeout_secs: DEFAULT_DB_ACQUIRE_TIMEOUT_SECS,
            sqlx_logging: false,
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn data_migration_options(&self) -> DataMigrationOptions {
        DataMigrationOptions {
            language_code: self.language_code.clone(),
            stock_location_name: self.stock_location_name.clone(),
            aggregation: self.aggregation,
        }
    }

    pub fn data_step_settings(&self) -> DataStepSettings {
        DataStepSettings {
            schema: self.schema.clone(),
            options: self.data_migration_options(),
        }
    }
}

/// Values given on the command line; they win over files and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub schema: Option<String>,
    pub log_json: Option<bool>,
    pub aggregation: Option<AggregationStrategy>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_language_code() -> String {
    DEFAULT_LANGUAGE_CODE.to_string()
}

fn default_stock_location_name() -> String {
    DEFAULT_STOCK_LOCATION_NAME.to_string()
}

fn default_db_connect_timeout_secs() -> u64 {
    DEFAULT_DB_CONNECT_TIMEOUT_SECS
}

fn default_db_acquire_timeout_secs() -> u64 {
    DEFAULT_DB_ACQUIRE_TIMEOUT_SECS
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// The schema is interpolated into `SET search_path`, so only plain identifiers pass.
fn validate_schema_name(schema: &str) -> Result<(), ValidationError> {
    if SCHEMA_NAME.is_match(schema) {
        Ok(())
    } else {
        let mut err = ValidationError::new("schema");
        err.message = Some("Schema must be a plain identifier (letters, digits, _)".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!(
        "order_line_migrate={level},sea_orm_migration={level},sqlx=warn"
    );
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::new(filter_directive);

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (`{dir}/default.toml`)
/// 3. Environment-specific config (`{dir}/{env}.toml`)
/// 4. Environment variables (`APP__*`)
/// 5. Command line overrides
pub fn load_config_from(
    dir: &str,
    overrides: &ConfigOverrides,
) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(dir).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            dir
        );
    }

    let mut builder = Config::builder()
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("language_code", DEFAULT_LANGUAGE_CODE)?
        .set_default("stock_location_name", DEFAULT_STOCK_LOCATION_NAME)?
        .set_default("aggregation", AggregationStrategy::Auto.to_string())?
        .add_source(File::with_name(&format!("{}/default", dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"));

    if let Some(url) = &overrides.database_url {
        builder = builder.set_override("database_url", url.as_str())?;
    }
    if let Some(schema) = &overrides.schema {
        builder = builder.set_override("schema", schema.as_str())?;
    }
    if let Some(json) = overrides.log_json {
        builder = builder.set_override("log_json", json)?;
    }
    if let Some(aggregation) = overrides.aggregation {
        builder = builder.set_override("aggregation", aggregation.to_string())?;
    }

    let config = builder.build()?;

    if config.get_string("database_url").is_err() {
        error!("Database URL is not configured. Set APP__DATABASE_URL or pass --database-url.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "database_url is required but not configured".into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
