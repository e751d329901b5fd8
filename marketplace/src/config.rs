// marketplace/src/config.rs

use crate::errors::{AppError, Result};
use crate::i18n::Locale;
use crate::services::retry::RetryPolicy;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
  Postgres,
  Memory,
}

impl FromStr for StorageBackend {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
      "memory" | "in-memory" => Ok(StorageBackend::Memory),
      other => Err(AppError::Config(format!("Unknown STORAGE_BACKEND '{}'", other))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub storage_backend: StorageBackend,
  pub database_url: Option<String>,
  pub database_max_connections: u32,
  pub run_migrations: bool,
  pub seed_db: bool,
  pub checkout_retry_max_attempts: u32,
  pub checkout_retry_backoff_ms: u64,
  pub default_locale: Locale,
  pub log_format: LogFormat,
}

impl Default for AppConfig {
  /// In-memory settings, used by tests.
  fn default() -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 8080,
      storage_backend: StorageBackend::Memory,
      database_url: None,
      database_max_connections: 10,
      run_migrations: false,
      seed_db: false,
      checkout_retry_max_attempts: 3,
      checkout_retry_backoff_ms: 50,
      default_locale: Locale::En,
      log_format: LogFormat::Pretty,
    }
  }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  let raw = env::var(name).unwrap_or_else(|_| default.to_string());
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", name, raw, e)))
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let storage_backend: StorageBackend = parse_var("STORAGE_BACKEND", "postgres")?;
    let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());
    if storage_backend == StorageBackend::Postgres && database_url.is_none() {
      return Err(AppError::Config(
        "Missing environment variable 'DATABASE_URL' (required for the postgres backend)".to_string(),
      ));
    }

    let log_format = match env::var("LOG_FORMAT").unwrap_or_default().trim().to_ascii_lowercase().as_str() {
      "json" => LogFormat::Json,
      "" | "pretty" => LogFormat::Pretty,
      other => return Err(AppError::Config(format!("Invalid LOG_FORMAT value '{}'", other))),
    };

    let default_locale = env::var("DEFAULT_LOCALE")
      .unwrap_or_else(|_| "en".to_string())
      .parse::<Locale>()
      .map_err(|e| AppError::Config(format!("Invalid DEFAULT_LOCALE: {}", e)))?;

    Ok(Self {
      server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
      server_port: parse_var("SERVER_PORT", "8080")?,
      storage_backend,
      database_url,
      database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", "10")?,
      run_migrations: parse_var("RUN_MIGRATIONS", "true")?,
      seed_db: parse_var("SEED_DB", "false")?,
      checkout_retry_max_attempts: parse_var("CHECKOUT_RETRY_MAX_ATTEMPTS", "3")?,
      checkout_retry_backoff_ms: parse_var("CHECKOUT_RETRY_BACKOFF_MS", "50")?,
      default_locale,
      log_format,
    })
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy::new(
      self.checkout_retry_max_attempts,
      Duration::from_millis(self.checkout_retry_backoff_ms),
    )
  }
}
