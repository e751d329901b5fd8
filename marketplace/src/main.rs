// marketplace/src/main.rs

use marketplace::config::{AppConfig, LogFormat, StorageBackend};
use marketplace::state::AppState;
use marketplace::store::{self, PgStore, Stores};
use marketplace::web::configure_app_routes;

use actix_web::{web as actix_data, App, HttpServer};
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter) // RUST_LOG overrides the default level
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
  tracing::error!(error = %err, "{}", context);
  io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

async fn build_stores(config: &AppConfig) -> io::Result<Stores> {
  match config.storage_backend {
    StorageBackend::Memory => {
      tracing::warn!("Using the in-memory storage backend; data is lost on shutdown.");
      Ok(Stores::in_memory())
    }
    StorageBackend::Postgres => {
      let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| startup_error("Database configuration error", "DATABASE_URL is not set"))?;
      let pg = PgStore::connect(url, config.database_max_connections)
        .await
        .map_err(|e| startup_error("Failed to connect to the database", e))?;
      tracing::info!("Successfully connected to the database.");
      if config.run_migrations {
        pg.migrate().await.map_err(|e| startup_error("Failed to run migrations", e))?;
        tracing::info!("Database migrations applied.");
      }
      Ok(Stores::from_backend(Arc::new(pg)))
    }
  }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
  // Configuration decides the log format, so it is loaded first and its
  // failure is reported on stderr.
  let app_config = AppConfig::from_env().map_err(|e| {
    eprintln!("Configuration error: {}", e);
    io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
  })?;
  init_tracing(app_config.log_format);
  tracing::info!(backend = ?app_config.storage_backend, "Starting marketplace server...");

  let stores = build_stores(&app_config).await?;

  if app_config.seed_db {
    store::seed::seed_demo_data(&stores)
      .await
      .map_err(|e| startup_error("Failed to seed database", e))?;
  }

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  let app_state = AppState::new(app_config, stores);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
