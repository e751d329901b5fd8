// marketplace/src/state.rs

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::pipelines;
use crate::store::Stores;
use keel::Keel;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub stores: Stores,
  pub keel: Arc<Keel<AppError>>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Builds the state and registers every pipeline against it.
  pub fn new(config: AppConfig, stores: Stores) -> Self {
    let keel = Arc::new(Keel::<AppError>::new());
    pipelines::register_all_pipelines(&keel);
    Self {
      stores,
      keel,
      config: Arc::new(config),
    }
  }

  /// In-memory stores with default settings.
  pub fn in_memory() -> Self {
    Self::new(AppConfig::default(), Stores::in_memory())
  }
}
