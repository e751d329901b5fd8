// marketplace/src/pipelines/mod.rs

//! Defines and registers the application's pipelines.

use crate::errors::AppError;
use keel::Keel;
use std::sync::Arc;

pub mod contexts;

pub mod checkout_pipeline;
pub mod fulfillment_pipeline;
pub mod signin_pipeline;
pub mod signup_pipeline;

pub use checkout_pipeline::{place_order, CheckoutReceipt};
pub use contexts::StaleView;
pub use fulfillment_pipeline::ship_order;

/// Registers every pipeline with the registry. Called once when `AppState` is built.
pub fn register_all_pipelines(keel: &Arc<Keel<AppError>>) {
  tracing::info!("Registering pipelines...");

  signup_pipeline::register_signup_pipeline(keel);
  signin_pipeline::register_signin_pipeline(keel);
  checkout_pipeline::register_checkout_pipeline(keel);
  fulfillment_pipeline::register_fulfillment_pipeline(keel);

  tracing::info!("All application pipelines registered.");
}
