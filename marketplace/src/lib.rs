// marketplace/src/lib.rs

//! Marketplace backend: catalogue, checkout and fulfilment over pluggable storage.

pub mod config;
pub mod errors;
pub mod i18n;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod web;

pub use errors::{AppError, CheckoutError, FulfillmentError};
pub use pipelines::{place_order, ship_order, CheckoutReceipt, StaleView};
pub use state::AppState;
