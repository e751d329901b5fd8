// marketplace/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use keel::KeelError;

use crate::i18n::{self, Locale};
use crate::models::OrderStatus;
use crate::store::StoreError;

/// Failures of `place_order`. Validation variants are detected before any write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
  #[error("Cart is empty")]
  EmptyCart,

  #[error("Invalid quantity for product {0}")]
  InvalidQuantity(Uuid),

  #[error("Product {0} not found")]
  ProductNotFound(Uuid),

  #[error("Product {0} is not available for purchase")]
  ProductNotPurchasable(Uuid),

  #[error("Insufficient stock for product {0}")]
  InsufficientStock(Uuid),

  #[error("Storage unavailable during checkout: {0}")]
  Unavailable(String),
}

// An engine failure mid-checkout fails closed.
impl From<KeelError> for CheckoutError {
  fn from(err: KeelError) -> Self {
    CheckoutError::Unavailable(err.to_string())
  }
}

impl From<StoreError> for CheckoutError {
  fn from(err: StoreError) -> Self {
    CheckoutError::Unavailable(err.to_string())
  }
}

/// Failures of `ship_order`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FulfillmentError {
  #[error("Actor is not signed in")]
  Unauthenticated,

  #[error("Actor may not fulfil this order")]
  Unauthorized,

  #[error("Order {0} not found")]
  OrderNotFound(Uuid),

  #[error("Order cannot move from {from} to {to}")]
  InvalidTransition { from: OrderStatus, to: OrderStatus },

  #[error("Storage unavailable during fulfilment: {0}")]
  Unavailable(String),
}

impl From<KeelError> for FulfillmentError {
  fn from(err: KeelError) -> Self {
    FulfillmentError::Unavailable(err.to_string())
  }
}

impl From<StoreError> for FulfillmentError {
  fn from(err: StoreError) -> Self {
    FulfillmentError::Unavailable(err.to_string())
  }
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Unauthenticated(String),

  #[error("Forbidden: {0}")]
  Unauthorized(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Checkout Error: {0}")]
  Checkout(#[from] CheckoutError),

  #[error("Fulfilment Error: {0}")]
  Fulfillment(#[from] FulfillmentError),

  #[error("Storage Error: {0}")]
  Store(#[from] StoreError),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: KeelError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  /// Stable machine-readable code, independent of the response language.
  pub fn code(&self) -> &'static str {
    match self {
      AppError::Validation(_) => "validation_failed",
      AppError::Unauthenticated(_) => "unauthenticated",
      AppError::Unauthorized(_) => "unauthorized",
      AppError::NotFound(_) => "not_found",
      AppError::Config(_) => "configuration_error",
      AppError::Checkout(e) => match e {
        CheckoutError::EmptyCart => "empty_cart",
        CheckoutError::InvalidQuantity(_) => "invalid_quantity",
        CheckoutError::ProductNotFound(_) => "product_not_found",
        CheckoutError::ProductNotPurchasable(_) => "product_not_purchasable",
        CheckoutError::InsufficientStock(_) => "insufficient_stock",
        CheckoutError::Unavailable(_) => "unavailable",
      },
      AppError::Fulfillment(e) => match e {
        FulfillmentError::Unauthenticated => "unauthenticated",
        FulfillmentError::Unauthorized => "unauthorized",
        FulfillmentError::OrderNotFound(_) => "order_not_found",
        FulfillmentError::InvalidTransition { .. } => "invalid_transition",
        FulfillmentError::Unavailable(_) => "unavailable",
      },
      AppError::Store(StoreError::Duplicate(_)) => "duplicate",
      AppError::Store(_) => "unavailable",
      AppError::Workflow { .. } | AppError::Internal(_) => "internal_error",
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
      AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Checkout(e) => match e {
        CheckoutError::EmptyCart | CheckoutError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
        CheckoutError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        CheckoutError::ProductNotPurchasable(_) | CheckoutError::InsufficientStock(_) => StatusCode::CONFLICT,
        CheckoutError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      },
      AppError::Fulfillment(e) => match e {
        FulfillmentError::Unauthenticated => StatusCode::UNAUTHORIZED,
        FulfillmentError::Unauthorized => StatusCode::FORBIDDEN,
        FulfillmentError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        FulfillmentError::InvalidTransition { .. } => StatusCode::CONFLICT,
        FulfillmentError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      },
      AppError::Store(StoreError::Duplicate(_)) => StatusCode::CONFLICT,
      AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
      AppError::Config(_) | AppError::Workflow { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn to_response(&self, locale: Locale) -> HttpResponse {
    let status = self.status();
    // Full detail goes to the log; the client only gets the code and a localized message.
    if status.is_server_error() {
      tracing::error!(application_error = %self, code = self.code(), "Responding with error");
    } else {
      tracing::warn!(application_error = %self, code = self.code(), "Responding with error");
    }
    HttpResponse::build(status).json(json!({
      "error": self.code(),
      "message": i18n::message(self, locale),
    }))
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    self.status()
  }

  fn error_response(&self) -> HttpResponse {
    self.to_response(Locale::default())
  }
}

/// An `AppError` paired with the caller's language.
#[derive(Debug)]
pub struct LocalizedError {
  pub error: AppError,
  pub locale: Locale,
}

impl fmt::Display for LocalizedError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.error, f)
  }
}

impl ResponseError for LocalizedError {
  fn status_code(&self) -> StatusCode {
    self.error.status()
  }

  fn error_response(&self) -> HttpResponse {
    self.error.to_response(self.locale)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
