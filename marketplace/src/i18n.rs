// marketplace/src/i18n.rs

//! User-facing error messages in the supported languages.

use serde::Deserialize;
use std::str::FromStr;

use crate::errors::{AppError, CheckoutError, FulfillmentError, LocalizedError};
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
  #[default]
  En,
  Ru,
}

impl Locale {
  /// Picks the first supported language of an `Accept-Language` header,
  /// ignoring quality weights.
  pub fn from_accept_language(header: &str) -> Option<Locale> {
    header
      .split(',')
      .filter_map(|part| part.split(';').next())
      .filter_map(|tag| tag.trim().split('-').next())
      .find_map(|primary| primary.parse().ok())
  }

  pub fn localize(self, error: impl Into<AppError>) -> LocalizedError {
    LocalizedError {
      error: error.into(),
      locale: self,
    }
  }
}

impl FromStr for Locale {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "en" => Ok(Locale::En),
      "ru" => Ok(Locale::Ru),
      other => Err(format!("unsupported locale '{}'", other)),
    }
  }
}

/// Message shown to the end user. Never includes storage or internal details.
pub fn message(error: &AppError, locale: Locale) -> String {
  match locale {
    Locale::En => english(error),
    Locale::Ru => russian(error),
  }
}

fn english(error: &AppError) -> String {
  match error {
    AppError::Validation(detail) => detail.clone(),
    AppError::Unauthenticated(_) | AppError::Fulfillment(FulfillmentError::Unauthenticated) => {
      "You need to sign in.".to_string()
    }
    AppError::Unauthorized(_) | AppError::Fulfillment(FulfillmentError::Unauthorized) => {
      "You are not allowed to do this.".to_string()
    }
    AppError::NotFound(_) => "Not found.".to_string(),
    AppError::Checkout(e) => match e {
      CheckoutError::EmptyCart => "Your cart is empty.".to_string(),
      CheckoutError::InvalidQuantity(id) => format!("Invalid quantity for product {}.", id),
      CheckoutError::ProductNotFound(id) => format!("Product {} was not found.", id),
      CheckoutError::ProductNotPurchasable(id) => format!("Product {} is no longer for sale.", id),
      CheckoutError::InsufficientStock(id) => format!("Not enough stock for product {}.", id),
      CheckoutError::Unavailable(_) => "Checkout is temporarily unavailable. Please try again.".to_string(),
    },
    AppError::Fulfillment(e) => match e {
      FulfillmentError::OrderNotFound(id) => format!("Order {} was not found.", id),
      FulfillmentError::InvalidTransition { from, to } => {
        format!("The order cannot change from \"{}\" to \"{}\".", from, to)
      }
      _ => "The order could not be updated. Please try again.".to_string(),
    },
    AppError::Store(StoreError::Duplicate(_)) => "This record already exists.".to_string(),
    AppError::Store(_) => "The service is temporarily unavailable. Please try again.".to_string(),
    AppError::Config(_) | AppError::Workflow { .. } | AppError::Internal(_) => "An internal error occurred.".to_string(),
  }
}

fn russian(error: &AppError) -> String {
  match error {
    // Validation details are produced in English by the validators.
    AppError::Validation(detail) => format!("Неверные данные: {}", detail),
    AppError::Unauthenticated(_) | AppError::Fulfillment(FulfillmentError::Unauthenticated) => {
      "Необходимо войти в аккаунт".to_string()
    }
    AppError::Unauthorized(_) | AppError::Fulfillment(FulfillmentError::Unauthorized) => {
      "Недостаточно прав для этого действия".to_string()
    }
    AppError::NotFound(_) => "Не найдено".to_string(),
    AppError::Checkout(e) => match e {
      CheckoutError::EmptyCart => "Корзина пуста".to_string(),
      CheckoutError::InvalidQuantity(_) => "Неверные данные корзины".to_string(),
      CheckoutError::ProductNotFound(id) => format!("Товар с ID {} не найден", id),
      CheckoutError::ProductNotPurchasable(id) => format!("Товар с ID {} недоступен для покупки", id),
      CheckoutError::InsufficientStock(id) => format!("Недостаточно товара \"{}\" на складе", id),
      CheckoutError::Unavailable(_) => "Ошибка при создании заказа, попробуйте позже".to_string(),
    },
    AppError::Fulfillment(e) => match e {
      FulfillmentError::OrderNotFound(id) => format!("Заказ {} не найден", id),
      FulfillmentError::InvalidTransition { from, to } => {
        format!("Нельзя изменить статус заказа с \"{}\" на \"{}\"", from, to)
      }
      _ => "Ошибка при обновлении статуса".to_string(),
    },
    AppError::Store(StoreError::Duplicate(_)) => "Такая запись уже существует".to_string(),
    AppError::Store(_) => "Сервис временно недоступен".to_string(),
    AppError::Config(_) | AppError::Workflow { .. } | AppError::Internal(_) => "Внутренняя ошибка сервера".to_string(),
  }
}
