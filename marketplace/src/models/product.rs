// marketplace/src/models/product.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "product_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
  Active,
  Sold,
  Draft,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: Uuid,
  pub seller_id: Uuid,
  pub title: String,
  pub description: Option<String>,
  /// Minor currency units.
  pub price: i64,
  pub stock: i32,
  pub category: Option<String>,
  pub images: Vec<String>,
  pub status: ProductStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Product {
  pub fn is_purchasable(&self) -> bool {
    self.status == ProductStatus::Active
  }
}

fn default_stock() -> i32 {
  1
}

/// Seller input for a new listing. Image URLs point at object storage and are kept opaque.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
  pub title: String,
  pub description: Option<String>,
  pub price: i64,
  pub category: Option<String>,
  #[serde(default)]
  pub images: Vec<String>,
  #[serde(default = "default_stock")]
  pub stock: i32,
}

impl NewProduct {
  pub fn validate(&self) -> Result<(), AppError> {
    if self.title.trim().is_empty() {
      return Err(AppError::Validation("Title is required.".to_string()));
    }
    if self.price < 0 {
      return Err(AppError::Validation("Price must not be negative.".to_string()));
    }
    if self.stock < 0 {
      return Err(AppError::Validation("Stock must not be negative.".to_string()));
    }
    Ok(())
  }
}

/// Catalogue query: exact category match and case-insensitive title search.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
  pub category: Option<String>,
  #[serde(rename = "q")]
  pub query: Option<String>,
}

impl ProductFilter {
  /// Status is not considered here; callers list active products only.
  pub fn matches(&self, product: &Product) -> bool {
    let category_ok = match self.category.as_deref().filter(|c| !c.is_empty()) {
      Some(category) => product.category.as_deref() == Some(category),
      None => true,
    };
    let query_ok = match self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
      Some(q) => product.title.to_lowercase().contains(&q.to_lowercase()),
      None => true,
    };
    category_ok && query_ok
  }

  /// `%term%` pattern for ILIKE, or `None` when no search term was given.
  pub fn like_pattern(&self) -> Option<String> {
    self
      .query
      .as_deref()
      .map(str::trim)
      .filter(|q| !q.is_empty())
      .map(|q| format!("%{}%", q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn product(title: &str, category: Option<&str>) -> Product {
    Product {
      id: Uuid::new_v4(),
      seller_id: Uuid::new_v4(),
      title: title.to_string(),
      description: None,
      price: 100,
      stock: 1,
      category: category.map(str::to_string),
      images: vec![],
      status: ProductStatus::Active,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[test]
  fn filter_matches_category_and_case_insensitive_title() {
    let filter = ProductFilter {
      category: Some("books".to_string()),
      query: Some("RUST".to_string()),
    };
    assert!(filter.matches(&product("Programming Rust", Some("books"))));
    assert!(!filter.matches(&product("Programming Rust", Some("music"))));
    assert!(!filter.matches(&product("Go in Action", Some("books"))));
    assert!(ProductFilter::default().matches(&product("anything", None)));
  }

  #[test]
  fn like_pattern_escapes_wildcards() {
    let filter = ProductFilter {
      category: None,
      query: Some(" 50%_off ".to_string()),
    };
    assert_eq!(filter.like_pattern().as_deref(), Some("%50\\%\\_off%"));
    assert_eq!(ProductFilter::default().like_pattern(), None);
  }

  #[test]
  fn new_product_validation() {
    let mut input = NewProduct {
      title: "Lamp".to_string(),
      description: None,
      price: 0,
      category: None,
      images: vec![],
      stock: 0,
    };
    assert!(input.validate().is_ok());
    input.price = -1;
    assert!(matches!(input.validate(), Err(AppError::Validation(_))));
    input.price = 10;
    input.title = "  ".to_string();
    assert!(matches!(input.validate(), Err(AppError::Validation(_))));
  }
}
