// marketplace/src/store/seed.rs

//! Demo data for local runs (`SEED_DB=true`). Safe to run repeatedly.

use tracing::{info, instrument};

use super::Stores;
use crate::errors::Result;
use crate::models::{NewProduct, NewUser, Role};
use crate::services::auth_service;

pub const DEMO_PASSWORD: &str = "password123";

const DEMO_USERS: &[(&str, &str, Role)] = &[
  ("buyer@test.com", "Demo Buyer", Role::Buyer),
  ("seller@test.com", "Demo Seller", Role::Seller),
  ("admin@test.com", "Demo Admin", Role::Admin),
];

// (title, category, price in minor units, stock)
const DEMO_PRODUCTS: &[(&str, &str, i64, i32)] = &[
  ("Vintage film camera", "electronics", 12_500, 1),
  ("Hand-knitted scarf", "clothing", 2_400, 5),
  ("Oak bookshelf", "home", 18_900, 2),
  ("Mechanical keyboard", "electronics", 9_900, 3),
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
  pub users_created: usize,
  pub products_created: usize,
}

#[instrument(name = "seed::seed_demo_data", skip(stores), err(Display))]
pub async fn seed_demo_data(stores: &Stores) -> Result<SeedReport> {
  let mut report = SeedReport::default();

  for (email, full_name, role) in DEMO_USERS {
    if stores.identity.find_user_by_email(email).await?.is_some() {
      continue;
    }
    let user = stores
      .identity
      .create_user(NewUser {
        email: email.to_string(),
        password_hash: auth_service::hash_password(DEMO_PASSWORD)?,
        full_name: Some(full_name.to_string()),
        role: *role,
      })
      .await?;
    info!(user_id = %user.id, %email, "Seeded demo user.");
    report.users_created += 1;
  }

  if let Some(seller) = stores.identity.find_user_by_email("seller@test.com").await? {
    if stores.catalog.products_for_seller(seller.id).await?.is_empty() {
      for (title, category, price, stock) in DEMO_PRODUCTS {
        let product = NewProduct {
          title: title.to_string(),
          description: None,
          price: *price,
          category: Some(category.to_string()),
          images: Vec::new(),
          stock: *stock,
        };
        stores.catalog.insert_product(seller.id, &product).await?;
        report.products_created += 1;
      }
    }
  }

  info!(?report, "Demo data seeding finished.");
  Ok(report)
}
