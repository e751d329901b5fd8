// marketplace/tests/postgres_tests.rs

//! Checkout against a real database. Run with
//! `DATABASE_URL=postgres://... cargo test --test postgres_tests -- --ignored`.

mod common;

use std::sync::Arc;

use common::setup_tracing;
use marketplace::config::AppConfig;
use marketplace::models::{CartLine, NewProduct, NewUser, OrderItem, OrderStatus, Product, Role, User};
use marketplace::state::AppState;
use marketplace::store::{CatalogStore, CheckoutUnit, DecrementOutcome, IdentityStore, OrderLedger, PgStore, Stores};
use marketplace::{place_order, CheckoutError};
use uuid::Uuid;

async fn connect() -> (Arc<PgStore>, AppState) {
  setup_tracing();
  let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for PostgreSQL tests");
  let store = PgStore::connect(&url, 16).await.expect("connect");
  store.migrate().await.expect("migrate");
  let store = Arc::new(store);
  let state = AppState::new(AppConfig::default(), Stores::from_backend(store.clone()));
  (store, state)
}

async fn user(store: &PgStore, role: Role) -> User {
  store
    .create_user(NewUser {
      email: format!("{}@pg.test", Uuid::new_v4()),
      password_hash: "unused".to_string(),
      full_name: None,
      role,
    })
    .await
    .expect("create user")
}

async fn product(store: &PgStore, seller: &User, price: i64, stock: i32) -> Product {
  store
    .insert_product(
      seller.id,
      &NewProduct {
        title: "Pg product".to_string(),
        description: None,
        price,
        category: None,
        images: vec![],
        stock,
      },
    )
    .await
    .expect("insert product")
}

async fn stock_of(store: &PgStore, id: Uuid) -> i32 {
  store.get_product(id).await.unwrap().unwrap().stock
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore = "Requires PostgreSQL"]
async fn concurrent_checkouts_never_oversell() {
  let (store, state) = connect().await;
  let seller = user(&store, Role::Seller).await;
  let stock = 5;
  let product_id = product(&store, &seller, 700, stock).await.id;

  let mut handles = Vec::new();
  for i in 0..12 {
    let buyer = user(&store, Role::Buyer).await;
    let state = state.clone();
    let quantity = 1 + (i % 2);
    handles.push(tokio::spawn(async move {
      place_order(&state, buyer.id, vec![CartLine { product_id, quantity }])
        .await
        .map(|_| quantity)
    }));
  }

  let mut sold = 0;
  for handle in handles {
    match handle.await.unwrap() {
      Ok(quantity) => sold += quantity,
      Err(e) => assert_eq!(e, CheckoutError::InsufficientStock(product_id)),
    }
  }

  assert!(sold <= stock);
  assert_eq!(stock_of(&store, product_id).await, stock - sold);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn order_items_are_written_with_the_order() {
  let (store, state) = connect().await;
  let seller = user(&store, Role::Seller).await;
  let buyer = user(&store, Role::Buyer).await;
  let lamp = product(&store, &seller, 1500, 4).await;
  let rug = product(&store, &seller, 250, 9).await;

  let receipt = place_order(
    &state,
    buyer.id,
    vec![
      CartLine {
        product_id: lamp.id,
        quantity: 2,
      },
      CartLine {
        product_id: rug.id,
        quantity: 3,
      },
    ],
  )
  .await
  .unwrap();

  let order = store.get_order(receipt.order_id).await.unwrap().unwrap();
  let items = store.order_items(receipt.order_id).await.unwrap();
  assert_eq!(order.status, OrderStatus::Paid);
  assert_eq!(items.len(), 2);
  assert!(items.iter().all(|i| i.seller_id == seller.id));
  assert_eq!(order.total_amount, 3750);
  assert_eq!(order.total_amount, items.iter().map(OrderItem::line_total).sum::<i64>());
  assert_eq!(stock_of(&store, lamp.id).await, 2);
  assert_eq!(stock_of(&store, rug.id).await, 6);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn rolled_back_unit_leaves_no_rows() {
  let (store, _state) = connect().await;
  let seller = user(&store, Role::Seller).await;
  let buyer = user(&store, Role::Buyer).await;
  let lamp = product(&store, &seller, 1500, 4).await;

  let mut unit = store.begin_checkout().await.unwrap();
  assert_eq!(
    unit.conditional_decrement_stock(lamp.id, 3).await.unwrap(),
    DecrementOutcome::Applied { remaining: 1 }
  );
  let order = unit.insert_order(buyer.id, 4500, OrderStatus::Paid).await.unwrap();
  unit.rollback().await.unwrap();

  let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE id = $1")
    .bind(order.id)
    .fetch_one(store.pool())
    .await
    .unwrap();
  assert_eq!(orders, 0);
  assert_eq!(stock_of(&store, lamp.id).await, 4);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn decrement_reports_why_it_did_not_apply() {
  let (store, _state) = connect().await;
  let seller = user(&store, Role::Seller).await;
  let lamp = product(&store, &seller, 1500, 1).await;

  let mut unit = store.begin_checkout().await.unwrap();
  assert_eq!(
    unit.conditional_decrement_stock(lamp.id, 2).await.unwrap(),
    DecrementOutcome::InsufficientStock { available: 1 }
  );
  assert_eq!(
    unit.conditional_decrement_stock(Uuid::new_v4(), 1).await.unwrap(),
    DecrementOutcome::NotFound
  );
  unit.rollback().await.unwrap();
}
