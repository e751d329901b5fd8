// marketplace/tests/fulfillment_tests.rs

mod common;

use common::{test_app, TestApp};
use marketplace::models::{CartLine, OrderStatus, Role, User};
use marketplace::store::{CatalogStore, OrderLedger};
use marketplace::{place_order, ship_order, FulfillmentError};
use uuid::Uuid;

/// A paid order from a fresh buyer for one product of `seller`.
async fn paid_order(app: &TestApp, seller: &User) -> Uuid {
  let buyer = app.user(Role::Buyer).await;
  let product = app.product(seller, 1200, 3).await;
  place_order(
    &app.state,
    buyer.id,
    vec![CartLine {
      product_id: product.id,
      quantity: 1,
    }],
  )
  .await
  .unwrap()
  .order_id
}

async fn status_of(app: &TestApp, order_id: Uuid) -> OrderStatus {
  app.store.inner.get_order(order_id).await.unwrap().unwrap().status
}

#[tokio::test]
async fn seller_ships_a_paid_order_once() {
  let app = test_app();
  let seller = app.user(Role::Seller).await;
  let order_id = paid_order(&app, &seller).await;

  ship_order(&app.state, seller.id, order_id).await.unwrap();
  assert_eq!(status_of(&app, order_id).await, OrderStatus::Shipped);

  let err = ship_order(&app.state, seller.id, order_id).await.unwrap_err();
  assert_eq!(
    err,
    FulfillmentError::InvalidTransition {
      from: OrderStatus::Shipped,
      to: OrderStatus::Shipped
    }
  );
  assert_eq!(status_of(&app, order_id).await, OrderStatus::Shipped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ship_calls_succeed_exactly_once() {
  let app = test_app();
  let seller = app.user(Role::Seller).await;
  let order_id = paid_order(&app, &seller).await;

  let mut handles = Vec::new();
  for _ in 0..5 {
    let state = app.state.clone();
    let seller_id = seller.id;
    handles.push(tokio::spawn(async move { ship_order(&state, seller_id, order_id).await }));
  }

  let mut successes = 0;
  for handle in handles {
    match handle.await.unwrap() {
      Ok(()) => successes += 1,
      Err(e) => assert!(matches!(e, FulfillmentError::InvalidTransition { .. }), "unexpected {:?}", e),
    }
  }
  assert_eq!(successes, 1);
}

#[tokio::test]
async fn other_sellers_and_buyers_cannot_ship() {
  let app = test_app();
  let seller = app.user(Role::Seller).await;
  let other_seller = app.user(Role::Seller).await;
  let buyer = app.user(Role::Buyer).await;
  let admin = app.user(Role::Admin).await;
  let order_id = paid_order(&app, &seller).await;

  for actor in [&other_seller, &buyer, &admin] {
    assert_eq!(
      ship_order(&app.state, actor.id, order_id).await,
      Err(FulfillmentError::Unauthorized)
    );
  }
  assert_eq!(status_of(&app, order_id).await, OrderStatus::Paid);
}

#[tokio::test]
async fn unknown_actor_is_unauthenticated() {
  let app = test_app();
  let seller = app.user(Role::Seller).await;
  let order_id = paid_order(&app, &seller).await;

  assert_eq!(
    ship_order(&app.state, Uuid::new_v4(), order_id).await,
    Err(FulfillmentError::Unauthenticated)
  );
}

#[tokio::test]
async fn missing_order_is_reported() {
  let app = test_app();
  let seller = app.user(Role::Seller).await;
  let missing = Uuid::new_v4();

  assert_eq!(
    ship_order(&app.state, seller.id, missing).await,
    Err(FulfillmentError::OrderNotFound(missing))
  );
}

#[tokio::test]
async fn only_paid_orders_can_ship() {
  let app = test_app();
  let seller = app.user(Role::Seller).await;
  let order_id = paid_order(&app, &seller).await;
  // Walk the order back to pending to simulate an unpaid order.
  assert!(app
    .store
    .inner
    .update_order_status(order_id, OrderStatus::Paid, OrderStatus::Pending)
    .await
    .unwrap());

  assert_eq!(
    ship_order(&app.state, seller.id, order_id).await,
    Err(FulfillmentError::InvalidTransition {
      from: OrderStatus::Pending,
      to: OrderStatus::Shipped
    })
  );
}

#[tokio::test]
async fn seller_keeps_shipping_rights_after_deleting_the_product() {
  let app = test_app();
  let seller = app.user(Role::Seller).await;
  let order_id = paid_order(&app, &seller).await;

  let items = app.store.inner.order_items(order_id).await.unwrap();
  let product_id = items[0].product_id.unwrap();
  assert!(app.store.inner.delete_product(product_id).await.unwrap());

  ship_order(&app.state, seller.id, order_id).await.unwrap();
  assert_eq!(status_of(&app, order_id).await, OrderStatus::Shipped);
}
