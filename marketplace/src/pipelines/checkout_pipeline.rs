// marketplace/src/pipelines/checkout_pipeline.rs

//! Order placement.
//!
//! Steps: validate and merge the cart, price it from one catalogue read, open
//! a checkout unit, take stock with conditional decrements, record the order
//! and its items, commit, and finally report which read views went stale.
//! All writes go through the unit, so the only compensation is discarding it:
//! until `commit` succeeds nothing is durable, and a rollback that cannot
//! reach storage still leaves no partial order or missing stock behind.

use keel::{ContextData, Keel, Pipeline, PipelineControl, PipelineResult};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, CheckoutError};
use crate::models::{CartLine, NewOrderItem, OrderStatus, Product};
use crate::pipelines::contexts::{CheckoutCtxData, PricedLine, StaleView};
use crate::state::AppState;
use crate::store::{CheckoutUnit, DecrementOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
  pub order_id: Uuid,
  pub total_amount: i64,
  pub stale_views: Vec<StaleView>,
}

/// Sums quantities of lines naming the same product, keeping first-seen order.
pub fn merge_lines(lines: &[CartLine]) -> Result<Vec<CartLine>, CheckoutError> {
  if lines.is_empty() {
    return Err(CheckoutError::EmptyCart);
  }
  let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
  for line in lines {
    if line.quantity <= 0 {
      return Err(CheckoutError::InvalidQuantity(line.product_id));
    }
    match merged.iter_mut().find(|m| m.product_id == line.product_id) {
      Some(existing) => {
        existing.quantity = existing
          .quantity
          .checked_add(line.quantity)
          .ok_or(CheckoutError::InvalidQuantity(line.product_id))?;
      }
      None => merged.push(*line),
    }
  }
  Ok(merged)
}

/// Prices merged lines against the products read for them and returns the
/// priced lines with the order total. The stock check here is optimistic;
/// the decrement is what enforces it.
pub fn price_lines(lines: &[CartLine], products: &[Product]) -> Result<(Vec<PricedLine>, i64), CheckoutError> {
  let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();
  let mut priced = Vec::with_capacity(lines.len());
  let mut total: i64 = 0;

  for line in lines {
    let product = by_id
      .get(&line.product_id)
      .ok_or(CheckoutError::ProductNotFound(line.product_id))?;
    if !product.is_purchasable() {
      return Err(CheckoutError::ProductNotPurchasable(product.id));
    }
    if product.stock < line.quantity {
      return Err(CheckoutError::InsufficientStock(product.id));
    }
    total = product
      .price
      .checked_mul(i64::from(line.quantity))
      .and_then(|line_total| total.checked_add(line_total))
      .ok_or(CheckoutError::InvalidQuantity(product.id))?;
    priced.push(PricedLine {
      product_id: product.id,
      seller_id: product.seller_id,
      quantity: line.quantity,
      unit_price: product.price,
    });
  }
  Ok((priced, total))
}

fn stale_views_for(buyer_id: Uuid, priced: &[PricedLine]) -> Vec<StaleView> {
  let sellers: BTreeSet<Uuid> = priced.iter().map(|line| line.seller_id).collect();
  std::iter::once(StaleView::BuyerOrders { buyer_id })
    .chain(sellers.into_iter().map(|seller_id| StaleView::SellerOrders { seller_id }))
    .collect()
}

fn unit_missing() -> CheckoutError {
  CheckoutError::Unavailable("checkout unit is not open".to_string())
}

pub fn register_checkout_pipeline(keel: &Arc<Keel<AppError>>) {
  let mut p = Pipeline::<CheckoutCtxData, CheckoutError>::new(&[
    ("validate_cart", false, None),
    ("price_cart", false, None),
    ("open_checkout", false, None),
    ("reserve_stock", false, None),
    ("record_order", false, None),
    ("record_order_items", false, None),
    ("commit_checkout", false, None),
    ("collect_stale_views", true, None),
  ]);

  // Step 1: Reject empty carts and bad quantities before touching storage.
  p.on_root("validate_cart", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let merged = merge_lines(&guard.lines)?;
      debug!(submitted = guard.lines.len(), merged = merged.len(), "Cart validated.");
      guard.lines = merged;
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    })
  });

  // Step 2: One catalogue read; prices are snapshotted here.
  p.on_root("price_cart", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (catalog, lines) = {
        let guard = ctx_data.read();
        (guard.app_state.stores.catalog.clone(), guard.lines.clone())
      };
      let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
      let products = catalog.get_products_by_ids(&ids).await?;
      let (priced, total) = price_lines(&lines, &products)?;
      {
        let mut guard = ctx_data.write();
        guard.priced = priced;
        guard.total_amount = total;
      }
      debug!(total, "Cart priced.");
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    })
  });

  // Step 3: Nothing has been written yet, so opening the unit may be retried.
  p.on_root("open_checkout", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (ledger, policy, slot) = {
        let guard = ctx_data.read();
        (
          guard.app_state.stores.ledger.clone(),
          guard.app_state.config.retry_policy(),
          guard.unit.clone(),
        )
      };
      let unit = policy.run("begin_checkout", || ledger.begin_checkout()).await?;
      *slot.lock().await = Some(unit);
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    })
  });

  // Runs for a failure in this step or any later one. The unit is dropped
  // whether or not the explicit rollback got through.
  p.compensate_root("open_checkout", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (policy, slot) = {
        let guard = ctx_data.read();
        (guard.app_state.config.retry_policy(), guard.unit.clone())
      };
      let rolled_back = policy
        .run("rollback_checkout", || {
          let slot = slot.clone();
          async move {
            match slot.lock().await.as_mut() {
              Some(unit) => unit.rollback().await,
              None => Ok(()),
            }
          }
        })
        .await;
      let discarded: Option<Box<dyn CheckoutUnit>> = slot.lock().await.take();
      let reserved = std::mem::take(&mut ctx_data.write().reserved);
      match rolled_back {
        Ok(()) => debug!(lines = reserved.len(), "Checkout rolled back."),
        Err(e) => warn!(error = %e, lines = reserved.len(), "Rollback did not reach storage; discarding the unit."),
      }
      drop(discarded);
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    })
  });

  // Step 4: Conditional decrements, the enforcement point for stock.
  p.on_root("reserve_stock", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (slot, mut priced) = {
        let guard = ctx_data.read();
        (guard.unit.clone(), guard.priced.clone())
      };
      // Same row order in every checkout, so overlapping carts cannot deadlock.
      priced.sort_by_key(|line| line.product_id);
      let mut unit_guard = slot.lock().await;
      let unit = unit_guard.as_mut().ok_or_else(unit_missing)?;
      for line in &priced {
        match unit.conditional_decrement_stock(line.product_id, line.quantity).await? {
          DecrementOutcome::Applied { remaining } => {
            ctx_data.write().reserved.push((line.product_id, line.quantity));
            debug!(product_id = %line.product_id, quantity = line.quantity, remaining, "Stock reserved.");
          }
          DecrementOutcome::InsufficientStock { available } => {
            info!(product_id = %line.product_id, requested = line.quantity, available, "Lost the race for stock.");
            return Err(CheckoutError::InsufficientStock(line.product_id));
          }
          DecrementOutcome::NotPurchasable => return Err(CheckoutError::ProductNotPurchasable(line.product_id)),
          DecrementOutcome::NotFound => return Err(CheckoutError::ProductNotFound(line.product_id)),
        }
      }
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    })
  });

  // Step 5: The order row, already paid.
  p.on_root("record_order", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (slot, buyer_id, total) = {
        let guard = ctx_data.read();
        (guard.unit.clone(), guard.buyer_id, guard.total_amount)
      };
      let order = {
        let mut unit_guard = slot.lock().await;
        let unit = unit_guard.as_mut().ok_or_else(unit_missing)?;
        unit.insert_order(buyer_id, total, OrderStatus::Paid).await?
      };
      ctx_data.write().order_id = Some(order.id);
      debug!(order_id = %order.id, total, "Order staged.");
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    })
  });

  // Step 6: Items carry the price and seller read in step 2.
  p.on_root("record_order_items", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (slot, order_id, priced) = {
        let guard = ctx_data.read();
        (guard.unit.clone(), guard.order_id, guard.priced.clone())
      };
      let order_id = order_id.ok_or_else(|| CheckoutError::Unavailable("order id missing after insert".to_string()))?;
      let items: Vec<NewOrderItem> = priced
        .iter()
        .map(|line| NewOrderItem {
          product_id: line.product_id,
          seller_id: line.seller_id,
          quantity: line.quantity,
          price_at_purchase: line.unit_price,
        })
        .collect();
      let mut unit_guard = slot.lock().await;
      let unit = unit_guard.as_mut().ok_or_else(unit_missing)?;
      unit.insert_order_items(order_id, &items).await?;
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    })
  });

  // Step 7: Decrements, order and items become durable together.
  p.on_root("commit_checkout", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (slot, order_id) = {
        let guard = ctx_data.read();
        (guard.unit.clone(), guard.order_id)
      };
      let mut unit_guard = slot.lock().await;
      let unit = unit_guard.as_mut().ok_or_else(unit_missing)?;
      unit.commit().await?;
      unit_guard.take();
      info!(order_id = ?order_id, "Order recorded.");
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    })
  });

  p.on_root("collect_stale_views", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      guard.stale_views = stale_views_for(guard.buyer_id, &guard.priced);
      Ok::<_, CheckoutError>(PipelineControl::Continue)
    })
  });

  keel.register_pipeline(p);
  info!("Checkout pipeline registered.");
}

/// Places an order for `buyer_id` from the submitted cart lines.
#[instrument(name = "checkout::place_order", skip(app_state, lines), fields(lines = lines.len()))]
pub async fn place_order(
  app_state: &AppState,
  buyer_id: Uuid,
  lines: Vec<CartLine>,
) -> Result<CheckoutReceipt, CheckoutError> {
  let ctx_data = ContextData::new(CheckoutCtxData::new(app_state.clone(), buyer_id, lines));

  match app_state.keel.run(ctx_data.clone()).await {
    Ok(PipelineResult::Completed) => {
      let guard = ctx_data.read();
      let order_id = guard
        .order_id
        .ok_or_else(|| CheckoutError::Unavailable("checkout completed without an order".to_string()))?;
      info!(%order_id, total = guard.total_amount, "Checkout completed.");
      Ok(CheckoutReceipt {
        order_id,
        total_amount: guard.total_amount,
        stale_views: guard.stale_views.clone(),
      })
    }
    Ok(PipelineResult::Stopped) => Err(CheckoutError::Unavailable("checkout was halted".to_string())),
    Err(AppError::Checkout(e)) => Err(e),
    Err(other) => Err(CheckoutError::Unavailable(other.to_string())),
  }
}
