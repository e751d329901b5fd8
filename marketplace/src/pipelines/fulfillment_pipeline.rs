// marketplace/src/pipelines/fulfillment_pipeline.rs

//! Seller-side order fulfilment: `paid → shipped`.

use keel::{ContextData, Keel, Pipeline, PipelineControl, PipelineResult};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, FulfillmentError};
use crate::models::{OrderStatus, Role};
use crate::pipelines::contexts::ShipOrderCtxData;
use crate::state::AppState;

pub fn register_fulfillment_pipeline(keel: &Arc<Keel<AppError>>) {
  let mut p = Pipeline::<ShipOrderCtxData, FulfillmentError>::new(&[
    ("load_actor", false, None),
    ("load_order", false, None),
    ("authorize_seller", false, None),
    ("transition_to_shipped", false, None),
  ]);

  p.on_root("load_actor", |ctx_data: ContextData<ShipOrderCtxData>| {
    Box::pin(async move {
      let (identity, actor_id) = {
        let guard = ctx_data.read();
        (guard.app_state.stores.identity.clone(), guard.actor_id)
      };
      let actor = identity
        .get_user(actor_id)
        .await?
        .ok_or(FulfillmentError::Unauthenticated)?;
      if actor.role != Role::Seller {
        warn!(%actor_id, role = ?actor.role, "Non-seller tried to ship an order.");
        return Err(FulfillmentError::Unauthorized);
      }
      ctx_data.write().actor = Some(actor);
      Ok::<_, FulfillmentError>(PipelineControl::Continue)
    })
  });

  p.on_root("load_order", |ctx_data: ContextData<ShipOrderCtxData>| {
    Box::pin(async move {
      let (ledger, order_id) = {
        let guard = ctx_data.read();
        (guard.app_state.stores.ledger.clone(), guard.order_id)
      };
      let order = ledger
        .get_order(order_id)
        .await?
        .ok_or(FulfillmentError::OrderNotFound(order_id))?;
      ctx_data.write().status_before = Some(order.status);
      Ok::<_, FulfillmentError>(PipelineControl::Continue)
    })
  });

  // Ownership is decided by the seller snapshot on the items, so it still
  // holds after the seller deletes the product.
  p.on_root("authorize_seller", |ctx_data: ContextData<ShipOrderCtxData>| {
    Box::pin(async move {
      let (ledger, actor_id, order_id) = {
        let guard = ctx_data.read();
        (guard.app_state.stores.ledger.clone(), guard.actor_id, guard.order_id)
      };
      if !ledger.seller_has_items_in_order(actor_id, order_id).await? {
        warn!(%actor_id, %order_id, "Seller has no items in this order.");
        return Err(FulfillmentError::Unauthorized);
      }
      Ok::<_, FulfillmentError>(PipelineControl::Continue)
    })
  });

  p.on_root("transition_to_shipped", |ctx_data: ContextData<ShipOrderCtxData>| {
    Box::pin(async move {
      let (ledger, order_id, status_before) = {
        let guard = ctx_data.read();
        (guard.app_state.stores.ledger.clone(), guard.order_id, guard.status_before)
      };
      let to = OrderStatus::Shipped;
      if let Some(from) = status_before.filter(|s| !s.can_transition_to(to)) {
        return Err(FulfillmentError::InvalidTransition { from, to });
      }

      if ledger.update_order_status(order_id, OrderStatus::Paid, to).await? {
        info!(%order_id, "Order shipped.");
        return Ok(PipelineControl::Continue);
      }

      // Someone else moved the order between our read and the update.
      let current = ledger
        .get_order(order_id)
        .await?
        .ok_or(FulfillmentError::OrderNotFound(order_id))?;
      Err(FulfillmentError::InvalidTransition {
        from: current.status,
        to,
      })
    })
  });

  keel.register_pipeline(p);
  info!("Fulfilment pipeline registered.");
}

/// Marks `order_id` as shipped on behalf of `actor_id`.
#[instrument(name = "fulfillment::ship_order", skip(app_state))]
pub async fn ship_order(app_state: &AppState, actor_id: Uuid, order_id: Uuid) -> Result<(), FulfillmentError> {
  let ctx_data = ContextData::new(ShipOrderCtxData::new(app_state.clone(), actor_id, order_id));
  match app_state.keel.run(ctx_data).await {
    Ok(PipelineResult::Completed) => Ok(()),
    Ok(PipelineResult::Stopped) => Err(FulfillmentError::Unavailable("fulfilment was halted".to_string())),
    Err(AppError::Fulfillment(e)) => Err(e),
    Err(other) => Err(FulfillmentError::Unavailable(other.to_string())),
  }
}
