// marketplace/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::errors::LocalizedError;
use crate::i18n::Locale;
use crate::models::CartLine;
use crate::pipelines::place_order;
use crate::services::auth_service;
use crate::state::AppState;
use crate::web::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct CheckoutRequestPayload {
  #[serde(default)]
  pub items: Vec<CartLine>,
}

#[instrument(
    name = "handler::checkout",
    skip(app_state, auth_user, payload, locale),
    fields(user_id = %auth_user.user_id, lines = payload.items.len())
)]
pub async fn checkout_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  payload: web::Json<CheckoutRequestPayload>,
  locale: Locale,
) -> Result<HttpResponse, LocalizedError> {
  let buyer = auth_service::require_user(app_state.stores.identity.as_ref(), auth_user.user_id)
    .await
    .map_err(|e| locale.localize(e))?;

  let receipt = place_order(&app_state, buyer.id, payload.into_inner().items)
    .await
    .map_err(|e| locale.localize(e))?;

  info!(order_id = %receipt.order_id, total = receipt.total_amount, "Order placed.");
  Ok(HttpResponse::Created().json(receipt))
}
