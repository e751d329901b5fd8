// marketplace/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::LocalizedError;
use crate::i18n::Locale;
use crate::models::Role;
use crate::pipelines::ship_order;
use crate::services::auth_service;
use crate::state::AppState;
use crate::web::AuthenticatedUser;

#[instrument(name = "handler::buyer_orders", skip(app_state, auth_user, locale), fields(user_id = %auth_user.user_id))]
pub async fn buyer_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  locale: Locale,
) -> Result<HttpResponse, LocalizedError> {
  let buyer = auth_service::require_user(app_state.stores.identity.as_ref(), auth_user.user_id)
    .await
    .map_err(|e| locale.localize(e))?;
  let orders = app_state
    .stores
    .ledger
    .orders_for_buyer(buyer.id)
    .await
    .map_err(|e| locale.localize(e))?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

#[instrument(name = "handler::seller_orders", skip(app_state, auth_user, locale), fields(user_id = %auth_user.user_id))]
pub async fn seller_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  locale: Locale,
) -> Result<HttpResponse, LocalizedError> {
  let seller = auth_service::require_user(app_state.stores.identity.as_ref(), auth_user.user_id)
    .await
    .map_err(|e| locale.localize(e))?;
  auth_service::require_role(&seller, &[Role::Seller, Role::Admin]).map_err(|e| locale.localize(e))?;
  let sales = app_state
    .stores
    .ledger
    .sales_for_seller(seller.id)
    .await
    .map_err(|e| locale.localize(e))?;
  Ok(HttpResponse::Ok().json(json!({ "sales": sales })))
}

#[instrument(name = "handler::ship_order", skip(app_state, path, auth_user, locale), fields(user_id = %auth_user.user_id, order_id = %path.as_ref()))]
pub async fn ship_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
  locale: Locale,
) -> Result<HttpResponse, LocalizedError> {
  let order_id = path.into_inner();
  ship_order(&app_state, auth_user.user_id, order_id)
    .await
    .map_err(|e| locale.localize(e))?;

  info!(%order_id, "Order marked as shipped.");
  Ok(HttpResponse::Ok().json(json!({ "orderId": order_id, "status": "shipped" })))
}
