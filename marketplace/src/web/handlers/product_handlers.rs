// marketplace/src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, LocalizedError};
use crate::i18n::Locale;
use crate::models::{NewProduct, ProductFilter, Role};
use crate::services::auth_service;
use crate::state::AppState;
use crate::web::AuthenticatedUser;

#[instrument(name = "handler::list_products", skip(app_state, locale))]
pub async fn list_products_handler(
  app_state: web::Data<AppState>,
  filter: web::Query<ProductFilter>,
  locale: Locale,
) -> Result<HttpResponse, LocalizedError> {
  let products = app_state
    .stores
    .catalog
    .list_active_products(&filter)
    .await
    .map_err(|e| locale.localize(e))?;

  info!("Fetched {} products.", products.len());
  Ok(HttpResponse::Ok().json(json!({ "products": products })))
}

#[instrument(name = "handler::get_product", skip(app_state, path, locale), fields(product_id = %path.as_ref()))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  locale: Locale,
) -> Result<HttpResponse, LocalizedError> {
  let product_id = path.into_inner();
  let product = app_state
    .stores
    .catalog
    .get_active_product(product_id)
    .await
    .map_err(|e| locale.localize(e))?
    .ok_or_else(|| {
      warn!("Product with ID {} not found.", product_id);
      locale.localize(AppError::NotFound(format!("Product with ID {} not found.", product_id)))
    })?;

  Ok(HttpResponse::Ok().json(json!({ "product": product })))
}

#[instrument(name = "handler::create_product", skip(app_state, payload, auth_user, locale), fields(user_id = %auth_user.user_id))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<NewProduct>,
  auth_user: AuthenticatedUser,
  locale: Locale,
) -> Result<HttpResponse, LocalizedError> {
  let seller = auth_service::require_user(app_state.stores.identity.as_ref(), auth_user.user_id)
    .await
    .map_err(|e| locale.localize(e))?;
  auth_service::require_role(&seller, &[Role::Seller, Role::Admin]).map_err(|e| locale.localize(e))?;
  payload.validate().map_err(|e| locale.localize(e))?;

  let product = app_state
    .stores
    .catalog
    .insert_product(seller.id, &payload)
    .await
    .map_err(|e| locale.localize(e))?;

  info!(product_id = %product.id, "Product created.");
  Ok(HttpResponse::Created().json(json!({ "product": product })))
}

#[instrument(name = "handler::delete_product", skip(app_state, path, auth_user, locale), fields(user_id = %auth_user.user_id))]
pub async fn delete_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
  locale: Locale,
) -> Result<HttpResponse, LocalizedError> {
  let product_id = path.into_inner();
  let user = auth_service::require_user(app_state.stores.identity.as_ref(), auth_user.user_id)
    .await
    .map_err(|e| locale.localize(e))?;

  let catalog = &app_state.stores.catalog;
  let product = catalog
    .get_product(product_id)
    .await
    .map_err(|e| locale.localize(e))?
    .ok_or_else(|| locale.localize(AppError::NotFound(format!("Product with ID {} not found.", product_id))))?;

  if product.seller_id != user.id && user.role != Role::Admin {
    warn!(%product_id, "Attempt to delete another seller's product.");
    return Err(locale.localize(AppError::Unauthorized("Only the owner can delete a product.".to_string())));
  }

  catalog.delete_product(product_id).await.map_err(|e| locale.localize(e))?;
  info!(%product_id, "Product deleted.");
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::seller_products", skip(app_state, auth_user, locale), fields(user_id = %auth_user.user_id))]
pub async fn seller_products_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
  locale: Locale,
) -> Result<HttpResponse, LocalizedError> {
  let seller = auth_service::require_user(app_state.stores.identity.as_ref(), auth_user.user_id)
    .await
    .map_err(|e| locale.localize(e))?;
  auth_service::require_role(&seller, &[Role::Seller, Role::Admin]).map_err(|e| locale.localize(e))?;

  let products = app_state
    .stores
    .catalog
    .products_for_seller(seller.id)
    .await
    .map_err(|e| locale.localize(e))?;
  Ok(HttpResponse::Ok().json(json!({ "products": products })))
}
