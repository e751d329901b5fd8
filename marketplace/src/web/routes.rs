// marketplace/src/web/routes.rs

use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};

use crate::errors::AppError;
use crate::web::extractors::request_locale;
use crate::web::handlers::{auth_handlers, checkout_handlers, order_handlers, product_handlers};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Malformed JSON bodies become a localized `validation_failed` response.
fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
  request_locale(req)
    .localize(AppError::Validation(format!("Invalid request body: {}", err)))
    .into()
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(web::JsonConfig::default().error_handler(json_error_handler))
    .service(
      web::scope("/api/v1")
        .route("/health", web::get().to(health_check_handler))
        .service(
          web::scope("/auth")
            .route("/signup", web::post().to(auth_handlers::signup_handler))
            .route("/signin", web::post().to(auth_handlers::signin_handler)),
        )
        .service(
          web::scope("/products")
            .route("", web::get().to(product_handlers::list_products_handler))
            .route("", web::post().to(product_handlers::create_product_handler))
            .route("/{product_id}", web::get().to(product_handlers::get_product_handler))
            .route("/{product_id}", web::delete().to(product_handlers::delete_product_handler)),
        )
        .route("/checkout", web::post().to(checkout_handlers::checkout_handler))
        .service(
          web::scope("/orders")
            .route("", web::get().to(order_handlers::buyer_orders_handler))
            .route("/{order_id}/ship", web::post().to(order_handlers::ship_order_handler)),
        )
        .service(
          web::scope("/seller")
            .route("/products", web::get().to(product_handlers::seller_products_handler))
            .route("/orders", web::get().to(order_handlers::seller_orders_handler)),
        ),
    );
}
