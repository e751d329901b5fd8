// marketplace/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::LocalizedError;
use crate::i18n::Locale;
use crate::models::Role;
use crate::pipelines::{signin_pipeline, signup_pipeline};
use crate::state::AppState;

fn default_role() -> Role {
  Role::Buyer
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequestPayload {
  pub email: String,
  pub password: String,
  pub full_name: Option<String>,
  #[serde(default = "default_role")]
  pub role: Role,
}

#[derive(Deserialize, Debug)]
pub struct SigninRequestPayload {
  pub email: String,
  pub password: String,
}

#[instrument(
    name = "handler::signup",
    skip(app_state, req_payload, locale),
    fields(req_email = %req_payload.email)
)]
pub async fn signup_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<SignupRequestPayload>,
  locale: Locale,
) -> Result<HttpResponse, LocalizedError> {
  let payload = req_payload.into_inner();
  let user = signup_pipeline::register_user(&app_state, payload.email, payload.password, payload.full_name, payload.role)
    .await
    .map_err(|e| locale.localize(e))?;

  info!(user_id = %user.id, "Signup successful.");
  Ok(HttpResponse::Created().json(json!({
      "message": "User created successfully.",
      "user": user,
  })))
}

#[instrument(
    name = "handler::signin",
    skip(app_state, req_payload, locale),
    fields(req_email = %req_payload.email)
)]
pub async fn signin_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<SigninRequestPayload>,
  locale: Locale,
) -> Result<HttpResponse, LocalizedError> {
  let payload = req_payload.into_inner();
  let user = signin_pipeline::authenticate(&app_state, payload.email, payload.password)
    .await
    .map_err(|e| locale.localize(e))?;

  info!(user_id = %user.id, "Signin successful.");
  Ok(HttpResponse::Ok().json(json!({
      "message": "Signin successful.",
      "user": user,
  })))
}
