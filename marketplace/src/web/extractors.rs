// marketplace/src/web/extractors.rs

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

use crate::errors::{AppError, LocalizedError};
use crate::i18n::Locale;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// Caller language from `Accept-Language`, else the configured default.
pub fn request_locale(req: &HttpRequest) -> Locale {
  req
    .headers()
    .get(header::ACCEPT_LANGUAGE)
    .and_then(|value| value.to_str().ok())
    .and_then(Locale::from_accept_language)
    .or_else(|| {
      req
        .app_data::<web::Data<AppState>>()
        .map(|state| state.config.default_locale)
    })
    .unwrap_or_default()
}

impl FromRequest for Locale {
  type Error = actix_web::Error;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    ready(Ok(request_locale(req)))
  }
}

/// The caller's id, taken from the `X-User-ID` header. Session handling lives
/// in front of this service; it only has to forward the resolved id.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
}

impl FromRequest for AuthenticatedUser {
  type Error = LocalizedError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let user_id = req
      .headers()
      .get(USER_ID_HEADER)
      .and_then(|value| value.to_str().ok())
      .and_then(|raw| Uuid::parse_str(raw.trim()).ok());

    match user_id {
      Some(user_id) => ready(Ok(AuthenticatedUser { user_id })),
      None => {
        warn!("Missing or invalid {} header.", USER_ID_HEADER);
        ready(Err(request_locale(req).localize(AppError::Unauthenticated(format!(
          "Missing or invalid {} header",
          USER_ID_HEADER
        )))))
      }
    }
  }
}
