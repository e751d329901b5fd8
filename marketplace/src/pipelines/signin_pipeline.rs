// marketplace/src/pipelines/signin_pipeline.rs

use keel::{ContextData, Keel, Pipeline, PipelineControl, PipelineResult};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::User;
use crate::pipelines::contexts::SigninCtxData;
use crate::services::auth_service;
use crate::state::AppState;

// Same message for unknown email and wrong password.
fn invalid_credentials() -> AppError {
  AppError::Unauthenticated("Invalid email or password.".to_string())
}

pub fn register_signin_pipeline(keel: &Arc<Keel<AppError>>) {
  let mut signin_p = Pipeline::<SigninCtxData, AppError>::new(&[
    ("find_user_signin", false, None),
    ("verify_password_signin", false, None),
  ]);

  signin_p.on_root("find_user_signin", |ctx_data: ContextData<SigninCtxData>| {
    Box::pin(async move {
      let (email_val, identity) = {
        let guard = ctx_data.read();
        (guard.email.clone(), guard.app_state.stores.identity.clone())
      };
      let Some(user) = identity.find_user_by_email(&email_val).await? else {
        warn!("Sign-in attempt for unknown email.");
        return Err(invalid_credentials());
      };
      ctx_data.write().candidate = Some(user);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  signin_p.on_root("verify_password_signin", |ctx_data: ContextData<SigninCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let user = guard.candidate.take().ok_or_else(invalid_credentials)?;
      if !auth_service::verify_password(&user.password_hash, &guard.password)? {
        warn!(user_id = %user.id, "Sign-in attempt with wrong password.");
        return Err(invalid_credentials());
      }
      guard.authenticated = Some(user);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  keel.register_pipeline(signin_p);
  info!("Sign-in pipeline registered.");
}

#[instrument(name = "signin::authenticate", skip(app_state, password))]
pub async fn authenticate(app_state: &AppState, email: String, password: String) -> Result<User, AppError> {
  let ctx_data = ContextData::new(SigninCtxData {
    app_state: app_state.clone(),
    email,
    password,
    candidate: None,
    authenticated: None,
  });

  if app_state.keel.run(ctx_data.clone()).await? == PipelineResult::Stopped {
    return Err(invalid_credentials());
  }
  let user = ctx_data.read().authenticated.clone();
  user.ok_or_else(invalid_credentials)
}
