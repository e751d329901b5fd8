// marketplace/src/pipelines/signup_pipeline.rs

use keel::{ContextData, Keel, Pipeline, PipelineControl, PipelineResult};
use std::sync::Arc;
use tracing::{event, info, instrument, warn, Level};

use crate::errors::AppError;
use crate::models::{NewUser, Role, User};
use crate::pipelines::contexts::SignupCtxData;
use crate::services::auth_service;
use crate::state::AppState;
use crate::store::StoreError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Registers the user sign-up pipeline.
pub fn register_signup_pipeline(keel: &Arc<Keel<AppError>>) {
  let mut signup_p = Pipeline::<SignupCtxData, AppError>::new(&[
    ("validate_signup_input", false, None),
    ("check_existing_user_signup", false, None),
    ("create_user_in_store", false, None),
  ]);

  signup_p.on_root("validate_signup_input", |ctx_data: ContextData<SignupCtxData>| {
    Box::pin(async move {
      let (email_val, password_len_val, role) = {
        let guard = ctx_data.read();
        (guard.email.trim().to_string(), guard.password.chars().count(), guard.role)
      };

      event!(Level::DEBUG, email = %email_val, "Validating signup input.");
      if email_val.is_empty() || !email_val.contains('@') {
        return Err(AppError::Validation("Valid email is required.".to_string()));
      }
      if password_len_val < MIN_PASSWORD_LEN {
        warn!("Password too short for signup ({} chars).", password_len_val);
        return Err(AppError::Validation(format!(
          "Password must be at least {} characters long.",
          MIN_PASSWORD_LEN
        )));
      }
      if role == Role::Admin {
        warn!(email = %email_val, "Attempt to self-register as admin.");
        return Err(AppError::Validation("Accounts can only be buyers or sellers.".to_string()));
      }
      Ok(PipelineControl::Continue)
    })
  });

  signup_p.on_root("check_existing_user_signup", |ctx_data: ContextData<SignupCtxData>| {
    Box::pin(async move {
      let (email_val, identity) = {
        let guard = ctx_data.read();
        (guard.email.clone(), guard.app_state.stores.identity.clone())
      };
      if identity.find_user_by_email(&email_val).await?.is_some() {
        warn!("Attempt to signup with existing email: {}", email_val);
        return Err(AppError::Store(StoreError::Duplicate(format!("user with email {}", email_val))));
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // The store enforces uniqueness too; a concurrent signup with the same email
  // fails here with `Duplicate`.
  signup_p.on_root("create_user_in_store", |ctx_data: ContextData<SignupCtxData>| {
    Box::pin(async move {
      let (new_user_input, password_val, identity) = {
        let guard = ctx_data.read();
        (
          (guard.email.clone(), guard.full_name.clone(), guard.role),
          guard.password.clone(),
          guard.app_state.stores.identity.clone(),
        )
      };
      let (email, full_name, role) = new_user_input;
      let password_hash = auth_service::hash_password(&password_val)?;

      let user = identity
        .create_user(NewUser {
          email,
          password_hash,
          full_name,
          role,
        })
        .await?;
      info!(user_id = %user.id, email = %user.email, "User created.");
      ctx_data.write().created_user = Some(user);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  keel.register_pipeline(signup_p);
  info!("Sign-up pipeline registered.");
}

#[instrument(name = "signup::register_user", skip(app_state, password))]
pub async fn register_user(
  app_state: &AppState,
  email: String,
  password: String,
  full_name: Option<String>,
  role: Role,
) -> Result<User, AppError> {
  let ctx_data = ContextData::new(SignupCtxData {
    app_state: app_state.clone(),
    email,
    password,
    full_name,
    role,
    created_user: None,
  });

  if app_state.keel.run(ctx_data.clone()).await? == PipelineResult::Stopped {
    return Err(AppError::Internal("Signup process was halted by an internal step.".to_string()));
  }
  let created = ctx_data.read().created_user.clone();
  created.ok_or_else(|| AppError::Internal("Signup completed without creating a user.".to_string()))
}
