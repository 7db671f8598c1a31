//! HTTP Basic-auth extractor resolving the calling forum user.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use forum_core::{
  directory::User, files::FileStore, notify::NotificationTransport,
  store::ForumStore,
};
use tracing::debug;

use crate::{AppState, error::ApiError};

/// The authenticated caller. Present in a handler means the credentials
/// matched the user's stored argon2 hash.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Split an `Authorization: Basic ...` header into username and password.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((username.to_owned(), password.to_owned()))
}

/// Check `password` against a PHC string produced by argon2.
pub fn verify_password(password: &str, phc: &str) -> Result<(), ApiError> {
  let parsed_hash = PasswordHash::new(phc).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)
}

/// Resolve the caller from request headers against `store`.
pub async fn authenticate<S: ForumStore>(
  headers: &HeaderMap,
  store: &S,
) -> Result<User, ApiError> {
  let (username, password) = basic_credentials(headers)?;

  let Some((user, hash)) = store
    .user_credentials(&username)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
  else {
    debug!(username = %username, "unknown user or no credentials");
    return Err(ApiError::Unauthorized);
  };

  verify_password(&password, &hash).inspect_err(|_| {
    debug!(username = %username, "password mismatch");
  })?;
  Ok(user)
}

impl<S, F, T> FromRequestParts<AppState<S, F, T>> for CurrentUser
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, F, T>,
  ) -> Result<Self, Self::Rejection> {
    let user = authenticate(&parts.headers, state.forum.store()).await?;
    Ok(CurrentUser(user))
  }
}
