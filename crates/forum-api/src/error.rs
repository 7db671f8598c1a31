//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use forum_core::Error as ForumError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Forum(#[from] ForumError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

fn message(status: StatusCode, msg: impl Into<String>) -> Response {
  (status, Json(json!({ "error": msg.into() }))).into_response()
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::Unauthorized => {
        let mut res = message(StatusCode::UNAUTHORIZED, "Unauthorized");
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"forum\""),
        );
        res
      }
      ApiError::BadRequest(m) => message(StatusCode::BAD_REQUEST, m),
      ApiError::Forum(ForumError::Validation(errors)) => (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "errors": errors.field_errors() })),
      )
        .into_response(),
      ApiError::Forum(ForumError::Forbidden(denied)) => {
        message(StatusCode::FORBIDDEN, denied.to_string())
      }
      ApiError::Forum(ForumError::NotFound(missing)) => {
        message(StatusCode::NOT_FOUND, format!("{missing} not found"))
      }
      ApiError::Forum(ForumError::BadRequest(m)) => message(StatusCode::BAD_REQUEST, m),
      ApiError::Forum(e) => {
        error!(error = %e, "request failed");
        message(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
      ApiError::Store(e) => {
        error!(error = %e, "store lookup failed");
        message(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    }
  }
}
