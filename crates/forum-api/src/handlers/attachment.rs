//! `GET /forum/attachment/{id}` — download an attachment of a readable
//! thread.

use axum::{
  extract::{Path, State},
  http::{HeaderValue, header},
  response::{IntoResponse, Response},
};
use forum_core::{
  files::FileStore, ids::AttachmentId, notify::NotificationTransport,
  store::ForumStore,
};

use crate::{AppState, auth::CurrentUser, error::ApiError};

/// `attachment; filename="..."` with characters that would break the
/// quoted string dropped.
fn content_disposition(name: &str) -> HeaderValue {
  let safe: String = name
    .chars()
    .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\')
    .collect();
  HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

pub async fn download<S, F, T>(
  State(state): State<AppState<S, F, T>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<AttachmentId>,
) -> Result<Response, ApiError>
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  let (attachment, data) = state.forum.attachment(user.id, id).await?;
  Ok(
    (
      [
        (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
        (header::CONTENT_DISPOSITION, content_disposition(&attachment.name)),
      ],
      data,
    )
      .into_response(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn disposition_strips_quotes() {
    assert_eq!(
      content_disposition("my \"notes\".txt"),
      "attachment; filename=\"my notes.txt\""
    );
    assert_eq!(content_disposition("résumé.pdf"), "attachment; filename=\"rsum.pdf\"");
  }
}
