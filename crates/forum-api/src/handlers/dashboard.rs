//! `GET /forum/` — every thread visible to the caller, most recently active
//! first.

use axum::{Json, extract::State};
use forum_core::{
  files::FileStore, notify::NotificationTransport, store::ForumStore,
  thread::Thread,
};

use crate::{AppState, auth::CurrentUser, error::ApiError};

pub async fn handler<S, F, T>(
  State(state): State<AppState<S, F, T>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Thread>>, ApiError>
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  let mut threads = state.forum.dashboard(user.id).await?;
  threads.sort_by(|a, b| {
    b.modified_date.cmp(&a.modified_date).then_with(|| b.id.cmp(&a.id))
  });
  Ok(Json(threads))
}
