//! Handlers for `/forum/thread/{id}` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/forum/thread/{id}` | Flat view; records the visit |
//! | `POST` | `/forum/thread/{id}[?reply_to=<mid>]` | Reply; 201 |
//! | `GET`  | `/forum/thread/{id}/tree` | Reply forest |
//! | `POST` | `/forum/thread/{id}/edit/{mid}` | 403 before 400 |
//! | `POST` | `/forum/thread/{id}/delete/{mid}` | Redirects to the dashboard once the thread is gone |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use forum_core::{
  files::FileStore,
  forum::{EditForm, ReplyForm},
  ids::{MessageId, ThreadId},
  notify::{NotificationTransport, thread_path},
  store::ForumStore,
  thread::{Message, ThreadView},
  tree::ReplyNode,
};
use serde::{Deserialize, Serialize};

use super::{AttachmentBody, decode_attachment};
use crate::{AppState, auth::CurrentUser, error::ApiError};

// ─── Read ────────────────────────────────────────────────────────────────────

pub async fn open<S, F, T>(
  State(state): State<AppState<S, F, T>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<ThreadId>,
) -> Result<Json<ThreadView>, ApiError>
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  Ok(Json(state.forum.open_thread(user.id, id).await?))
}

pub async fn tree<S, F, T>(
  State(state): State<AppState<S, F, T>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<ThreadId>,
) -> Result<Json<Vec<ReplyNode>>, ApiError>
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  Ok(Json(state.forum.thread_tree(user.id, id).await?))
}

// ─── Reply ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReplyParams {
  pub reply_to: Option<MessageId>,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
  #[serde(default)]
  pub content:    String,
  pub attachment: Option<AttachmentBody>,
}

pub async fn reply<S, F, T>(
  State(state): State<AppState<S, F, T>>,
  CurrentUser(user): CurrentUser,
  Path(id): Path<ThreadId>,
  Query(params): Query<ReplyParams>,
  Json(body): Json<MessageBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  let form = ReplyForm {
    parent:     params.reply_to,
    content:    body.content,
    attachment: decode_attachment(body.attachment)?,
  };
  let message = state.forum.reply(user.id, id, form).await?;
  Ok((StatusCode::CREATED, Json(message)))
}

// ─── Edit / delete ───────────────────────────────────────────────────────────

pub async fn edit<S, F, T>(
  State(state): State<AppState<S, F, T>>,
  CurrentUser(user): CurrentUser,
  Path((id, mid)): Path<(ThreadId, MessageId)>,
  Json(body): Json<MessageBody>,
) -> Result<Json<Message>, ApiError>
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  let form = EditForm {
    content:    body.content,
    attachment: decode_attachment(body.attachment)?,
  };
  Ok(Json(state.forum.edit_message(user.id, id, mid, form).await?))
}

#[derive(Debug, Serialize)]
pub struct Deleted {
  pub thread_deleted: bool,
  /// The thread page, or the dashboard when the thread is gone.
  pub redirect:       String,
}

pub async fn delete<S, F, T>(
  State(state): State<AppState<S, F, T>>,
  CurrentUser(user): CurrentUser,
  Path((id, mid)): Path<(ThreadId, MessageId)>,
) -> Result<Json<Deleted>, ApiError>
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  let outcome = state.forum.delete_message(user.id, id, mid).await?;
  let redirect =
    if outcome.thread_deleted { "/forum/".to_owned() } else { thread_path(id) };
  Ok(Json(Deleted { thread_deleted: outcome.thread_deleted, redirect }))
}
