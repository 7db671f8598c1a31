//! Handlers for `/forum/write/` endpoints: thread creation and the lookups
//! the compose form is filled from.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/forum/write/` | 201 with the thread and its first message; 422 lists every field error |
//! | `GET`  | `/forum/write/users/` | Every user |
//! | `GET`  | `/forum/write/professors/` | Professors of the caller's lessons |
//! | `GET`  | `/forum/write/lessons/` | The caller's lessons |
//! | `GET`  | `/forum/write/skills/` | Skills of the caller's stages, with sections |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use forum_core::{
  directory::{LessonSummary, User},
  files::FileStore,
  forum::{NewThreadForm, ProfessorEntry, SkillCatalog},
  ids::{SectionId, SkillId},
  notify::NotificationTransport,
  store::ForumStore,
  thread::{Message, Thread},
  visibility::ThreadTargets,
};
use serde::{Deserialize, Serialize};

use super::{AttachmentBody, decode_attachment};
use crate::{AppState, auth::CurrentUser, error::ApiError};

// ─── Create ──────────────────────────────────────────────────────────────────

/// `{"title", "recipient"|"lesson"|"professor", "section", "skills", "content", "attachment"}`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  #[serde(default)]
  pub title:      String,
  #[serde(flatten)]
  pub targets:    ThreadTargets,
  pub section:    Option<SectionId>,
  #[serde(default)]
  pub skills:     Vec<SkillId>,
  #[serde(default)]
  pub content:    String,
  pub attachment: Option<AttachmentBody>,
}

#[derive(Debug, Serialize)]
pub struct Created {
  pub thread:  Thread,
  pub message: Message,
}

pub async fn create<S, F, T>(
  State(state): State<AppState<S, F, T>>,
  CurrentUser(user): CurrentUser,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  let form = NewThreadForm {
    title:      body.title,
    targets:    body.targets,
    section:    body.section,
    skills:     body.skills,
    content:    body.content,
    attachment: decode_attachment(body.attachment)?,
  };
  let (thread, message) = state.forum.create_thread(user.id, form).await?;
  Ok((StatusCode::CREATED, Json(Created { thread, message })))
}

// ─── Lookups ─────────────────────────────────────────────────────────────────

pub async fn users<S, F, T>(
  State(state): State<AppState<S, F, T>>,
  CurrentUser(_): CurrentUser,
) -> Result<Json<Vec<User>>, ApiError>
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  Ok(Json(state.forum.list_users().await?))
}

pub async fn professors<S, F, T>(
  State(state): State<AppState<S, F, T>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ProfessorEntry>>, ApiError>
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  Ok(Json(state.forum.target_professors(user.id).await?))
}

pub async fn lessons<S, F, T>(
  State(state): State<AppState<S, F, T>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<LessonSummary>>, ApiError>
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  Ok(Json(state.forum.target_lessons(user.id).await?))
}

pub async fn skills<S, F, T>(
  State(state): State<AppState<S, F, T>>,
  CurrentUser(user): CurrentUser,
) -> Result<Json<SkillCatalog>, ApiError>
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  Ok(Json(state.forum.skills_for(user.id).await?))
}
