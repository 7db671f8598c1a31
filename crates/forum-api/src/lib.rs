//! JSON HTTP API for the classroom forum.
//!
//! Exposes an axum [`Router`] backed by a [`forum_core::Forum`] over any
//! store, file store and notification transport. Every route requires HTTP
//! Basic credentials of a forum user; TLS is the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = forum_api::router(AppState::new(forum));
//! ```

pub mod auth;
pub mod error;
pub mod handlers;
pub mod notify;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use forum_core::{
  Forum, files::FileStore, notify::NotificationTransport, store::ForumStore,
};

pub use error::ApiError;
pub use notify::BroadcastTransport;

use handlers::{attachment, dashboard, thread, write};

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, F, T> {
  pub forum: Arc<Forum<S, F, T>>,
}

impl<S, F, T> AppState<S, F, T> {
  pub fn new(forum: Forum<S, F, T>) -> Self { Self { forum: Arc::new(forum) } }
}

// Not derived: `derive(Clone)` would demand `S: Clone` and friends.
impl<S, F, T> Clone for AppState<S, F, T> {
  fn clone(&self) -> Self { Self { forum: Arc::clone(&self.forum) } }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the forum router. Paths are absolute (`/forum/...`).
pub fn router<S, F, T>(state: AppState<S, F, T>) -> Router
where
  S: ForumStore + 'static,
  F: FileStore + 'static,
  T: NotificationTransport + 'static,
{
  Router::new()
    .route("/forum/", get(dashboard::handler::<S, F, T>))
    // Compose
    .route("/forum/write/", post(write::create::<S, F, T>))
    .route("/forum/write/users/", get(write::users::<S, F, T>))
    .route("/forum/write/professors/", get(write::professors::<S, F, T>))
    .route("/forum/write/lessons/", get(write::lessons::<S, F, T>))
    .route("/forum/write/skills/", get(write::skills::<S, F, T>))
    // Threads
    .route(
      "/forum/thread/{id}",
      get(thread::open::<S, F, T>).post(thread::reply::<S, F, T>),
    )
    .route("/forum/thread/{id}/tree", get(thread::tree::<S, F, T>))
    .route("/forum/thread/{id}/edit/{mid}", post(thread::edit::<S, F, T>))
    .route("/forum/thread/{id}/delete/{mid}", post(thread::delete::<S, F, T>))
    // Attachments
    .route("/forum/attachment/{id}", get(attachment::download::<S, F, T>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
