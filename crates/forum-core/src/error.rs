//! Error types for `forum-core`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::{
  authz::Denied,
  ids::{
    AttachmentId, LessonId, MessageId, ProfessorId, SectionId, SkillId, ThreadId, UserId,
  },
};

// ─── Field-level validation ──────────────────────────────────────────────────

/// One rejected field of a thread or message submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("the thread title cannot be empty")]
  EmptyTitle,

  #[error("the message content cannot be empty")]
  EmptyContent,

  #[error("only one of recipient, lesson or professor may be set")]
  ConflictingVisibility,

  #[error("a recipient, lesson or professor is required")]
  MissingTarget,
}

impl ValidationError {
  /// The form field the error should be displayed next to.
  pub fn field(&self) -> &'static str {
    match self {
      Self::EmptyTitle => "title",
      Self::EmptyContent => "content",
      Self::ConflictingVisibility | Self::MissingTarget => "visibility",
    }
  }
}

/// A serialisable `{field, msg}` pair, as rendered by the API layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
  pub field: &'static str,
  pub msg:   String,
}

/// Every field error of one submission, collected rather than fail-fast so
/// the caller can redisplay them all at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, error: ValidationError) { self.0.push(error); }

  pub fn extend(&mut self, other: ValidationErrors) { self.0.extend(other.0); }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn contains(&self, error: &ValidationError) -> bool {
    self.0.contains(error)
  }

  pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
    self.0.iter()
  }

  pub fn field_errors(&self) -> Vec<FieldError> {
    self
      .0
      .iter()
      .map(|e| FieldError { field: e.field(), msg: e.to_string() })
      .collect()
  }

  /// `Ok(value)` when nothing was collected.
  pub fn into_result<T>(self, value: T) -> Result<T, Self> {
    if self.is_empty() { Ok(value) } else { Err(self) }
  }
}

impl From<ValidationError> for ValidationErrors {
  fn from(error: ValidationError) -> Self { Self(vec![error]) }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts: Vec<String> =
      self.0.iter().map(|e| format!("{}: {e}", e.field())).collect();
    f.write_str(&parts.join("; "))
  }
}

impl std::error::Error for ValidationErrors {}

// ─── Missing references ──────────────────────────────────────────────────────

/// The entity an operation referenced but could not find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
  Thread(ThreadId),
  Message(MessageId),
  Attachment(AttachmentId),
  User(UserId),
  Lesson(LessonId),
  Professor(ProfessorId),
  Skill(SkillId),
  Section(SectionId),
}

impl fmt::Display for Missing {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Thread(id) => write!(f, "thread {id}"),
      Self::Message(id) => write!(f, "message {id}"),
      Self::Attachment(id) => write!(f, "attachment {id}"),
      Self::User(id) => write!(f, "user {id}"),
      Self::Lesson(id) => write!(f, "lesson {id}"),
      Self::Professor(id) => write!(f, "professor {id}"),
      Self::Skill(id) => write!(f, "skill {id}"),
      Self::Section(id) => write!(f, "section {id}"),
    }
  }
}

// ─── Error ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(ValidationErrors),

  #[error("forbidden: {0}")]
  Forbidden(Denied),

  #[error("{0} not found")]
  NotFound(Missing),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("file store error: {0}")]
  Files(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<ValidationErrors> for Error {
  fn from(errors: ValidationErrors) -> Self { Self::Validation(errors) }
}

impl From<Denied> for Error {
  fn from(denied: Denied) -> Self { Self::Forbidden(denied) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn field_errors_keep_submission_order() {
    let mut errors = ValidationErrors::new();
    errors.push(ValidationError::EmptyTitle);
    errors.push(ValidationError::MissingTarget);

    let rendered = errors.field_errors();
    assert_eq!(rendered.len(), 2);
    assert_eq!(rendered[0].field, "title");
    assert_eq!(rendered[1].field, "visibility");
    assert_eq!(rendered[1].msg, "a recipient, lesson or professor is required");
  }

  #[test]
  fn missing_renders_entity_and_id() {
    assert_eq!(Missing::Skill(SkillId(4)).to_string(), "skill 4");
  }

  #[test]
  fn empty_collection_is_ok() {
    assert_eq!(ValidationErrors::new().into_result(7), Ok(7));
  }
}
