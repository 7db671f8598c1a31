//! Error type for `forum-store-sqlite`.

use forum_core::ids::{MessageId, SkillId, ThreadId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column holds a value the domain types cannot represent.
  #[error("corrupt row: {0}")]
  Corrupt(String),

  #[error("thread not found: {0}")]
  ThreadNotFound(ThreadId),

  #[error("message not found: {0}")]
  MessageNotFound(MessageId),

  #[error("unknown skill: {0}")]
  UnknownSkill(SkillId),

  /// A reply named a parent message that lives in another thread.
  #[error("message {parent} is not part of thread {thread}")]
  ForeignParent { parent: MessageId, thread: ThreadId },

  #[error("invalid file handle: {0:?}")]
  InvalidHandle(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
