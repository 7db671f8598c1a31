//! Threads, messages and attachments.
//!
//! A thread is created together with its first message and disappears with
//! its last one. Messages may reply to another message of the same thread,
//! which forms the reply forest handled in [`crate::tree`].

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  directory::Skill,
  files::{FileHandle, StoredFile},
  ids::{AttachmentId, MessageId, SectionId, SkillId, ThreadId, UserId},
  visibility::Visibility,
};

// ─── Stored records ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
  pub id:            ThreadId,
  pub title:         String,
  /// The owner; never changes after creation.
  pub author_id:     UserId,
  pub visibility:    Visibility,
  /// The curriculum section the thread was filed under, if any.
  pub section_id:    Option<SectionId>,
  pub created_date:  DateTime<Utc>,
  /// Bumped every time a reply is added.
  pub modified_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub id:            MessageId,
  pub thread_id:     ThreadId,
  pub author_id:     UserId,
  /// Always a message of the same thread.
  pub parent_id:     Option<MessageId>,
  pub content:       String,
  pub created_date:  DateTime<Utc>,
  pub modified_date: DateTime<Utc>,
}

/// A file attached to a message; the bytes live in the [`crate::files`]
/// store, addressed by `handle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
  pub id:           AttachmentId,
  pub message_id:   MessageId,
  /// The name of the uploaded file.
  pub name:         String,
  pub handle:       FileHandle,
  /// SHA-256 hex digest of the content.
  pub content_hash: String,
  pub size:         u64,
}

/// A message together with its attachments, as shown on a thread page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWithAttachments {
  #[serde(flatten)]
  pub message:     Message,
  pub attachments: Vec<Attachment>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// An uploaded file that has not been written to the file store yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
  pub name: String,
  pub data: Bytes,
}

/// A file already written to the file store, ready to be linked to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
  pub name: String,
  pub file: StoredFile,
}

/// A validated thread and its first message, inserted atomically by
/// [`crate::store::ForumStore::create_thread`].
#[derive(Debug, Clone)]
pub struct NewThread {
  pub title:      String,
  pub author_id:  UserId,
  pub visibility: Visibility,
  pub section_id: Option<SectionId>,
  pub skills:     Vec<SkillId>,
  pub content:    String,
  pub attachment: Option<AttachmentUpload>,
}

/// A reply; inserted atomically with the thread's `modified_date` update.
#[derive(Debug, Clone)]
pub struct NewReply {
  pub thread_id:  ThreadId,
  pub author_id:  UserId,
  pub parent_id:  Option<MessageId>,
  pub content:    String,
  pub attachment: Option<AttachmentUpload>,
}

/// Replacement content for an existing message. When `attachment` is set all
/// previous attachments are dropped in the same transaction.
#[derive(Debug, Clone)]
pub struct MessageEdit {
  pub message_id: MessageId,
  pub content:    String,
  pub attachment: Option<AttachmentUpload>,
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EditOutcome {
  pub message:  Message,
  /// Attachment rows that were replaced; their files are now orphaned.
  pub replaced: Vec<Attachment>,
}

#[derive(Debug, Clone)]
pub struct DeleteOutcome {
  pub removed_attachments: Vec<Attachment>,
  /// `true` when the message was the last one and the thread went with it.
  pub thread_deleted:      bool,
}

/// What a caller sees when opening a thread.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadView {
  pub thread:     Thread,
  pub skills:     Vec<Skill>,
  /// Flat chronological view.
  pub messages:   Vec<MessageWithAttachments>,
  /// The previous visit of this user; `DateTime::<Utc>::MIN_UTC` on the
  /// first one.
  pub last_visit: DateTime<Utc>,
  /// Messages the viewer may edit or delete right now.
  pub editable:   Vec<MessageId>,
}
