//! Encoding and decoding helpers between forum domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with microsecond precision and a
//! `Z` suffix, so lexical order is chronological order. Visibility is stored
//! as its three-letter code plus one nullable target column per kind.
//! Notification audiences and parameters are stored as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use forum_core::{
  directory::{Section, Skill, User},
  files::FileHandle,
  ids::{
    AttachmentId, LessonId, MessageId, NotificationId, ProfessorId, SectionId,
    SkillId, ThreadId, UserId,
  },
  notify::{Notification, NotificationParams, Target},
  thread::{Attachment, Message, Thread},
  visibility::{Visibility, VisibilityKind},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Visibility ──────────────────────────────────────────────────────────────

/// The `visibility` code and (`recipient_id`, `lesson_id`, `professor_id`).
pub struct VisibilityColumns {
  pub code:         &'static str,
  pub recipient_id: Option<i64>,
  pub lesson_id:    Option<i64>,
  pub professor_id: Option<i64>,
}

pub fn encode_visibility(v: &Visibility) -> VisibilityColumns {
  let targets = v.targets();
  VisibilityColumns {
    code:         v.kind().into(),
    recipient_id: targets.recipient.map(|id| id.0),
    lesson_id:    targets.lesson.map(|id| id.0),
    professor_id: targets.professor.map(|id| id.0),
  }
}

pub fn decode_visibility(
  code: &str,
  recipient_id: Option<i64>,
  lesson_id: Option<i64>,
  professor_id: Option<i64>,
) -> Result<Visibility> {
  let kind: VisibilityKind = code
    .parse()
    .map_err(|_| Error::Corrupt(format!("unknown visibility code: {code:?}")))?;

  match (kind, recipient_id, lesson_id, professor_id) {
    (VisibilityKind::Private, recipient, None, None) => {
      Ok(Visibility::Private { recipient: recipient.map(UserId) })
    }
    (VisibilityKind::PublicClass, None, Some(lesson), None) => {
      Ok(Visibility::PublicClass { lesson: LessonId(lesson) })
    }
    (VisibilityKind::PublicProfessor, None, None, Some(professor)) => {
      Ok(Visibility::PublicProfessor { professor: ProfessorId(professor) })
    }
    _ => Err(Error::Corrupt(format!(
      "visibility {code} does not match its target columns"
    ))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "u.id, u.username, u.first_name, u.last_name";

pub fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
  Ok(User {
    id:         UserId(row.get(0)?),
    username:   row.get(1)?,
    first_name: row.get(2)?,
    last_name:  row.get(3)?,
  })
}

pub const SKILL_COLUMNS: &str = "sk.id, sk.code, sk.name, sec.id, sec.name";

/// Expects `skills sk LEFT JOIN sections sec`.
pub fn skill_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Skill> {
  let section_id: Option<i64> = row.get(3)?;
  let section_name: Option<String> = row.get(4)?;
  Ok(Skill {
    id:      SkillId(row.get(0)?),
    code:    row.get(1)?,
    name:    row.get(2)?,
    section: section_id
      .zip(section_name)
      .map(|(id, name)| Section { id: SectionId(id), name }),
  })
}

pub const THREAD_COLUMNS: &str = "t.id, t.title, t.author_id, t.visibility, \
   t.recipient_id, t.lesson_id, t.professor_id, t.section_id, t.created_at, t.modified_at";

/// Raw values read directly from a `threads` row.
pub struct RawThread {
  pub id:           i64,
  pub title:        String,
  pub author_id:    i64,
  pub visibility:   String,
  pub recipient_id: Option<i64>,
  pub lesson_id:    Option<i64>,
  pub professor_id: Option<i64>,
  pub section_id:   Option<i64>,
  pub created_at:   String,
  pub modified_at:  String,
}

impl RawThread {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      title:        row.get(1)?,
      author_id:    row.get(2)?,
      visibility:   row.get(3)?,
      recipient_id: row.get(4)?,
      lesson_id:    row.get(5)?,
      professor_id: row.get(6)?,
      section_id:   row.get(7)?,
      created_at:   row.get(8)?,
      modified_at:  row.get(9)?,
    })
  }

  pub fn into_thread(self) -> Result<Thread> {
    Ok(Thread {
      id:            ThreadId(self.id),
      title:         self.title,
      author_id:     UserId(self.author_id),
      visibility:    decode_visibility(
        &self.visibility,
        self.recipient_id,
        self.lesson_id,
        self.professor_id,
      )?,
      section_id:    self.section_id.map(SectionId),
      created_date:  decode_dt(&self.created_at)?,
      modified_date: decode_dt(&self.modified_at)?,
    })
  }
}

pub const MESSAGE_COLUMNS: &str =
  "m.id, m.thread_id, m.author_id, m.parent_id, m.content, m.created_at, m.modified_at";

/// Raw values read directly from a `messages` row.
pub struct RawMessage {
  pub id:          i64,
  pub thread_id:   i64,
  pub author_id:   i64,
  pub parent_id:   Option<i64>,
  pub content:     String,
  pub created_at:  String,
  pub modified_at: String,
}

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      thread_id:   row.get(1)?,
      author_id:   row.get(2)?,
      parent_id:   row.get(3)?,
      content:     row.get(4)?,
      created_at:  row.get(5)?,
      modified_at: row.get(6)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      id:            MessageId(self.id),
      thread_id:     ThreadId(self.thread_id),
      author_id:     UserId(self.author_id),
      parent_id:     self.parent_id.map(MessageId),
      content:       self.content,
      created_date:  decode_dt(&self.created_at)?,
      modified_date: decode_dt(&self.modified_at)?,
    })
  }
}

pub const ATTACHMENT_COLUMNS: &str =
  "a.id, a.message_id, a.name, a.handle, a.content_hash, a.size";

/// Raw values read directly from an `attachments` row.
pub struct RawAttachment {
  pub id:           i64,
  pub message_id:   i64,
  pub name:         String,
  pub handle:       String,
  pub content_hash: String,
  pub size:         i64,
}

impl RawAttachment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      message_id:   row.get(1)?,
      name:         row.get(2)?,
      handle:       row.get(3)?,
      content_hash: row.get(4)?,
      size:         row.get(5)?,
    })
  }

  pub fn into_attachment(self) -> Result<Attachment> {
    let size = u64::try_from(self.size)
      .map_err(|_| Error::Corrupt(format!("negative attachment size {}", self.size)))?;
    Ok(Attachment {
      id: AttachmentId(self.id),
      message_id: MessageId(self.message_id),
      name: self.name,
      handle: FileHandle(self.handle),
      content_hash: self.content_hash,
      size,
    })
  }
}

/// Raw values read directly from a `notifications` row.
pub struct RawNotification {
  pub id:            i64,
  pub audience_json: String,
  pub medium:        String,
  pub kind:          String,
  pub params_json:   String,
  pub created_at:    String,
}

impl RawNotification {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      audience_json: row.get(1)?,
      medium:        row.get(2)?,
      kind:          row.get(3)?,
      params_json:   row.get(4)?,
      created_at:    row.get(5)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    let audience: Vec<Target> = serde_json::from_str(&self.audience_json)?;
    let params: NotificationParams = serde_json::from_str(&self.params_json)?;
    Ok(Notification {
      id: NotificationId(self.id),
      audience,
      medium: self
        .medium
        .parse()
        .map_err(|_| Error::Corrupt(format!("unknown medium: {:?}", self.medium)))?,
      kind: self
        .kind
        .parse()
        .map_err(|_| Error::Corrupt(format!("unknown notification kind: {:?}", self.kind)))?,
      params,
      created_date: decode_dt(&self.created_at)?,
    })
  }
}

/// `?, ?, ?` for an `IN (...)` clause of `n` values.
pub fn placeholders(n: usize) -> String { vec!["?"; n].join(", ") }
