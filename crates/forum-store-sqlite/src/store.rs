//! [`SqliteStore`] — the SQLite implementation of [`ForumStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;

use forum_core::{
  directory::{Lesson, Professor, Profile, Section, Skill, Student, User},
  ids::{
    AttachmentId, LessonId, MessageId, NotificationId, ProfessorId, SectionId,
    SkillId, StageId, StudentId, ThreadId, UserId,
  },
  notify::{NewNotification, Notification},
  store::ForumStore,
  thread::{
    Attachment, AttachmentUpload, DeleteOutcome, EditOutcome, Message,
    MessageEdit, NewReply, NewThread, Thread,
  },
};

use crate::{
  encode::{
    ATTACHMENT_COLUMNS, MESSAGE_COLUMNS, RawAttachment, RawMessage,
    RawNotification, RawThread, SKILL_COLUMNS, THREAD_COLUMNS, USER_COLUMNS,
    decode_dt, encode_dt, encode_visibility, placeholders, skill_from_row,
    user_from_row,
  },
  schema::SCHEMA,
  Error, Result,
};

/// Timestamps are stored with microsecond precision; truncate up front so
/// returned values compare equal to re-read ones.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn query_threads<P: rusqlite::Params>(
  conn: &rusqlite::Connection,
  filter: &str,
  params: P,
) -> rusqlite::Result<Vec<RawThread>> {
  let sql = format!(
    "SELECT {THREAD_COLUMNS} FROM threads t WHERE {filter}
     ORDER BY t.created_at, t.id"
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params, RawThread::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn query_attachments<P: rusqlite::Params>(
  conn: &rusqlite::Connection,
  filter: &str,
  params: P,
) -> rusqlite::Result<Vec<RawAttachment>> {
  let sql = format!(
    "SELECT {ATTACHMENT_COLUMNS} FROM attachments a
     JOIN messages m ON m.id = a.message_id
     WHERE {filter}
     ORDER BY a.id"
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params, RawAttachment::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn query_lessons<P: rusqlite::Params>(
  conn: &rusqlite::Connection,
  join: &str,
  params: P,
) -> rusqlite::Result<Vec<Lesson>> {
  let sql = format!("SELECT l.id, l.name, l.stage_id FROM lessons l {join} ORDER BY l.id");
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(params, |row| {
      Ok(Lesson {
        id:       LessonId(row.get(0)?),
        name:     row.get(1)?,
        stage_id: row.get::<_, Option<i64>>(2)?.map(StageId),
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn insert_message(
  conn: &rusqlite::Connection,
  thread_id: i64,
  author_id: i64,
  parent_id: Option<i64>,
  content: &str,
  at: &str,
) -> rusqlite::Result<i64> {
  conn.execute(
    "INSERT INTO messages (thread_id, author_id, parent_id, content, created_at, modified_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    rusqlite::params![thread_id, author_id, parent_id, content, at],
  )?;
  Ok(conn.last_insert_rowid())
}

fn insert_attachment(
  conn: &rusqlite::Connection,
  message_id: i64,
  upload: &AttachmentUpload,
) -> rusqlite::Result<i64> {
  conn.execute(
    "INSERT INTO attachments (message_id, name, handle, content_hash, size)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![
      message_id,
      upload.name,
      upload.file.handle.0,
      upload.file.content_hash,
      i64::try_from(upload.file.size).unwrap_or(i64::MAX),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

fn decode_all<R, T>(raws: Vec<R>, decode: impl Fn(R) -> Result<T>) -> Result<Vec<T>> {
  raws.into_iter().map(decode).collect()
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A forum store backed by a single SQLite file.
///
/// Clones share one reference-counted connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }

  // ── Directory seeding ─────────────────────────────────────────────────────

  /// Insert a user. `password_hash` is an argon2 PHC string; users without
  /// one cannot authenticate.
  pub async fn add_user(
    &self,
    username: &str,
    first_name: &str,
    last_name: &str,
    password_hash: Option<&str>,
  ) -> Result<User> {
    let username_s = username.to_owned();
    let first_s = first_name.to_owned();
    let last_s = last_name.to_owned();
    let hash_s = password_hash.map(str::to_owned);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (username, first_name, last_name, password_hash)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![username_s, first_s, last_s, hash_s],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(User {
      id:         UserId(id),
      username:   username.to_owned(),
      first_name: first_name.to_owned(),
      last_name:  last_name.to_owned(),
    })
  }

  pub async fn add_student(&self, user: UserId) -> Result<Student> {
    let id = self
      .conn
      .call(move |conn| {
        conn.execute("INSERT INTO students (user_id) VALUES (?1)", [user.0])?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(Student { id: StudentId(id), user_id: user })
  }

  pub async fn add_professor(&self, user: UserId) -> Result<Professor> {
    let id = self
      .conn
      .call(move |conn| {
        conn.execute("INSERT INTO professors (user_id) VALUES (?1)", [user.0])?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(Professor { id: ProfessorId(id), user_id: user })
  }

  pub async fn add_stage(&self, name: &str) -> Result<StageId> {
    let name = name.to_owned();
    let id = self
      .conn
      .call(move |conn| {
        conn.execute("INSERT INTO stages (name) VALUES (?1)", [name])?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(StageId(id))
  }

  pub async fn add_lesson(&self, name: &str, stage: Option<StageId>) -> Result<Lesson> {
    let name_s = name.to_owned();
    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO lessons (name, stage_id) VALUES (?1, ?2)",
          rusqlite::params![name_s, stage.map(|s| s.0)],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(Lesson { id: LessonId(id), name: name.to_owned(), stage_id: stage })
  }

  pub async fn enroll(&self, student: StudentId, lesson: LessonId) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO lesson_students (lesson_id, student_id) VALUES (?1, ?2)",
          [lesson.0, student.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn assign(&self, professor: ProfessorId, lesson: LessonId) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO lesson_professors (lesson_id, professor_id) VALUES (?1, ?2)",
          [lesson.0, professor.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn add_section(&self, name: &str) -> Result<Section> {
    let name_s = name.to_owned();
    let id = self
      .conn
      .call(move |conn| {
        conn.execute("INSERT INTO sections (name) VALUES (?1)", [name_s])?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(Section { id: SectionId(id), name: name.to_owned() })
  }

  pub async fn add_skill(
    &self,
    code: &str,
    name: &str,
    section: Option<&Section>,
  ) -> Result<Skill> {
    let code_s = code.to_owned();
    let name_s = name.to_owned();
    let section_id = section.map(|s| s.id.0);
    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO skills (code, name, section_id) VALUES (?1, ?2, ?3)",
          rusqlite::params![code_s, name_s, section_id],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    Ok(Skill {
      id:      SkillId(id),
      code:    code.to_owned(),
      name:    name.to_owned(),
      section: section.cloned(),
    })
  }

  pub async fn attach_skill(&self, stage: StageId, skill: SkillId) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO stage_skills (stage_id, skill_id) VALUES (?1, ?2)",
          [stage.0, skill.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  /// The most recent notifications, newest first.
  pub async fn recent_notifications(&self, limit: usize) -> Result<Vec<Notification>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, audience_json, medium, kind, params_json, created_at
           FROM notifications ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
          .query_map([limit], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    decode_all(raws, RawNotification::into_notification)
  }
}

// ─── ForumStore impl ─────────────────────────────────────────────────────────

impl ForumStore for SqliteStore {
  type Error = Error;

  // ── Directory lookups ─────────────────────────────────────────────────────

  async fn get_user(&self, id: UserId) -> Result<Option<User>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
              [id.0],
              user_from_row,
            )
            .optional()?)
        })
        .await?,
    )
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt =
            conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.id"))?;
          let rows = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn user_credentials(&self, username: &str) -> Result<Option<(User, String)>> {
    let username = username.to_owned();
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn
            .query_row(
              &format!(
                "SELECT {USER_COLUMNS}, u.password_hash FROM users u
                 WHERE u.username = ?1 AND u.password_hash IS NOT NULL"
              ),
              [username],
              |row| Ok((user_from_row(row)?, row.get::<_, String>(4)?)),
            )
            .optional()?)
        })
        .await?,
    )
  }

  async fn profile_of(&self, user: UserId) -> Result<Option<Profile>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          let student: Option<i64> = conn
            .query_row("SELECT id FROM students WHERE user_id = ?1", [user.0], |r| {
              r.get(0)
            })
            .optional()?;
          if let Some(id) = student {
            return Ok(Some(Profile::Student(Student { id: StudentId(id), user_id: user })));
          }

          let professor: Option<i64> = conn
            .query_row("SELECT id FROM professors WHERE user_id = ?1", [user.0], |r| {
              r.get(0)
            })
            .optional()?;
          Ok(professor.map(|id| {
            Profile::Professor(Professor { id: ProfessorId(id), user_id: user })
          }))
        })
        .await?,
    )
  }

  async fn get_professor(&self, id: ProfessorId) -> Result<Option<Professor>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn
            .query_row("SELECT user_id FROM professors WHERE id = ?1", [id.0], |r| {
              Ok(Professor { id, user_id: UserId(r.get(0)?) })
            })
            .optional()?)
        })
        .await?,
    )
  }

  async fn get_section(&self, id: SectionId) -> Result<Option<Section>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn
            .query_row("SELECT name FROM sections WHERE id = ?1", [id.0], |r| {
              Ok(Section { id, name: r.get(0)? })
            })
            .optional()?)
        })
        .await?,
    )
  }

  async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>> {
    let lessons = self
      .conn
      .call(move |conn| Ok(query_lessons(conn, "WHERE l.id = ?1", [id.0])?))
      .await?;
    Ok(lessons.into_iter().next())
  }

  async fn lessons_of_student(&self, student: StudentId) -> Result<Vec<Lesson>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(query_lessons(
            conn,
            "JOIN lesson_students ls ON ls.lesson_id = l.id WHERE ls.student_id = ?1",
            [student.0],
          )?)
        })
        .await?,
    )
  }

  async fn lessons_of_professor(&self, professor: ProfessorId) -> Result<Vec<Lesson>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(query_lessons(
            conn,
            "JOIN lesson_professors lp ON lp.lesson_id = l.id WHERE lp.professor_id = ?1",
            [professor.0],
          )?)
        })
        .await?,
    )
  }

  async fn professors_of_lesson(&self, lesson: LessonId) -> Result<Vec<Professor>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(
            "SELECT p.id, p.user_id FROM professors p
             JOIN lesson_professors lp ON lp.professor_id = p.id
             WHERE lp.lesson_id = ?1
             ORDER BY p.id",
          )?;
          let rows = stmt
            .query_map([lesson.0], |r| {
              Ok(Professor { id: ProfessorId(r.get(0)?), user_id: UserId(r.get(1)?) })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn get_skills(&self, ids: &[SkillId]) -> Result<Vec<Skill>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();

    Ok(
      self
        .conn
        .call(move |conn| {
          let sql = format!(
            "SELECT {SKILL_COLUMNS} FROM skills sk
             LEFT JOIN sections sec ON sec.id = sk.section_id
             WHERE sk.id IN ({})
             ORDER BY sk.name, sk.id",
            placeholders(ids.len())
          );
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), skill_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn skills_of_lessons(&self, lessons: &[LessonId]) -> Result<Vec<Skill>> {
    if lessons.is_empty() {
      return Ok(Vec::new());
    }
    let ids: Vec<i64> = lessons.iter().map(|id| id.0).collect();

    Ok(
      self
        .conn
        .call(move |conn| {
          let sql = format!(
            "SELECT DISTINCT {SKILL_COLUMNS} FROM lessons l
             JOIN stage_skills ss ON ss.stage_id = l.stage_id
             JOIN skills sk ON sk.id = ss.skill_id
             LEFT JOIN sections sec ON sec.id = sk.section_id
             WHERE l.id IN ({})
             ORDER BY sk.name, sk.id",
            placeholders(ids.len())
          );
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), skill_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  // ── Threads ───────────────────────────────────────────────────────────────

  async fn create_thread(&self, input: NewThread) -> Result<(Thread, Message)> {
    let at = now();
    let at_str = encode_dt(at);
    let cols = encode_visibility(&input.visibility);
    let title = input.title.clone();
    let content = input.content.clone();
    let author = input.author_id.0;
    let section = input.section_id.map(|s| s.0);
    let attachment = input.attachment.clone();
    let mut skills: Vec<i64> = input.skills.iter().map(|s| s.0).collect();
    skills.sort_unstable();
    skills.dedup();

    let (thread_id, message_id) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO threads (
             title, author_id, visibility, recipient_id, lesson_id, professor_id,
             section_id, created_at, modified_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
          rusqlite::params![
            title,
            author,
            cols.code,
            cols.recipient_id,
            cols.lesson_id,
            cols.professor_id,
            section,
            at_str,
          ],
        )?;
        let thread_id = tx.last_insert_rowid();

        for &skill in &skills {
          let linked = tx.execute(
            "INSERT INTO thread_skills (thread_id, skill_id)
             SELECT ?1, id FROM skills WHERE id = ?2",
            [thread_id, skill],
          )?;
          if linked == 0 {
            // Dropping `tx` rolls the thread back.
            return Ok(Err(Error::UnknownSkill(SkillId(skill))));
          }
        }

        let message_id = insert_message(&tx, thread_id, author, None, &content, &at_str)?;
        if let Some(upload) = &attachment {
          insert_attachment(&tx, message_id, upload)?;
        }

        tx.commit()?;
        Ok(Ok((thread_id, message_id)))
      })
      .await??;

    let thread = Thread {
      id:            ThreadId(thread_id),
      title:         input.title,
      author_id:     input.author_id,
      visibility:    input.visibility,
      section_id:    input.section_id,
      created_date:  at,
      modified_date: at,
    };
    let message = Message {
      id:            MessageId(message_id),
      thread_id:     thread.id,
      author_id:     input.author_id,
      parent_id:     None,
      content:       input.content,
      created_date:  at,
      modified_date: at,
    };
    Ok((thread, message))
  }

  async fn get_thread(&self, id: ThreadId) -> Result<Option<Thread>> {
    let raws = self
      .conn
      .call(move |conn| Ok(query_threads(conn, "t.id = ?1", [id.0])?))
      .await?;
    raws.into_iter().next().map(RawThread::into_thread).transpose()
  }

  async fn thread_skills(&self, id: ThreadId) -> Result<Vec<Skill>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&format!(
            "SELECT {SKILL_COLUMNS} FROM thread_skills ts
             JOIN skills sk ON sk.id = ts.skill_id
             LEFT JOIN sections sec ON sec.id = sk.section_id
             WHERE ts.thread_id = ?1
             ORDER BY sk.name, sk.id"
          ))?;
          let rows = stmt
            .query_map([id.0], skill_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn private_threads(&self, user: UserId) -> Result<Vec<Thread>> {
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_threads(
          conn,
          "t.visibility = 'PRI' AND (t.author_id = ?1 OR t.recipient_id = ?1)",
          [user.0],
        )?)
      })
      .await?;
    decode_all(raws, RawThread::into_thread)
  }

  async fn professor_threads(
    &self,
    professor: ProfessorId,
    professor_user: Option<UserId>,
  ) -> Result<Vec<Thread>> {
    let author = professor_user.map(|u| u.0);
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_threads(
          conn,
          "t.visibility = 'PUT' AND (t.professor_id = ?1 OR t.author_id = ?2)",
          rusqlite::params![professor.0, author],
        )?)
      })
      .await?;
    decode_all(raws, RawThread::into_thread)
  }

  async fn class_threads(&self, lesson: LessonId) -> Result<Vec<Thread>> {
    let raws = self
      .conn
      .call(move |conn| {
        Ok(query_threads(
          conn,
          "t.visibility = 'PUC' AND t.lesson_id = ?1",
          [lesson.0],
        )?)
      })
      .await?;
    decode_all(raws, RawThread::into_thread)
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn get_message(&self, id: MessageId) -> Result<Option<Message>> {
    let raw: Option<RawMessage> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?1"),
            [id.0],
            RawMessage::from_row,
          )
          .optional()?)
      })
      .await?;
    raw.map(RawMessage::into_message).transpose()
  }

  async fn thread_messages(&self, thread: ThreadId) -> Result<Vec<Message>> {
    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages m
           WHERE m.thread_id = ?1
           ORDER BY m.created_at, m.id"
        ))?;
        let rows = stmt
          .query_map([thread.0], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    decode_all(raws, RawMessage::into_message)
  }

  async fn post_reply(&self, input: NewReply) -> Result<Message> {
    let at = now();
    let at_str = encode_dt(at);
    let thread = input.thread_id;
    let author = input.author_id.0;
    let parent = input.parent_id;
    let content = input.content.clone();
    let attachment = input.attachment.clone();

    let message_id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
          .query_row("SELECT id FROM threads WHERE id = ?1", [thread.0], |r| r.get(0))
          .optional()?;
        if exists.is_none() {
          return Ok(Err(Error::ThreadNotFound(thread)));
        }

        if let Some(parent) = parent {
          let parent_thread: Option<i64> = tx
            .query_row("SELECT thread_id FROM messages WHERE id = ?1", [parent.0], |r| {
              r.get(0)
            })
            .optional()?;
          match parent_thread {
            None => return Ok(Err(Error::MessageNotFound(parent))),
            Some(t) if t != thread.0 => {
              return Ok(Err(Error::ForeignParent { parent, thread }));
            }
            Some(_) => {}
          }
        }

        let message_id =
          insert_message(&tx, thread.0, author, parent.map(|p| p.0), &content, &at_str)?;
        if let Some(upload) = &attachment {
          insert_attachment(&tx, message_id, upload)?;
        }
        tx.execute(
          "UPDATE threads SET modified_at = ?2 WHERE id = ?1",
          rusqlite::params![thread.0, at_str],
        )?;

        tx.commit()?;
        Ok(Ok(message_id))
      })
      .await??;

    Ok(Message {
      id:            MessageId(message_id),
      thread_id:     input.thread_id,
      author_id:     input.author_id,
      parent_id:     input.parent_id,
      content:       input.content,
      created_date:  at,
      modified_date: at,
    })
  }

  async fn edit_message(&self, edit: MessageEdit) -> Result<EditOutcome> {
    let at = now();
    let at_str = encode_dt(at);
    let id = edit.message_id;
    let content = edit.content.clone();
    let attachment = edit.attachment.clone();

    let (raw, replaced) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let raw: Option<RawMessage> = tx
          .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?1"),
            [id.0],
            RawMessage::from_row,
          )
          .optional()?;
        let Some(raw) = raw else {
          return Ok(Err(Error::MessageNotFound(id)));
        };

        tx.execute(
          "UPDATE messages SET content = ?2, modified_at = ?3 WHERE id = ?1",
          rusqlite::params![id.0, content, at_str],
        )?;

        let replaced = match &attachment {
          Some(upload) => {
            let old = query_attachments(&tx, "a.message_id = ?1", [id.0])?;
            tx.execute("DELETE FROM attachments WHERE message_id = ?1", [id.0])?;
            insert_attachment(&tx, id.0, upload)?;
            old
          }
          None => Vec::new(),
        };

        tx.commit()?;
        Ok(Ok((raw, replaced)))
      })
      .await??;

    let mut message = raw.into_message()?;
    message.content = edit.content;
    message.modified_date = at;

    Ok(EditOutcome {
      message,
      replaced: decode_all(replaced, RawAttachment::into_attachment)?,
    })
  }

  async fn delete_message(&self, id: MessageId) -> Result<DeleteOutcome> {
    let (removed, thread_deleted) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let thread: Option<i64> = tx
          .query_row("SELECT thread_id FROM messages WHERE id = ?1", [id.0], |r| {
            r.get(0)
          })
          .optional()?;
        let Some(thread) = thread else {
          return Ok(Err(Error::MessageNotFound(id)));
        };

        let removed = query_attachments(&tx, "a.message_id = ?1", [id.0])?;
        tx.execute("DELETE FROM attachments WHERE message_id = ?1", [id.0])?;
        tx.execute("DELETE FROM messages WHERE id = ?1", [id.0])?;

        let remaining: i64 = tx.query_row(
          "SELECT COUNT(*) FROM messages WHERE thread_id = ?1",
          [thread],
          |r| r.get(0),
        )?;
        let thread_deleted = remaining == 0;
        if thread_deleted {
          tx.execute("DELETE FROM threads WHERE id = ?1", [thread])?;
        }

        tx.commit()?;
        Ok(Ok((removed, thread_deleted)))
      })
      .await??;

    Ok(DeleteOutcome {
      removed_attachments: decode_all(removed, RawAttachment::into_attachment)?,
      thread_deleted,
    })
  }

  async fn attachments_of(&self, message: MessageId) -> Result<Vec<Attachment>> {
    let raws = self
      .conn
      .call(move |conn| Ok(query_attachments(conn, "a.message_id = ?1", [message.0])?))
      .await?;
    decode_all(raws, RawAttachment::into_attachment)
  }

  async fn thread_attachments(&self, thread: ThreadId) -> Result<Vec<Attachment>> {
    let raws = self
      .conn
      .call(move |conn| Ok(query_attachments(conn, "m.thread_id = ?1", [thread.0])?))
      .await?;
    decode_all(raws, RawAttachment::into_attachment)
  }

  async fn get_attachment(&self, id: AttachmentId) -> Result<Option<Attachment>> {
    let raws = self
      .conn
      .call(move |conn| Ok(query_attachments(conn, "a.id = ?1", [id.0])?))
      .await?;
    raws.into_iter().next().map(RawAttachment::into_attachment).transpose()
  }

  // ── Read tracking ─────────────────────────────────────────────────────────

  async fn touch_last_visit(
    &self,
    user: UserId,
    thread: ThreadId,
    now: DateTime<Utc>,
  ) -> Result<Option<DateTime<Utc>>> {
    let now_str = encode_dt(now);

    let previous: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let previous: Option<String> = tx
          .query_row(
            "SELECT visited_at FROM last_visits WHERE user_id = ?1 AND thread_id = ?2",
            [user.0, thread.0],
            |r| r.get(0),
          )
          .optional()?;
        tx.execute(
          "INSERT INTO last_visits (user_id, thread_id, visited_at) VALUES (?1, ?2, ?3)
           ON CONFLICT (user_id, thread_id) DO UPDATE SET visited_at = excluded.visited_at",
          rusqlite::params![user.0, thread.0, now_str],
        )?;
        tx.commit()?;
        Ok(previous)
      })
      .await?;

    previous.as_deref().map(decode_dt).transpose()
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn save_notification(&self, input: NewNotification) -> Result<Notification> {
    let at = now();
    let at_str = encode_dt(at);
    let audience_json = serde_json::to_string(&input.audience)?;
    let params_json = serde_json::to_string(&input.params)?;
    let medium: &'static str = input.medium.into();
    let kind: &'static str = input.kind.into();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notifications (audience_json, medium, kind, params_json, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![audience_json, medium, kind, params_json, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Notification {
      id:           NotificationId(id),
      audience:     input.audience,
      medium:       input.medium,
      kind:         input.kind,
      params:       input.params,
      created_date: at,
    })
  }
}
