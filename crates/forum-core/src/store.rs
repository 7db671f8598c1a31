//! The `ForumStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `forum-store-sqlite`).
//! The [`crate::Forum`] service and the API layer depend on this abstraction,
//! not on any concrete backend.
//!
//! Every multi-row write (`create_thread`, `post_reply`, `edit_message`,
//! `delete_message`) must be a single transaction: either all of its rows
//! change or none do.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  directory::{Lesson, Professor, Profile, Section, Skill, User},
  ids::{
    AttachmentId, LessonId, MessageId, ProfessorId, SectionId, SkillId,
    StudentId, ThreadId, UserId,
  },
  notify::{NewNotification, Notification},
  thread::{
    Attachment, DeleteOutcome, EditOutcome, Message, MessageEdit, NewReply,
    NewThread, Thread,
  },
};

/// Abstraction over a forum persistence backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ForumStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Directory lookups ─────────────────────────────────────────────────

  fn get_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// The user and their argon2 PHC password hash, if they have one.
  fn user_credentials<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<(User, String)>, Self::Error>> + Send + 'a;

  /// The Student profile if one exists, otherwise the Professor profile.
  fn profile_of(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  fn get_professor(
    &self,
    id: ProfessorId,
  ) -> impl Future<Output = Result<Option<Professor>, Self::Error>> + Send + '_;

  fn get_section(
    &self,
    id: SectionId,
  ) -> impl Future<Output = Result<Option<Section>, Self::Error>> + Send + '_;

  fn get_lesson(
    &self,
    id: LessonId,
  ) -> impl Future<Output = Result<Option<Lesson>, Self::Error>> + Send + '_;

  /// Lessons the student is enrolled in, by id.
  fn lessons_of_student(
    &self,
    student: StudentId,
  ) -> impl Future<Output = Result<Vec<Lesson>, Self::Error>> + Send + '_;

  /// Lessons the professor teaches, by id.
  fn lessons_of_professor(
    &self,
    professor: ProfessorId,
  ) -> impl Future<Output = Result<Vec<Lesson>, Self::Error>> + Send + '_;

  fn professors_of_lesson(
    &self,
    lesson: LessonId,
  ) -> impl Future<Output = Result<Vec<Professor>, Self::Error>> + Send + '_;

  /// The skills among `ids` that exist. Unknown ids are simply absent.
  fn get_skills<'a>(
    &'a self,
    ids: &'a [SkillId],
  ) -> impl Future<Output = Result<Vec<Skill>, Self::Error>> + Send + 'a;

  /// Skills attached to the stages of the given lessons.
  fn skills_of_lessons<'a>(
    &'a self,
    lessons: &'a [LessonId],
  ) -> impl Future<Output = Result<Vec<Skill>, Self::Error>> + Send + 'a;

  // ── Threads ───────────────────────────────────────────────────────────

  /// Insert the thread, its skill links and its first message (with its
  /// attachment, if any) in one transaction.
  fn create_thread(
    &self,
    input: NewThread,
  ) -> impl Future<Output = Result<(Thread, Message), Self::Error>> + Send + '_;

  fn get_thread(
    &self,
    id: ThreadId,
  ) -> impl Future<Output = Result<Option<Thread>, Self::Error>> + Send + '_;

  fn thread_skills(
    &self,
    id: ThreadId,
  ) -> impl Future<Output = Result<Vec<Skill>, Self::Error>> + Send + '_;

  /// Private threads the user authored or receives.
  fn private_threads(
    &self,
    user: UserId,
  ) -> impl Future<Output = Result<Vec<Thread>, Self::Error>> + Send + '_;

  /// PublicProfessor threads targeting `professor`, or authored by
  /// `professor_user`.
  fn professor_threads(
    &self,
    professor: ProfessorId,
    professor_user: Option<UserId>,
  ) -> impl Future<Output = Result<Vec<Thread>, Self::Error>> + Send + '_;

  /// PublicClass threads targeting `lesson`.
  fn class_threads(
    &self,
    lesson: LessonId,
  ) -> impl Future<Output = Result<Vec<Thread>, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  fn get_message(
    &self,
    id: MessageId,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + '_;

  /// All messages of the thread, oldest first.
  fn thread_messages(
    &self,
    thread: ThreadId,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  /// Insert a reply and bump the thread's `modified_date`, atomically.
  fn post_reply(
    &self,
    input: NewReply,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// Replace a message's content (and attachment, if one is given).
  fn edit_message(
    &self,
    edit: MessageEdit,
  ) -> impl Future<Output = Result<EditOutcome, Self::Error>> + Send + '_;

  /// Delete a message and its attachment rows; delete the thread too when
  /// no message is left.
  fn delete_message(
    &self,
    id: MessageId,
  ) -> impl Future<Output = Result<DeleteOutcome, Self::Error>> + Send + '_;

  fn attachments_of(
    &self,
    message: MessageId,
  ) -> impl Future<Output = Result<Vec<Attachment>, Self::Error>> + Send + '_;

  /// Attachments of every message in the thread.
  fn thread_attachments(
    &self,
    thread: ThreadId,
  ) -> impl Future<Output = Result<Vec<Attachment>, Self::Error>> + Send + '_;

  fn get_attachment(
    &self,
    id: AttachmentId,
  ) -> impl Future<Output = Result<Option<Attachment>, Self::Error>> + Send + '_;

  // ── Read tracking ─────────────────────────────────────────────────────

  /// Set the user's last visit of the thread to `now` and return the value
  /// it had before, if any.
  fn touch_last_visit(
    &self,
    user: UserId,
    thread: ThreadId,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  fn save_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;
}
