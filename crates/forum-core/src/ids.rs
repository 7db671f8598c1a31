//! Integer identifiers exchanged with the persistence store.
//!
//! Every entity gets its own newtype so a `LessonId` can never be passed
//! where a `ProfessorId` is expected. All of them serialize as bare integers.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
  ($($(#[$meta:meta])* $name:ident),* $(,)?) => {$(
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
      Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
      }
    }

    impl From<i64> for $name {
      fn from(raw: i64) -> Self { Self(raw) }
    }
  )*};
}

id_type! {
  /// A platform account.
  UserId,
  /// The professor profile attached to a user.
  ProfessorId,
  /// The student profile attached to a user.
  StudentId,
  /// A class grouping students and professors.
  LessonId,
  /// A curriculum stage; lessons belong to one, skills are attached to it.
  StageId,
  SkillId,
  SectionId,
  ThreadId,
  MessageId,
  AttachmentId,
  NotificationId,
}
