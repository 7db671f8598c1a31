//! The authorization engine.
//!
//! Decisions are pure functions of the thread, its reply tree, the message
//! and an [`Actor`] snapshot. The snapshot is loaded from the store at the
//! start of every request; nothing is cached between requests.

use std::fmt;

use serde::Serialize;

use crate::{
  directory::{Professor, Profile},
  ids::{LessonId, ProfessorId, StudentId, UserId},
  store::ForumStore,
  thread::{Message, Thread},
  tree::ReplyTree,
  visibility::Visibility,
};

// ─── Actor ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum Role {
  Student(StudentId),
  Professor(ProfessorId),
  /// Neither profile exists for the user.
  Guest,
}

/// Who is asking, and which classes they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
  pub user_id:    UserId,
  pub role:       Role,
  /// Lessons the user is enrolled in (students) or teaches (professors).
  pub lessons:    Vec<LessonId>,
  /// Every professor teaching one of `lessons`.
  pub professors: Vec<Professor>,
}

impl Actor {
  /// An actor with no profile and no memberships.
  pub fn guest(user_id: UserId) -> Self {
    Self { user_id, role: Role::Guest, lessons: Vec::new(), professors: Vec::new() }
  }

  /// Resolve the actor's profile and memberships from the store.
  pub async fn load<S: ForumStore>(
    store: &S,
    user_id: UserId,
  ) -> Result<Self, S::Error> {
    let (role, lessons) = match store.profile_of(user_id).await? {
      Some(Profile::Student(student)) => {
        (Role::Student(student.id), store.lessons_of_student(student.id).await?)
      }
      Some(Profile::Professor(professor)) => (
        Role::Professor(professor.id),
        store.lessons_of_professor(professor.id).await?,
      ),
      None => return Ok(Self::guest(user_id)),
    };
    let lessons: Vec<LessonId> = lessons.into_iter().map(|l| l.id).collect();

    let mut professors: Vec<Professor> = Vec::new();
    for &lesson in &lessons {
      for professor in store.professors_of_lesson(lesson).await? {
        if !professors.iter().any(|p| p.id == professor.id) {
          professors.push(professor);
        }
      }
    }

    Ok(Self { user_id, role, lessons, professors })
  }

  pub fn professor_id(&self) -> Option<ProfessorId> {
    match self.role {
      Role::Professor(id) => Some(id),
      _ => None,
    }
  }

  pub fn student_id(&self) -> Option<StudentId> {
    match self.role {
      Role::Student(id) => Some(id),
      _ => None,
    }
  }

  /// A professor who teaches `lesson`.
  pub fn teaches(&self, lesson: LessonId) -> bool {
    self.professor_id().is_some() && self.lessons.contains(&lesson)
  }
}

// ─── Decisions ───────────────────────────────────────────────────────────────

/// Why an edit or delete was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Denied {
  /// The message does not belong to the thread it was addressed through.
  ThreadMismatch,
  /// Replied-to messages are frozen; delete from the leaves up.
  HasReplies,
  /// The actor is neither the author nor an entitled professor.
  NotPermitted,
  /// The actor cannot see the thread at all.
  NotVisible,
}

impl fmt::Display for Denied {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::ThreadMismatch => "message does not belong to this thread",
      Self::HasReplies => "message already has replies",
      Self::NotPermitted => "permissions missing to modify this message",
      Self::NotVisible => "thread is not visible to this user",
    })
  }
}

/// Decide whether `actor` may edit or delete `message`.
pub fn check_modify(
  thread: &Thread,
  tree: &ReplyTree,
  message: &Message,
  actor: &Actor,
) -> Result<(), Denied> {
  if message.thread_id != thread.id {
    return Err(Denied::ThreadMismatch);
  }
  if tree.has_replies(message.id) {
    return Err(Denied::HasReplies);
  }

  let is_author = message.author_id == actor.user_id;
  let allowed = match thread.visibility {
    Visibility::Private { .. } => is_author,
    Visibility::PublicProfessor { professor } => match actor.professor_id() {
      Some(own) => is_author || own == professor,
      None => is_author,
    },
    Visibility::PublicClass { lesson } => actor.teaches(lesson) || is_author,
  };

  if allowed { Ok(()) } else { Err(Denied::NotPermitted) }
}

pub fn can_modify(
  thread: &Thread,
  tree: &ReplyTree,
  message: &Message,
  actor: &Actor,
) -> bool {
  check_modify(thread, tree, message, actor).is_ok()
}

/// Decide whether `actor` may open, reply to, or download from `thread`.
///
/// Every thread returned by [`crate::dashboard::all_visible_threads`] passes
/// this check.
pub fn can_read(thread: &Thread, actor: &Actor) -> bool {
  if thread.author_id == actor.user_id {
    return true;
  }

  match thread.visibility {
    Visibility::Private { recipient } => recipient == Some(actor.user_id),
    Visibility::PublicClass { lesson } => actor.lessons.contains(&lesson),
    Visibility::PublicProfessor { professor } => {
      actor.professor_id() == Some(professor)
        || actor
          .professors
          .iter()
          .any(|p| p.id == professor || p.user_id == thread.author_id)
    }
  }
}

pub fn check_read(thread: &Thread, actor: &Actor) -> Result<(), Denied> {
  if can_read(thread, actor) { Ok(()) } else { Err(Denied::NotVisible) }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, Utc};

  use super::*;
  use crate::ids::{MessageId, ThreadId};

  const AUTHOR: UserId = UserId(1);
  const OTHER: UserId = UserId(2);
  const PROF_USER: UserId = UserId(10);

  fn thread(visibility: Visibility) -> Thread {
    let now = Utc::now();
    Thread {
      id: ThreadId(1),
      title: "Help".into(),
      author_id: AUTHOR,
      visibility,
      section_id: None,
      created_date: now,
      modified_date: now,
    }
  }

  fn message(id: i64, author: UserId, parent: Option<i64>) -> Message {
    let at = Utc::now() + Duration::milliseconds(id);
    Message {
      id:            MessageId(id),
      thread_id:     ThreadId(1),
      author_id:     author,
      parent_id:     parent.map(MessageId),
      content:       "hello".into(),
      created_date:  at,
      modified_date: at,
    }
  }

  fn student(user: UserId, lessons: &[i64]) -> Actor {
    Actor {
      user_id:    user,
      role:       Role::Student(StudentId(user.0)),
      lessons:    lessons.iter().copied().map(LessonId).collect(),
      professors: vec![Professor { id: ProfessorId(1), user_id: PROF_USER }],
    }
  }

  fn professor(user: UserId, id: i64, lessons: &[i64]) -> Actor {
    Actor {
      user_id:    user,
      role:       Role::Professor(ProfessorId(id)),
      lessons:    lessons.iter().copied().map(LessonId).collect(),
      professors: vec![Professor { id: ProfessorId(id), user_id: user }],
    }
  }

  #[test]
  fn message_from_another_thread_is_rejected() {
    let t = thread(Visibility::Private { recipient: Some(OTHER) });
    let mut m = message(1, AUTHOR, None);
    m.thread_id = ThreadId(99);
    let tree = ReplyTree::new(vec![m.clone()]);
    assert_eq!(
      check_modify(&t, &tree, &m, &student(AUTHOR, &[])),
      Err(Denied::ThreadMismatch)
    );
  }

  #[test]
  fn replied_message_is_frozen_even_for_its_author() {
    let t = thread(Visibility::Private { recipient: Some(OTHER) });
    let root = message(1, AUTHOR, None);
    let reply = message(2, OTHER, Some(1));
    let tree = ReplyTree::new(vec![root.clone(), reply.clone()]);

    assert_eq!(
      check_modify(&t, &tree, &root, &student(AUTHOR, &[])),
      Err(Denied::HasReplies)
    );
    assert!(can_modify(&t, &tree, &reply, &student(OTHER, &[])));
  }

  #[test]
  fn private_thread_only_author_modifies() {
    let t = thread(Visibility::Private { recipient: Some(OTHER) });
    let m = message(1, AUTHOR, None);
    let tree = ReplyTree::new(vec![m.clone()]);
    assert!(can_modify(&t, &tree, &m, &student(AUTHOR, &[])));
    assert!(!can_modify(&t, &tree, &m, &student(OTHER, &[])));
    assert!(!can_modify(&t, &tree, &m, &professor(PROF_USER, 1, &[])));
  }

  #[test]
  fn public_professor_thread_targeted_professor_may_modify() {
    let t = thread(Visibility::PublicProfessor { professor: ProfessorId(1) });
    let m = message(1, AUTHOR, None);
    let tree = ReplyTree::new(vec![m.clone()]);
    assert!(can_modify(&t, &tree, &m, &professor(PROF_USER, 1, &[])));
  }

  #[test]
  fn public_professor_thread_other_professor_may_not_modify() {
    let t = thread(Visibility::PublicProfessor { professor: ProfessorId(1) });
    let m = message(1, AUTHOR, None);
    let tree = ReplyTree::new(vec![m.clone()]);
    assert_eq!(
      check_modify(&t, &tree, &m, &professor(UserId(11), 2, &[])),
      Err(Denied::NotPermitted)
    );

    // ...but their own message stays theirs.
    let own = message(2, UserId(11), None);
    let tree = ReplyTree::new(vec![m, own.clone()]);
    assert!(can_modify(&t, &tree, &own, &professor(UserId(11), 2, &[])));
  }

  #[test]
  fn public_professor_thread_student_needs_authorship() {
    let t = thread(Visibility::PublicProfessor { professor: ProfessorId(1) });
    let m = message(1, AUTHOR, None);
    let tree = ReplyTree::new(vec![m.clone()]);
    assert!(can_modify(&t, &tree, &m, &student(AUTHOR, &[])));
    assert!(!can_modify(&t, &tree, &m, &student(OTHER, &[])));
  }

  #[test]
  fn public_class_thread_professor_of_lesson_moderates() {
    let t = thread(Visibility::PublicClass { lesson: LessonId(5) });
    let m = message(1, AUTHOR, None);
    let tree = ReplyTree::new(vec![m.clone()]);

    assert!(can_modify(&t, &tree, &m, &professor(PROF_USER, 1, &[5])));
    assert!(!can_modify(&t, &tree, &m, &professor(PROF_USER, 1, &[6])));
    // Enrolment alone is not moderation.
    assert!(!can_modify(&t, &tree, &m, &student(OTHER, &[5])));
    assert!(can_modify(&t, &tree, &m, &student(AUTHOR, &[5])));
  }

  #[test]
  fn private_thread_readable_by_participants_only() {
    let t = thread(Visibility::Private { recipient: Some(OTHER) });
    assert!(can_read(&t, &student(AUTHOR, &[])));
    assert!(can_read(&t, &student(OTHER, &[])));
    assert!(!can_read(&t, &student(UserId(3), &[1])));
    assert_eq!(check_read(&t, &Actor::guest(UserId(3))), Err(Denied::NotVisible));
  }

  #[test]
  fn class_thread_readable_by_members() {
    let t = thread(Visibility::PublicClass { lesson: LessonId(5) });
    assert!(can_read(&t, &student(OTHER, &[5])));
    assert!(can_read(&t, &professor(PROF_USER, 1, &[5])));
    assert!(!can_read(&t, &student(OTHER, &[6])));
  }

  #[test]
  fn professor_thread_readable_through_their_classes() {
    let t = thread(Visibility::PublicProfessor { professor: ProfessorId(1) });
    // `student` lists professor 1 among the teachers of its lessons.
    assert!(can_read(&t, &student(OTHER, &[5])));
    assert!(can_read(&t, &professor(PROF_USER, 1, &[])));
    assert!(!can_read(&t, &professor(UserId(11), 2, &[])));
    assert!(!can_read(&t, &Actor::guest(OTHER)));
  }
}
