//! The dashboard aggregator: every thread a user can see, once.
//!
//! Each source query may return the same thread through several paths (a
//! professor teaching two of a student's lessons, for instance). The union is
//! deduplicated by id and keeps first-seen order; display ordering is the
//! caller's business.

use std::collections::HashSet;

use crate::{
  directory::Profile,
  ids::{LessonId, ProfessorId, StudentId, UserId},
  store::ForumStore,
  thread::Thread,
  visibility::{VisibilityKind, classify},
};

/// Keep the first occurrence of every thread id.
pub fn dedup_by_id(threads: impl IntoIterator<Item = Thread>) -> Vec<Thread> {
  let mut seen = HashSet::new();
  threads.into_iter().filter(|t| seen.insert(t.id)).collect()
}

fn of_kind(threads: Vec<Thread>, kind: VisibilityKind) -> impl Iterator<Item = Thread> {
  threads.into_iter().filter(move |t| classify(t) == kind)
}

/// Private threads the user wrote or receives.
pub async fn private_threads<S: ForumStore>(
  store: &S,
  user: UserId,
) -> Result<Vec<Thread>, S::Error> {
  let threads = store.private_threads(user).await?;
  Ok(dedup_by_id(of_kind(threads, VisibilityKind::Private)))
}

/// PublicProfessor threads authored by or targeting any professor of any
/// lesson the student is enrolled in.
pub async fn public_professor_threads_for_student<S: ForumStore>(
  store: &S,
  student: StudentId,
) -> Result<Vec<Thread>, S::Error> {
  let mut out = Vec::new();
  for lesson in store.lessons_of_student(student).await? {
    for professor in store.professors_of_lesson(lesson.id).await? {
      let threads = store
        .professor_threads(professor.id, Some(professor.user_id))
        .await?;
      out.extend(of_kind(threads, VisibilityKind::PublicProfessor));
    }
  }
  Ok(dedup_by_id(out))
}

/// PublicProfessor threads addressed to `professor`.
pub async fn public_professor_threads_for_professor<S: ForumStore>(
  store: &S,
  professor: ProfessorId,
) -> Result<Vec<Thread>, S::Error> {
  let threads = store.professor_threads(professor, None).await?;
  Ok(dedup_by_id(
    of_kind(threads, VisibilityKind::PublicProfessor)
      .filter(|t| t.visibility.professor() == Some(professor)),
  ))
}

/// PublicClass threads of the given lessons.
pub async fn public_class_threads<S: ForumStore>(
  store: &S,
  lessons: &[LessonId],
) -> Result<Vec<Thread>, S::Error> {
  let mut out = Vec::new();
  for &lesson in lessons {
    let threads = store.class_threads(lesson).await?;
    out.extend(of_kind(threads, VisibilityKind::PublicClass));
  }
  Ok(dedup_by_id(out))
}

/// The union of every visibility path available to `user`. A user with
/// neither a Student nor a Professor profile sees nothing.
pub async fn all_visible_threads<S: ForumStore>(
  store: &S,
  user: UserId,
) -> Result<Vec<Thread>, S::Error> {
  let (professor_path, lessons) = match store.profile_of(user).await? {
    Some(Profile::Student(student)) => (
      public_professor_threads_for_student(store, student.id).await?,
      store.lessons_of_student(student.id).await?,
    ),
    Some(Profile::Professor(professor)) => (
      public_professor_threads_for_professor(store, professor.id).await?,
      store.lessons_of_professor(professor.id).await?,
    ),
    None => return Ok(Vec::new()),
  };

  let lesson_ids: Vec<LessonId> = lessons.iter().map(|l| l.id).collect();
  let private = private_threads(store, user).await?;
  let class = public_class_threads(store, &lesson_ids).await?;

  Ok(dedup_by_id(private.into_iter().chain(professor_path).chain(class)))
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::{ids::ThreadId, visibility::Visibility};

  fn thread(id: i64) -> Thread {
    let now = Utc::now();
    Thread {
      id:            ThreadId(id),
      title:         format!("thread {id}"),
      author_id:     UserId(1),
      visibility:    Visibility::Private { recipient: None },
      section_id:    None,
      created_date:  now,
      modified_date: now,
    }
  }

  #[test]
  fn dedup_keeps_first_seen_order() {
    let threads = vec![thread(3), thread(1), thread(3), thread(2), thread(1)];
    let ids: Vec<i64> = dedup_by_id(threads).iter().map(|t| t.id.0).collect();
    assert_eq!(ids, vec![3, 1, 2]);
  }
}
