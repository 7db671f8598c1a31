//! The thread visibility model.
//!
//! A thread targets at most one of a recipient, a lesson or a professor, and
//! that target decides who sees it. [`Visibility`] is the single tagged form of
//! that choice; [`Visibility::from_targets`] is the only place the three raw
//! optional references are turned into it, and every other component asks
//! [`classify`] rather than re-inspecting the targets.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
  error::{ValidationError, ValidationErrors},
  ids::{LessonId, ProfessorId, UserId},
  thread::Thread,
};

/// The three visibility scopes, without their target.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
pub enum VisibilityKind {
  #[serde(rename = "private")]
  #[strum(serialize = "PRI")]
  Private,
  #[serde(rename = "class")]
  #[strum(serialize = "PUC")]
  PublicClass,
  #[serde(rename = "public")]
  #[strum(serialize = "PUT")]
  PublicProfessor,
}

/// Who a thread is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Visibility {
  /// A 1:1 conversation. `recipient` is `None` only for threads that were
  /// created without any target at the model layer.
  Private { recipient: Option<UserId> },
  /// Visible to every member of a lesson.
  PublicClass { lesson: LessonId },
  /// Addressed publicly to a professor and visible in their classes.
  PublicProfessor { professor: ProfessorId },
}

impl Visibility {
  pub fn kind(&self) -> VisibilityKind {
    match self {
      Self::Private { .. } => VisibilityKind::Private,
      Self::PublicClass { .. } => VisibilityKind::PublicClass,
      Self::PublicProfessor { .. } => VisibilityKind::PublicProfessor,
    }
  }

  /// Build the tagged form from the three mutually exclusive references.
  pub fn from_targets(
    targets: ThreadTargets,
  ) -> Result<Self, ValidationError> {
    match (targets.recipient, targets.lesson, targets.professor) {
      (recipient, None, None) => Ok(Self::Private { recipient }),
      (None, Some(lesson), None) => Ok(Self::PublicClass { lesson }),
      (None, None, Some(professor)) => Ok(Self::PublicProfessor { professor }),
      _ => Err(ValidationError::ConflictingVisibility),
    }
  }

  /// The inverse of [`Visibility::from_targets`]; used by storage encoders.
  pub fn targets(&self) -> ThreadTargets {
    match *self {
      Self::Private { recipient } => ThreadTargets { recipient, ..Default::default() },
      Self::PublicClass { lesson } => {
        ThreadTargets { lesson: Some(lesson), ..Default::default() }
      }
      Self::PublicProfessor { professor } => {
        ThreadTargets { professor: Some(professor), ..Default::default() }
      }
    }
  }

  pub fn recipient(&self) -> Option<UserId> {
    match *self {
      Self::Private { recipient } => recipient,
      _ => None,
    }
  }

  pub fn lesson(&self) -> Option<LessonId> {
    match *self {
      Self::PublicClass { lesson } => Some(lesson),
      _ => None,
    }
  }

  pub fn professor(&self) -> Option<ProfessorId> {
    match *self {
      Self::PublicProfessor { professor } => Some(professor),
      _ => None,
    }
  }
}

/// The raw, possibly conflicting, target references of a thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadTargets {
  pub recipient: Option<UserId>,
  pub lesson:    Option<LessonId>,
  pub professor: Option<ProfessorId>,
}

impl ThreadTargets {
  pub fn is_empty(&self) -> bool {
    self.recipient.is_none() && self.lesson.is_none() && self.professor.is_none()
  }
}

/// An unsaved thread header as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadDraft {
  pub title:   String,
  pub targets: ThreadTargets,
}

/// The visibility kind of a stored thread.
pub fn classify(thread: &Thread) -> VisibilityKind { thread.visibility.kind() }

/// Check a draft header, collecting every problem.
///
/// A draft with no target at all is accepted here and classified as
/// [`Visibility::Private`] without a recipient; the submission flow in
/// [`crate::forum`] is stricter.
pub fn validate(draft: &ThreadDraft) -> Result<Visibility, ValidationErrors> {
  let mut errors = ValidationErrors::new();

  if draft.title.trim().is_empty() {
    errors.push(ValidationError::EmptyTitle);
  }

  match Visibility::from_targets(draft.targets) {
    Ok(visibility) => errors.into_result(visibility),
    Err(e) => {
      errors.push(e);
      Err(errors)
    }
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use chrono::Utc;

  use super::*;
  use crate::ids::ThreadId;

  fn draft(title: &str, targets: ThreadTargets) -> ThreadDraft {
    ThreadDraft { title: title.into(), targets }
  }

  #[test]
  fn recipient_and_professor_conflict() {
    let targets = ThreadTargets {
      recipient: Some(UserId(2)),
      professor: Some(ProfessorId(1)),
      ..Default::default()
    };
    let errors = validate(&draft("Help", targets)).unwrap_err();
    assert!(errors.contains(&ValidationError::ConflictingVisibility));
  }

  #[test]
  fn all_three_targets_conflict() {
    let targets = ThreadTargets {
      recipient: Some(UserId(2)),
      lesson:    Some(LessonId(4)),
      professor: Some(ProfessorId(1)),
    };
    assert_eq!(
      Visibility::from_targets(targets),
      Err(ValidationError::ConflictingVisibility)
    );
  }

  #[test]
  fn blank_title_and_conflict_are_both_reported() {
    let targets = ThreadTargets {
      lesson:    Some(LessonId(4)),
      professor: Some(ProfessorId(1)),
      ..Default::default()
    };
    let errors = validate(&draft("   ", targets)).unwrap_err();
    assert!(errors.contains(&ValidationError::EmptyTitle));
    assert!(errors.contains(&ValidationError::ConflictingVisibility));
  }

  #[test]
  fn each_single_target_maps_to_its_kind() {
    let private = ThreadTargets { recipient: Some(UserId(2)), ..Default::default() };
    let class = ThreadTargets { lesson: Some(LessonId(4)), ..Default::default() };
    let public = ThreadTargets { professor: Some(ProfessorId(1)), ..Default::default() };

    assert_eq!(
      validate(&draft("Help", private)).unwrap().kind(),
      VisibilityKind::Private
    );
    assert_eq!(
      validate(&draft("Help", class)).unwrap().kind(),
      VisibilityKind::PublicClass
    );
    assert_eq!(
      validate(&draft("Help", public)).unwrap().kind(),
      VisibilityKind::PublicProfessor
    );
  }

  #[test]
  fn no_target_is_private_without_recipient() {
    let visibility = validate(&draft("Help", ThreadTargets::default())).unwrap();
    assert_eq!(visibility, Visibility::Private { recipient: None });
  }

  #[test]
  fn targets_round_trip_through_visibility() {
    let targets = ThreadTargets { professor: Some(ProfessorId(8)), ..Default::default() };
    let visibility = Visibility::from_targets(targets).unwrap();
    assert_eq!(visibility.targets(), targets);
    assert_eq!(visibility.professor(), Some(ProfessorId(8)));
    assert_eq!(visibility.lesson(), None);
  }

  #[test]
  fn classify_is_stable() {
    let now = Utc::now();
    let thread = Thread {
      id:            ThreadId(1),
      title:         "Help".into(),
      author_id:     UserId(1),
      visibility:    Visibility::PublicClass { lesson: LessonId(3) },
      section_id:    None,
      created_date:  now,
      modified_date: now,
    };
    let first = classify(&thread);
    for _ in 0..3 {
      assert_eq!(classify(&thread), first);
    }
    assert_eq!(first, VisibilityKind::PublicClass);
  }

  #[test]
  fn storage_codes() {
    assert_eq!(VisibilityKind::Private.to_string(), "PRI");
    assert_eq!(VisibilityKind::from_str("PUT").unwrap(), VisibilityKind::PublicProfessor);
    let code: &'static str = VisibilityKind::PublicClass.into();
    assert_eq!(code, "PUC");
  }
}
