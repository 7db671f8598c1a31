//! Directory entities — users, profiles, lessons and skills.
//!
//! These are owned by the surrounding education platform. The forum only ever
//! reads them, so they carry no lifecycle of their own here.

use serde::{Deserialize, Serialize};

use crate::ids::{
  LessonId, ProfessorId, SectionId, SkillId, StageId, StudentId, UserId,
};

/// A platform account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:         UserId,
  pub username:   String,
  pub first_name: String,
  pub last_name:  String,
}

impl User {
  /// "First Last" when either part is known, the username otherwise.
  pub fn display_name(&self) -> String {
    let full = format!("{} {}", self.first_name, self.last_name);
    let full = full.trim();
    if full.is_empty() {
      self.username.clone()
    } else {
      full.to_owned()
    }
  }

  pub fn summary(&self) -> UserSummary {
    UserSummary {
      id:           self.id,
      username:     self.username.clone(),
      display_name: self.display_name(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Professor {
  pub id:      ProfessorId,
  pub user_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Student {
  pub id:      StudentId,
  pub user_id: UserId,
}

/// The profile a user resolves to. Student wins when both exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Profile {
  Student(Student),
  Professor(Professor),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
  pub id:       LessonId,
  pub name:     String,
  pub stage_id: Option<StageId>,
}

impl Lesson {
  pub fn summary(&self) -> LessonSummary {
    LessonSummary { id: self.id, name: self.name.clone() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Section {
  pub id:   SectionId,
  pub name: String,
}

/// A curriculum skill used to tag threads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Skill {
  pub id:      SkillId,
  pub code:    String,
  pub name:    String,
  pub section: Option<Section>,
}

// ─── Summaries ───────────────────────────────────────────────────────────────

/// The slice of a [`User`] that travels inside notification payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
  pub id:           UserId,
  pub username:     String,
  pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonSummary {
  pub id:   LessonId,
  pub name: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_name_falls_back_to_username() {
    let mut user = User {
      id:         UserId(1),
      username:   "brandon".into(),
      first_name: String::new(),
      last_name:  String::new(),
    };
    assert_eq!(user.display_name(), "brandon");

    user.last_name = "Stark".into();
    assert_eq!(user.display_name(), "Stark");

    user.first_name = "Brandon".into();
    assert_eq!(user.summary().display_name, "Brandon Stark");
  }
}
