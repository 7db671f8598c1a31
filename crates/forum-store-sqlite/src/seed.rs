//! Bulk import of directory data (users, profiles, lessons, skills).
//!
//! The forum never writes these tables during normal operation; a deployment
//! loads them from a JSON export of the surrounding platform. Ids are kept as
//! given so thread targets stay stable across re-imports.

use serde::Deserialize;
use tracing::info;

use crate::{Result, SqliteStore};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectorySeed {
  pub users:      Vec<SeedUser>,
  pub students:   Vec<SeedProfile>,
  pub professors: Vec<SeedProfile>,
  pub stages:     Vec<SeedNamed>,
  pub lessons:    Vec<SeedLesson>,
  pub sections:   Vec<SeedNamed>,
  pub skills:     Vec<SeedSkill>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
  pub id:            i64,
  pub username:      String,
  #[serde(default)]
  pub first_name:    String,
  #[serde(default)]
  pub last_name:     String,
  /// argon2 PHC string, as printed by `forum-server --hash-password`.
  #[serde(default)]
  pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedProfile {
  pub id:      i64,
  pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedNamed {
  pub id:   i64,
  pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedLesson {
  pub id:         i64,
  pub name:       String,
  #[serde(default)]
  pub stage_id:   Option<i64>,
  #[serde(default)]
  pub students:   Vec<i64>,
  #[serde(default)]
  pub professors: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedSkill {
  pub id:         i64,
  pub code:       String,
  pub name:       String,
  #[serde(default)]
  pub section_id: Option<i64>,
  /// Stages whose lessons may tag threads with this skill.
  #[serde(default)]
  pub stages:     Vec<i64>,
}

impl DirectorySeed {
  pub fn from_json(s: &str) -> Result<Self> { Ok(serde_json::from_str(s)?) }
}

impl SqliteStore {
  /// Upsert every row of `seed` in one transaction.
  pub async fn import_directory(&self, seed: DirectorySeed) -> Result<()> {
    let counts = (seed.users.len(), seed.lessons.len(), seed.skills.len());

    self
      .connection()
      .call(move |conn| {
        let tx = conn.transaction()?;

        for u in &seed.users {
          tx.execute(
            "INSERT INTO users (id, username, first_name, last_name, password_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (id) DO UPDATE SET
               username = excluded.username,
               first_name = excluded.first_name,
               last_name = excluded.last_name,
               password_hash = excluded.password_hash",
            rusqlite::params![u.id, u.username, u.first_name, u.last_name, u.password_hash],
          )?;
        }
        for p in &seed.students {
          tx.execute(
            "INSERT INTO students (id, user_id) VALUES (?1, ?2)
             ON CONFLICT (id) DO UPDATE SET user_id = excluded.user_id",
            [p.id, p.user_id],
          )?;
        }
        for p in &seed.professors {
          tx.execute(
            "INSERT INTO professors (id, user_id) VALUES (?1, ?2)
             ON CONFLICT (id) DO UPDATE SET user_id = excluded.user_id",
            [p.id, p.user_id],
          )?;
        }
        for s in &seed.stages {
          tx.execute(
            "INSERT INTO stages (id, name) VALUES (?1, ?2)
             ON CONFLICT (id) DO UPDATE SET name = excluded.name",
            rusqlite::params![s.id, s.name],
          )?;
        }
        for s in &seed.sections {
          tx.execute(
            "INSERT INTO sections (id, name) VALUES (?1, ?2)
             ON CONFLICT (id) DO UPDATE SET name = excluded.name",
            rusqlite::params![s.id, s.name],
          )?;
        }
        for l in &seed.lessons {
          tx.execute(
            "INSERT INTO lessons (id, name, stage_id) VALUES (?1, ?2, ?3)
             ON CONFLICT (id) DO UPDATE SET
               name = excluded.name, stage_id = excluded.stage_id",
            rusqlite::params![l.id, l.name, l.stage_id],
          )?;
          for &student in &l.students {
            tx.execute(
              "INSERT OR IGNORE INTO lesson_students (lesson_id, student_id) VALUES (?1, ?2)",
              [l.id, student],
            )?;
          }
          for &professor in &l.professors {
            tx.execute(
              "INSERT OR IGNORE INTO lesson_professors (lesson_id, professor_id) VALUES (?1, ?2)",
              [l.id, professor],
            )?;
          }
        }
        for s in &seed.skills {
          tx.execute(
            "INSERT INTO skills (id, code, name, section_id) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (id) DO UPDATE SET
               code = excluded.code, name = excluded.name,
               section_id = excluded.section_id",
            rusqlite::params![s.id, s.code, s.name, s.section_id],
          )?;
          for &stage in &s.stages {
            tx.execute(
              "INSERT OR IGNORE INTO stage_skills (stage_id, skill_id) VALUES (?1, ?2)",
              [stage, s.id],
            )?;
          }
        }

        tx.commit()?;
        Ok(())
      })
      .await?;

    info!(
      users = counts.0,
      lessons = counts.1,
      skills = counts.2,
      "directory imported"
    );
    Ok(())
  }
}
