//! SQL schema for the forum SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Directory tables. Owned by the surrounding platform; the forum only reads
-- them outside of seeding.
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    first_name    TEXT NOT NULL DEFAULT '',
    last_name     TEXT NOT NULL DEFAULT '',
    password_hash TEXT                -- argon2 PHC string; NULL cannot log in
);

CREATE TABLE IF NOT EXISTS students (
    id      INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS professors (
    id      INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS stages (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lessons (
    id       INTEGER PRIMARY KEY,
    name     TEXT NOT NULL,
    stage_id INTEGER REFERENCES stages(id)
);

CREATE TABLE IF NOT EXISTS lesson_students (
    lesson_id  INTEGER NOT NULL REFERENCES lessons(id),
    student_id INTEGER NOT NULL REFERENCES students(id),
    PRIMARY KEY (lesson_id, student_id)
);

CREATE TABLE IF NOT EXISTS lesson_professors (
    lesson_id    INTEGER NOT NULL REFERENCES lessons(id),
    professor_id INTEGER NOT NULL REFERENCES professors(id),
    PRIMARY KEY (lesson_id, professor_id)
);

CREATE TABLE IF NOT EXISTS sections (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS skills (
    id         INTEGER PRIMARY KEY,
    code       TEXT NOT NULL,
    name       TEXT NOT NULL,
    section_id INTEGER REFERENCES sections(id)
);

CREATE TABLE IF NOT EXISTS stage_skills (
    stage_id INTEGER NOT NULL REFERENCES stages(id),
    skill_id INTEGER NOT NULL REFERENCES skills(id),
    PRIMARY KEY (stage_id, skill_id)
);

-- Forum tables.
CREATE TABLE IF NOT EXISTS threads (
    id           INTEGER PRIMARY KEY,
    title        TEXT NOT NULL,
    author_id    INTEGER NOT NULL REFERENCES users(id),
    visibility   TEXT NOT NULL CHECK (visibility IN ('PRI', 'PUC', 'PUT')),
    recipient_id INTEGER REFERENCES users(id),
    lesson_id    INTEGER REFERENCES lessons(id),
    professor_id INTEGER REFERENCES professors(id),
    section_id   INTEGER REFERENCES sections(id),
    created_at   TEXT NOT NULL,   -- RFC 3339 UTC, microseconds
    modified_at  TEXT NOT NULL,
    CHECK ((recipient_id IS NOT NULL) + (lesson_id IS NOT NULL)
         + (professor_id IS NOT NULL) <= 1)
);

CREATE TABLE IF NOT EXISTS thread_skills (
    thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    skill_id  INTEGER NOT NULL REFERENCES skills(id),
    PRIMARY KEY (thread_id, skill_id)
);

CREATE TABLE IF NOT EXISTS messages (
    id          INTEGER PRIMARY KEY,
    thread_id   INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    author_id   INTEGER NOT NULL REFERENCES users(id),
    parent_id   INTEGER REFERENCES messages(id),
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    modified_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attachments (
    id           INTEGER PRIMARY KEY,
    message_id   INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    name         TEXT NOT NULL,
    handle       TEXT NOT NULL,
    content_hash TEXT NOT NULL,   -- SHA-256 hex
    size         INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS last_visits (
    user_id    INTEGER NOT NULL REFERENCES users(id),
    thread_id  INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    visited_at TEXT NOT NULL,
    PRIMARY KEY (user_id, thread_id)
);

CREATE TABLE IF NOT EXISTS notifications (
    id            INTEGER PRIMARY KEY,
    audience_json TEXT NOT NULL,   -- JSON array of 'user:<id>' / 'class:<id>'
    medium        TEXT NOT NULL,
    kind          TEXT NOT NULL,
    params_json   TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS threads_recipient_idx ON threads(recipient_id);
CREATE INDEX IF NOT EXISTS threads_lesson_idx    ON threads(lesson_id);
CREATE INDEX IF NOT EXISTS threads_professor_idx ON threads(professor_id);
CREATE INDEX IF NOT EXISTS threads_author_idx    ON threads(author_id);
CREATE INDEX IF NOT EXISTS messages_thread_idx   ON messages(thread_id);
CREATE INDEX IF NOT EXISTS attachments_msg_idx   ON attachments(message_id);

PRAGMA user_version = 1;
";
