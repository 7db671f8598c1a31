//! SQLite backend for the forum store, plus a local-disk attachment store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;
pub mod files;
pub mod seed;

pub use error::{Error, Result};
pub use files::LocalFileStore;
pub use seed::DirectorySeed;
pub use store::SqliteStore;
