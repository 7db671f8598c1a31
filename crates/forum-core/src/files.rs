//! The `FileStore` trait — where attachment bytes live.
//!
//! Only the handle and digest of a file are kept in the database. Removal is
//! best-effort: callers log a failed [`FileStore::remove`] and carry on.

use std::{fmt, future::Future};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Opaque reference to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHandle(pub String);

impl fmt::Display for FileHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// The result of a successful [`FileStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
  pub handle:       FileHandle,
  /// SHA-256 hex digest.
  pub content_hash: String,
  pub size:         u64,
}

pub trait FileStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist `data`; `name` is the original filename and may only be used as
  /// a hint (e.g. for the extension).
  fn put<'a>(
    &'a self,
    name: &'a str,
    data: Bytes,
  ) -> impl Future<Output = Result<StoredFile, Self::Error>> + Send + 'a;

  fn read<'a>(
    &'a self,
    handle: &'a FileHandle,
  ) -> impl Future<Output = Result<Bytes, Self::Error>> + Send + 'a;

  fn remove<'a>(
    &'a self,
    handle: &'a FileHandle,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
