//! [`LocalFileStore`] — attachment bytes on the local filesystem.
//!
//! Every file gets a fresh `<uuid>[.ext]` name under the root directory, so
//! two uploads with the same original name never collide.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use forum_core::files::{FileHandle, FileStore, StoredFile};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct LocalFileStore {
  root: PathBuf,
}

impl LocalFileStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  /// The on-disk path of `handle`, rejecting anything that could escape the
  /// root directory.
  fn path_of(&self, handle: &FileHandle) -> Result<PathBuf> {
    let name = handle.0.as_str();
    let valid = !name.is_empty()
      && !name.starts_with('.')
      && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if !valid {
      return Err(Error::InvalidHandle(name.to_owned()));
    }
    Ok(self.root.join(name))
  }
}

/// A short, safe extension taken from the original filename.
fn extension_of(name: &str) -> Option<String> {
  let (_, ext) = name.rsplit_once('.')?;
  let valid = !ext.is_empty()
    && ext.len() <= 8
    && ext.chars().all(|c| c.is_ascii_alphanumeric());
  valid.then(|| ext.to_ascii_lowercase())
}

pub fn sha256_hex(data: &[u8]) -> String { hex::encode(Sha256::digest(data)) }

impl FileStore for LocalFileStore {
  type Error = Error;

  async fn put(&self, name: &str, data: Bytes) -> Result<StoredFile> {
    let id = Uuid::new_v4().simple().to_string();
    let handle = FileHandle(match extension_of(name) {
      Some(ext) => format!("{id}.{ext}"),
      None => id,
    });

    tokio::fs::create_dir_all(&self.root).await?;
    let path = self.path_of(&handle)?;
    tokio::fs::write(&path, &data).await?;

    Ok(StoredFile {
      handle,
      content_hash: sha256_hex(&data),
      size: data.len() as u64,
    })
  }

  async fn read(&self, handle: &FileHandle) -> Result<Bytes> {
    let path = self.path_of(handle)?;
    Ok(Bytes::from(tokio::fs::read(&path).await?))
  }

  async fn remove(&self, handle: &FileHandle) -> Result<()> {
    let path = self.path_of(handle)?;
    match tokio::fs::remove_file(&path).await {
      Ok(()) => Ok(()),
      // Already gone.
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
