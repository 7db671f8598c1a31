//! Runtime server configuration, deserialised from `config.toml` and
//! `FORUM_*` environment variables.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:           String,
  #[serde(default = "default_port")]
  pub port:           u16,
  #[serde(default = "default_store_path")]
  pub store_path:     PathBuf,
  #[serde(default = "default_attachment_dir")]
  pub attachment_dir: PathBuf,
  /// Capacity of the live notification channel.
  #[serde(default = "default_notification_buffer")]
  pub notification_buffer: usize,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8000 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/forum/forum.db") }

fn default_attachment_dir() -> PathBuf {
  PathBuf::from("~/.local/share/forum/attachments")
}

fn default_notification_buffer() -> usize { 256 }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_keys_fall_back_to_defaults() {
    let cfg: ServerConfig = ::config::Config::builder()
      .add_source(::config::File::from_str("port = 9001", ::config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();

    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 9001);
    assert_eq!(cfg.notification_buffer, 256);
    assert!(cfg.attachment_dir.ends_with("attachments"));
  }
}
