//! Route handlers, one module per area of the forum.

pub mod attachment;
pub mod dashboard;
pub mod thread;
pub mod write;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use forum_core::thread::NewAttachment;
use serde::Deserialize;

use crate::error::ApiError;

/// An uploaded file inside a JSON body: `{"name": "...", "data": "<base64>"}`.
#[derive(Debug, Deserialize)]
pub struct AttachmentBody {
  pub name: String,
  pub data: String,
}

impl AttachmentBody {
  pub fn decode(self) -> Result<NewAttachment, ApiError> {
    let name = self.name.trim();
    if name.is_empty() {
      return Err(ApiError::BadRequest("attachment name is empty".into()));
    }
    let data = B64
      .decode(self.data.as_bytes())
      .map_err(|e| ApiError::BadRequest(format!("attachment is not valid base64: {e}")))?;
    Ok(NewAttachment { name: name.to_owned(), data: Bytes::from(data) })
  }
}

pub fn decode_attachment(
  body: Option<AttachmentBody>,
) -> Result<Option<NewAttachment>, ApiError> {
  body.map(AttachmentBody::decode).transpose()
}
