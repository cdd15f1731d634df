pub mod process;
pub mod store;
pub mod upload;

pub use store::{HttpMediaStore, MediaStore, StoredMedia};
pub use upload::{UploadedFile, Uploader};

use std::borrow::Cow;

use axum::http::StatusCode;
use bytes::Bytes;

use crate::error::{self, ErrorShape, Message};

/// At most this many files per post.
pub const MAX_FILES: usize = 10;
/// Per-file size cap, enforced before any upload is attempted.
pub const MAX_FILE_BYTES: usize = 50 * 1024 * 1024;

/// A raw file as received from the client, before validation.
#[derive(Debug, Clone)]
pub struct FileUpload {
	pub name: String,
	pub mime: String,
	pub bytes: Bytes,
}

/// The logical category a file is stored under in the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
	Image,
	Video,
}

impl MediaKind {
	pub fn folder(self) -> &'static str {
		match self {
			Self::Image => "posts/images",
			Self::Video => "posts/videos",
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Image => "image",
			Self::Video => "video",
		}
	}
}

/// Extension/MIME pairs accepted for upload. Both the declared MIME type and
/// the filename extension must agree on one entry; anything else is rejected
/// before a single byte leaves the process.
const ALLOWED_TYPES: &[(&str, &str, MediaKind)] = &[
	("jpg", "image/jpeg", MediaKind::Image),
	("jpeg", "image/jpeg", MediaKind::Image),
	("png", "image/png", MediaKind::Image),
	("gif", "image/gif", MediaKind::Image),
	("webp", "image/webp", MediaKind::Image),
	("mp4", "video/mp4", MediaKind::Video),
	("mov", "video/quicktime", MediaKind::Video),
	("avi", "video/x-msvideo", MediaKind::Video),
	("webm", "video/webm", MediaKind::Video),
];

/// Classifies a file by its name and declared MIME type against the
/// allow-list.
pub fn classify(name: &str, mime: &str) -> Result<MediaKind, Error> {
	let extension = name
		.rsplit_once('.')
		.map(|(_, extension)| extension.to_ascii_lowercase());
	let mime = mime.to_ascii_lowercase();

	extension
		.and_then(|extension| {
			ALLOWED_TYPES
				.iter()
				.find(|(allowed_extension, allowed_mime, _)| {
					*allowed_extension == extension && *allowed_mime == mime
				})
		})
		.map(|(_, _, kind)| *kind)
		.ok_or_else(|| Error::UnsupportedType {
			name: name.to_owned(),
			mime,
		})
}

/// Whether preprocessing applies: still images only, animated formats are
/// passed through untouched.
pub fn compressible(kind: MediaKind, mime: &str) -> bool {
	kind == MediaKind::Image && !mime.eq_ignore_ascii_case("image/gif")
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unsupported media type: {name} ({mime})")]
	UnsupportedType { name: String, mime: String },
	#[error("file {name} exceeds the per-file size limit")]
	FileTooLarge { name: String },
	#[error("too many files: {count} (at most {max})")]
	TooManyFiles { count: usize, max: usize },
	#[error("media store error: {0}")]
	Store(String),
}

impl ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
			Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
			Self::TooManyFiles { .. } => StatusCode::BAD_REQUEST,
			// The store is a separate system; its failures are retryable.
			Self::Store(..) => StatusCode::BAD_GATEWAY,
		}
	}

	fn errors(&self) -> Vec<Message<'_>> {
		match self {
			Self::UnsupportedType { name, mime } => vec![Message {
				content: "unsupported_media_type".into(),
				field: None,
				details: Some(Cow::Owned({
					let mut map = error::Map::new();
					map.insert("name".into(), serde_json::json!(name));
					map.insert("mime".into(), serde_json::json!(mime));
					map
				})),
			}],
			Self::FileTooLarge { name } => vec![Message {
				content: "file_too_large".into(),
				field: None,
				details: Some(Cow::Owned({
					let mut map = error::Map::new();
					map.insert("name".into(), serde_json::json!(name));
					map.insert("limit".into(), serde_json::json!(MAX_FILE_BYTES));
					map
				})),
			}],
			Self::TooManyFiles { count, max } => vec![Message {
				content: "too_many_files".into(),
				field: None,
				details: Some(Cow::Owned({
					let mut map = error::Map::new();
					map.insert("count".into(), serde_json::json!(count));
					map.insert("max".into(), serde_json::json!(max));
					map
				})),
			}],
			Self::Store(..) => vec![Message {
				content: "media_store_error".into(),
				field: None,
				details: None,
			}],
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_classify_accepts_matching_pairs() {
		assert_eq!(classify("photo.jpg", "image/jpeg").unwrap(), MediaKind::Image);
		assert_eq!(classify("PHOTO.PNG", "image/png").unwrap(), MediaKind::Image);
		assert_eq!(classify("clip.mp4", "video/mp4").unwrap(), MediaKind::Video);
	}

	#[test]
	fn test_classify_rejects_unknown_extension() {
		// An executable masquerading behind an image MIME type.
		assert!(classify("payload.exe", "image/jpeg").is_err());
	}

	#[test]
	fn test_classify_rejects_mismatched_mime() {
		assert!(classify("photo.jpg", "video/mp4").is_err());
		assert!(classify("photo.jpg", "application/octet-stream").is_err());
	}

	#[test]
	fn test_classify_rejects_missing_extension() {
		assert!(classify("photo", "image/jpeg").is_err());
	}

	#[test]
	fn test_gif_is_not_compressible() {
		assert!(!compressible(MediaKind::Image, "image/gif"));
		assert!(compressible(MediaKind::Image, "image/jpeg"));
		assert!(!compressible(MediaKind::Video, "video/mp4"));
	}
}
