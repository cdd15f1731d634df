use std::{sync::Arc, time::Duration};

use futures::future;
use uuid::Uuid;

use super::{
	classify, compressible, process, Error, FileUpload, MediaKind, MediaStore, StoredMedia,
	MAX_FILES, MAX_FILE_BYTES,
};

/// Above either threshold, uploads are split into fixed chunks processed
/// sequentially with a pause in between, to bound peak outbound connections
/// and stay under the store's rate limits.
const CHUNK_FILES: usize = 6;
const CHUNK_BYTES: usize = 20 * 1024 * 1024;
const CHUNK_PAUSE: Duration = Duration::from_millis(500);

/// A successfully stored file together with its logical kind.
#[derive(Debug, Clone)]
pub struct UploadedFile {
	pub media: StoredMedia,
	pub kind: MediaKind,
}

/// Uploads files to the remote media store.
///
/// All-or-nothing per request: if any file in a batch fails, every file that
/// succeeded in the same call is deleted again before the error is returned,
/// so a caller never has to track partial results.
#[derive(Clone)]
pub struct Uploader {
	store: Arc<dyn MediaStore>,
}

impl Uploader {
	pub fn new(store: Arc<dyn MediaStore>) -> Self {
		Self { store }
	}

	/// Validates every file against the allow-list and size limits.
	///
	/// Runs before any network call so a bad file costs no bandwidth.
	pub fn validate(files: &[FileUpload]) -> Result<Vec<MediaKind>, Error> {
		if files.len() > MAX_FILES {
			return Err(Error::TooManyFiles {
				count: files.len(),
				max: MAX_FILES,
			});
		}

		files
			.iter()
			.map(|file| {
				if file.bytes.len() > MAX_FILE_BYTES {
					return Err(Error::FileTooLarge {
						name: file.name.clone(),
					});
				}

				classify(&file.name, &file.mime)
			})
			.collect()
	}

	/// Uploads a batch of files, preprocessing images and chunking large
	/// batches. Returns the stored files in input order.
	pub async fn upload_all(&self, files: Vec<FileUpload>) -> Result<Vec<UploadedFile>, Error> {
		let kinds = Self::validate(&files)?;

		if files.is_empty() {
			return Ok(Vec::new());
		}

		let total: usize = files.iter().map(|file| file.bytes.len()).sum();
		let chunk_size = if files.len() > CHUNK_FILES || total > CHUNK_BYTES {
			CHUNK_FILES
		} else {
			files.len()
		};

		let mut queue: Vec<(FileUpload, MediaKind)> = files.into_iter().zip(kinds).collect();
		let mut stored = Vec::with_capacity(queue.len());
		let mut first = true;

		while !queue.is_empty() {
			if !first {
				tokio::time::sleep(CHUNK_PAUSE).await;
			}

			let wave: Vec<_> = queue.drain(..chunk_size.min(queue.len())).collect();
			let results = future::join_all(
				wave.into_iter()
					.map(|(file, kind)| self.upload_one(file, kind)),
			)
			.await;

			let mut failed = None;

			for result in results {
				match result {
					Ok(file) => stored.push(file),
					Err(error) if failed.is_none() => failed = Some(error),
					Err(..) => {}
				}
			}

			if let Some(error) = failed {
				let ids: Vec<String> = stored
					.iter()
					.map(|file| file.media.remote_id.clone())
					.collect();
				self.discard(&ids).await;

				return Err(error);
			}

			first = false;
		}

		Ok(stored)
	}

	async fn upload_one(&self, file: FileUpload, kind: MediaKind) -> Result<UploadedFile, Error> {
		let bytes = if compressible(kind, &file.mime) {
			process::compress(file.bytes).await
		} else {
			file.bytes
		};

		let id = format!("{}_{}", Uuid::new_v4().simple(), stem(&file.name));
		let media = self
			.store
			.upload(kind.folder(), &id, &file.name, &file.mime, bytes)
			.await?;

		Ok(UploadedFile { media, kind })
	}

	/// Best-effort deletion of stored objects, used for compensation and for
	/// post-delete cleanup. Failures are logged and never surfaced: by the
	/// time this runs, the primary operation's outcome is already decided.
	pub async fn discard(&self, remote_ids: &[String]) {
		future::join_all(remote_ids.iter().map(|remote_id| async move {
			if let Err(error) = self.store.delete(remote_id).await {
				tracing::warn!(%remote_id, %error, "failed to delete remote media object");
			}
		}))
		.await;
	}
}

fn stem(name: &str) -> &str {
	name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

#[cfg(test)]
mod test {
	use bytes::Bytes;

	use super::*;
	use crate::test::RecordingStore;

	fn file(name: &str, mime: &str) -> FileUpload {
		FileUpload {
			name: name.to_owned(),
			mime: mime.to_owned(),
			bytes: Bytes::from_static(b"not a real video"),
		}
	}

	#[tokio::test]
	async fn test_unsupported_type_never_touches_the_store() {
		let store = Arc::new(RecordingStore::default());
		let uploader = Uploader::new(store.clone());

		let result = uploader
			.upload_all(vec![
				file("clip.mp4", "video/mp4"),
				file("payload.exe", "image/jpeg"),
			])
			.await;

		assert!(matches!(result, Err(Error::UnsupportedType { .. })));
		assert!(store.uploads().is_empty());
		assert!(store.deletes().is_empty());
	}

	#[tokio::test]
	async fn test_too_many_files_rejected_before_upload() {
		let store = Arc::new(RecordingStore::default());
		let uploader = Uploader::new(store.clone());

		let files = (0..11)
			.map(|index| file(&format!("clip{index}.mp4"), "video/mp4"))
			.collect();

		let result = uploader.upload_all(files).await;

		assert!(matches!(result, Err(Error::TooManyFiles { .. })));
		assert!(store.uploads().is_empty());
	}

	#[tokio::test]
	async fn test_oversized_file_rejected_before_upload() {
		let store = Arc::new(RecordingStore::default());
		let uploader = Uploader::new(store.clone());

		let oversized = FileUpload {
			name: "huge.mp4".to_owned(),
			mime: "video/mp4".to_owned(),
			bytes: Bytes::from(vec![0; MAX_FILE_BYTES + 1]),
		};

		let result = uploader.upload_all(vec![oversized]).await;

		assert!(matches!(result, Err(Error::FileTooLarge { .. })));
		assert!(store.uploads().is_empty());
	}

	#[tokio::test]
	async fn test_batch_success_stores_every_file() {
		let store = Arc::new(RecordingStore::default());
		let uploader = Uploader::new(store.clone());

		let files: Vec<_> = (0..8)
			.map(|index| file(&format!("clip{index}.mp4"), "video/mp4"))
			.collect();

		let stored = uploader.upload_all(files).await.unwrap();

		assert_eq!(stored.len(), 8);
		assert_eq!(store.uploads().len(), 8);
		assert!(store.deletes().is_empty());
	}

	#[tokio::test]
	async fn test_batch_failure_compensates_same_call_successes() {
		let store = RecordingStore::failing_uploads_from(2);
		let uploader = Uploader::new(store.clone());

		let files: Vec<_> = (0..3)
			.map(|index| file(&format!("clip{index}.mp4"), "video/mp4"))
			.collect();

		let result = uploader.upload_all(files).await;

		assert!(matches!(result, Err(Error::Store(..))));
		assert_eq!(store.uploads().len(), 2);
		assert_eq!(store.deletes().len(), 2);
		assert_eq!(store.live_objects(), 0);
	}

	#[tokio::test]
	async fn test_discard_swallows_store_failures() {
		let store = RecordingStore::failing_deletes();
		let uploader = Uploader::new(store.clone());

		uploader.discard(&["posts/images/gone".to_owned()]).await;

		assert_eq!(store.deletes(), vec!["posts/images/gone".to_owned()]);
	}
}
