//! Helpers shared by the route tests: a test server wired to a recording
//! media store, and a tiny real image to upload.

pub use std::sync::Arc;

pub use axum_test::{
	multipart::{MultipartForm, Part},
	TestServer,
};
pub use serde_json::json;

pub use crate::{Database, State};

use std::{io::Cursor, sync::Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::media::{self, MediaStore, StoredMedia, Uploader};

/// In-memory media store that records every upload and delete, with
/// injectable failures.
#[derive(Default)]
pub struct RecordingStore {
	uploads: Mutex<Vec<StoredMedia>>,
	deletes: Mutex<Vec<String>>,
	ops: Mutex<Vec<String>>,
	fail_uploads_from: Option<usize>,
	fail_deletes: Mutex<bool>,
}

impl RecordingStore {
	pub fn default_arc() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Uploads succeed until `count` objects are stored, then fail.
	pub fn failing_uploads_from(count: usize) -> Arc<Self> {
		Arc::new(Self {
			fail_uploads_from: Some(count),
			..Self::default()
		})
	}

	pub fn failing_deletes() -> Arc<Self> {
		let store = Self::default();
		*store.fail_deletes.lock().unwrap() = true;

		Arc::new(store)
	}

	pub fn set_fail_deletes(&self, fail: bool) {
		*self.fail_deletes.lock().unwrap() = fail;
	}

	pub fn uploads(&self) -> Vec<StoredMedia> {
		self.uploads.lock().unwrap().clone()
	}

	pub fn deletes(&self) -> Vec<String> {
		self.deletes.lock().unwrap().clone()
	}

	/// Every call in arrival order, as `upload:<id>` / `delete:<id>`.
	pub fn ops(&self) -> Vec<String> {
		self.ops.lock().unwrap().clone()
	}

	/// Objects uploaded and not (attempted) deleted.
	pub fn live_objects(&self) -> usize {
		let deletes = self.deletes.lock().unwrap();

		self.uploads
			.lock()
			.unwrap()
			.iter()
			.filter(|media| !deletes.contains(&media.remote_id))
			.count()
	}
}

#[async_trait]
impl MediaStore for RecordingStore {
	async fn upload(
		&self,
		folder: &str,
		id: &str,
		_name: &str,
		_mime: &str,
		_bytes: Bytes,
	) -> Result<StoredMedia, media::Error> {
		let mut uploads = self.uploads.lock().unwrap();

		if let Some(from) = self.fail_uploads_from {
			if uploads.len() >= from {
				return Err(media::Error::Store("injected upload failure".into()));
			}
		}

		let media = StoredMedia {
			remote_id: format!("{folder}/{id}"),
			url: format!("https://media.test/{folder}/{id}"),
		};

		uploads.push(media.clone());
		self.ops
			.lock()
			.unwrap()
			.push(format!("upload:{}", media.remote_id));

		Ok(media)
	}

	async fn delete(&self, remote_id: &str) -> Result<(), media::Error> {
		self.deletes.lock().unwrap().push(remote_id.to_owned());
		self.ops.lock().unwrap().push(format!("delete:{remote_id}"));

		if *self.fail_deletes.lock().unwrap() {
			return Err(media::Error::Store("injected delete failure".into()));
		}

		Ok(())
	}
}

/// A small but real PNG, accepted by the preprocessing pipeline.
pub fn png_bytes() -> Vec<u8> {
	let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
		32,
		32,
		image::Rgb([200, 100, 50]),
	));
	let mut buf = Vec::new();

	img.write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
		.unwrap();

	buf
}

pub fn app(pool: Database) -> TestServer {
	app_with(pool, RecordingStore::default_arc())
}

pub fn app_with(pool: Database, store: Arc<RecordingStore>) -> TestServer {
	let state = State {
		database: pool,
		hasher: argon2::Argon2::default(),
		uploader: Uploader::new(store),
	};

	let mut api = aide::openapi::OpenApi::default();
	let router = aide::axum::ApiRouter::new()
		.nest("/auth", crate::route::auth::routes())
		.nest("/posts", crate::route::post::routes())
		.finish_api(&mut api)
		.with_state(state);

	let config = axum_test::TestServerConfig::builder().save_cookies().build();

	TestServer::new_with_config(router, config).expect("failed to start test server")
}
