use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use super::Error;
use crate::config::MediaStoreConfig;

/// A stored object: the store's opaque id (used for later deletes) and the
/// public URL it is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
	pub remote_id: String,
	pub url: String,
}

/// The remote media store. Objects are addressed by a logical folder at
/// upload time and by their opaque id thereafter.
#[async_trait]
pub trait MediaStore: Send + Sync {
	async fn upload(
		&self,
		folder: &str,
		id: &str,
		name: &str,
		mime: &str,
		bytes: Bytes,
	) -> Result<StoredMedia, Error>;

	async fn delete(&self, remote_id: &str) -> Result<(), Error>;
}

/// HTTP client for the hosted media store.
pub struct HttpMediaStore {
	http: reqwest::Client,
	base_url: String,
	api_key: String,
	api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
	public_id: String,
	secure_url: String,
}

impl HttpMediaStore {
	pub fn new(config: &MediaStoreConfig) -> Result<Self, Error> {
		let http = reqwest::Client::builder()
			.timeout(std::time::Duration::from_secs(60))
			.build()
			.map_err(|error| Error::Store(error.to_string()))?;

		Ok(Self {
			http,
			base_url: config.base_url.clone(),
			api_key: config.api_key.clone(),
			api_secret: config.api_secret.clone(),
		})
	}
}

#[async_trait]
impl MediaStore for HttpMediaStore {
	async fn upload(
		&self,
		folder: &str,
		id: &str,
		name: &str,
		mime: &str,
		bytes: Bytes,
	) -> Result<StoredMedia, Error> {
		let part = reqwest::multipart::Part::bytes(bytes.to_vec())
			.file_name(name.to_owned())
			.mime_str(mime)
			.map_err(|error| Error::Store(error.to_string()))?;

		let form = reqwest::multipart::Form::new()
			.text("public_id", id.to_owned())
			.part("file", part);

		let response = self
			.http
			.post(format!("{}/{folder}/upload", self.base_url))
			.basic_auth(&self.api_key, Some(&self.api_secret))
			.multipart(form)
			.send()
			.await
			.map_err(|error| Error::Store(error.to_string()))?;

		if !response.status().is_success() {
			return Err(Error::Store(format!(
				"upload of {name} returned {}",
				response.status()
			)));
		}

		let body = response
			.json::<UploadResponse>()
			.await
			.map_err(|error| Error::Store(error.to_string()))?;

		Ok(StoredMedia {
			remote_id: body.public_id,
			url: body.secure_url,
		})
	}

	async fn delete(&self, remote_id: &str) -> Result<(), Error> {
		let response = self
			.http
			.delete(format!("{}/{remote_id}", self.base_url))
			.basic_auth(&self.api_key, Some(&self.api_secret))
			.send()
			.await
			.map_err(|error| Error::Store(error.to_string()))?;

		if !response.status().is_success() {
			return Err(Error::Store(format!(
				"delete of {remote_id} returned {}",
				response.status()
			)));
		}

		Ok(())
	}
}
