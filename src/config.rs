/// Runtime configuration, read from the environment once at startup.
///
/// Every external client (database pool, media store) is constructed from
/// this and injected through application state; nothing reads the
/// environment after boot.
#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub port: u16,
	pub media_store: MediaStoreConfig,
}

/// Connection details for the hosted media store.
#[derive(Debug, Clone)]
pub struct MediaStoreConfig {
	pub base_url: String,
	pub api_key: String,
	pub api_secret: String,
}

impl Config {
	pub fn from_env() -> Self {
		Self {
			database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
			port: std::env::var("PORT").map_or_else(
				|_| 3000,
				|port| port.parse().expect("PORT must be a number"),
			),
			media_store: MediaStoreConfig {
				base_url: std::env::var("MEDIA_STORE_URL")
					.expect("MEDIA_STORE_URL must be set")
					.trim_end_matches('/')
					.to_owned(),
				api_key: std::env::var("MEDIA_STORE_KEY").expect("MEDIA_STORE_KEY must be set"),
				api_secret: std::env::var("MEDIA_STORE_SECRET")
					.expect("MEDIA_STORE_SECRET must be set"),
			},
		}
	}
}
