#![warn(clippy::pedantic)]

mod config;
mod error;
mod extract;
mod media;
mod openapi;
mod ratelimit;
mod route;
mod session;
#[cfg(test)]
mod test;

use std::sync::Arc;

use aide::{axum::ApiRouter, openapi::OpenApi};
use argon2::Argon2;
use axum::{extract::DefaultBodyLimit, Extension};
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use error::AppError;

pub type Database = sqlx::Pool<sqlx::Postgres>;
pub type AppState = State;

/// Space for the content field plus up to ten files at the per-file cap.
const MAX_BODY_BYTES: usize = media::MAX_FILES * media::MAX_FILE_BYTES + 1024 * 1024;

/// The shared application state.
///
/// This contains every dependency handlers need: the database pool, the
/// password hasher, and the media uploader. All of them are built once at
/// startup from [`config::Config`] and injected here; nothing reads ambient
/// process state after boot.
#[derive(Clone, axum::extract::FromRef)]
pub struct State {
	pub database: Database,
	pub hasher: Argon2<'static>,
	pub uploader: media::Uploader,
}

#[tokio::main]
async fn main() {
	dotenvy::dotenv().ok();

	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with(tracing_subscriber::fmt::layer())
		.init();

	let config = config::Config::from_env();

	let database = Database::connect(&config.database_url)
		.await
		.expect("failed to connect to database");

	sqlx::migrate!()
		.run(&database)
		.await
		.expect("failed to run migrations");

	let store =
		media::HttpMediaStore::new(&config.media_store).expect("failed to build media store client");

	let state = State {
		database,
		hasher: Argon2::default(),
		uploader: media::Uploader::new(Arc::new(store)),
	};

	let default_limit = ratelimit::default();
	let auth_limit = ratelimit::auth();
	ratelimit::cleanup_old_limits(&[&default_limit, &auth_limit]);

	let mut api = OpenApi::default();

	let app = ApiRouter::new()
		.nest(
			"/auth",
			route::auth::routes().layer(GovernorLayer { config: auth_limit }),
		)
		.nest(
			"/posts",
			route::post::routes().layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
		)
		.nest("/docs", route::docs::routes())
		.finish_api_with(&mut api, openapi::docs)
		.layer(Extension(Arc::new(api)))
		.layer(GovernorLayer {
			config: default_limit,
		})
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
		.with_state(state);

	let port = config.port;

	let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
		.await
		.expect("failed to bind to port");

	tracing::info!("listening on port {}", port);

	axum::serve(
		listener,
		app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
	)
	.await
	.unwrap();
}
