use std::borrow::Cow;

use aide::axum::{routing::get_with, ApiRouter};
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use crate::{
	error::{self, ErrorShape},
	media, AppState,
};

pub mod model;
pub mod route;
pub mod service;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown post {0}")]
	UnknownPost(Uuid),
	#[error("unknown user {0}")]
	UnknownUser(Uuid),
	#[error("you do not own this post")]
	NotPostOwner,
	#[error("content must not be empty")]
	EmptyContent,
	#[error("malformed multipart body: {0}")]
	Multipart(#[from] axum::extract::multipart::MultipartError),
	#[error(transparent)]
	Media(#[from] media::Error),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/",
			get_with(get_posts, get_posts_docs).post_with(create_post, create_post_docs),
		)
		.api_route("/me", get_with(get_user_posts, get_user_posts_docs))
		.api_route(
			"/:id",
			get_with(get_post, get_post_docs)
				.put_with(update_post, update_post_docs)
				.delete_with(delete_post, delete_post_docs),
		)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownPost(..) | Self::UnknownUser(..) => StatusCode::NOT_FOUND,
			Self::NotPostOwner => StatusCode::FORBIDDEN,
			Self::EmptyContent | Self::Multipart(..) => StatusCode::BAD_REQUEST,
			Self::Media(error) => error.status(),
			Self::Database(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn errors(&self) -> Vec<error::Message<'_>> {
		match self {
			Self::UnknownPost(post) => vec![error::Message {
				content: "unknown_post".into(),
				field: None,
				details: Some(Cow::Owned({
					let mut map = error::Map::new();
					map.insert("post".into(), json!(post));
					map
				})),
			}],
			Self::UnknownUser(user) => vec![error::Message {
				content: "unknown_user".into(),
				field: None,
				details: Some(Cow::Owned({
					let mut map = error::Map::new();
					map.insert("user".into(), json!(user));
					map
				})),
			}],
			Self::NotPostOwner => vec![error::Message {
				content: "not_post_owner".into(),
				field: None,
				details: None,
			}],
			Self::EmptyContent => vec![error::Message {
				content: "empty_content".into(),
				field: Some("content".into()),
				details: None,
			}],
			Self::Multipart(error) => vec![error::Message {
				content: Cow::Owned(error.to_string()),
				field: None,
				details: None,
			}],
			Self::Media(error) => error.errors(),
			Self::Database(..) => vec![error::Message {
				content: "internal_server_error".into(),
				field: None,
				details: None,
			}],
		}
	}
}
