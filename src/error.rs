use std::borrow::Cow;

use axum::{
	body::Body,
	extract::rejection::{JsonRejection, QueryRejection},
	http::{Response, StatusCode},
	response::IntoResponse,
	Json,
};
use schemars::JsonSchema;
use serde::Serialize;

pub type Map = serde_json::Map<String, serde_json::Value>;

/// A single error message presented to the client.
///
/// `content` is a stable, machine-readable identifier where one exists.
/// `field` names the offending input field, and `details` carries structured
/// context the caller may want to act on.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Message<'m> {
	pub content: Cow<'m, str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub field: Option<Cow<'m, str>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Cow<'m, Map>>,
}

/// The body of every error response.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ErrorResponse<'m> {
	pub success: bool,
	pub errors: Vec<Message<'m>>,
}

/// Gives an error a client-facing shape: a status code and a list of
/// messages. The [`std::fmt::Display`] output is never sent to the client,
/// so it may contain sensitive detail.
pub trait ErrorShape: std::fmt::Display {
	fn status(&self) -> StatusCode;
	fn errors(&self) -> Vec<Message<'_>>;

	fn response(&self) -> Response<Body> {
		(
			self.status(),
			Json(ErrorResponse {
				success: false,
				errors: self.errors(),
			}),
		)
			.into_response()
	}
}

/// Errors that can occur in any route: extractor rejections, validation
/// failures, database errors, and rate limits.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	#[error("json error: {0}")]
	Json(#[from] JsonRejection),
	#[error("query error: {0}")]
	Query(#[from] QueryRejection),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("rate limited: {0}")]
	RateLimit(#[from] tower_governor::GovernorError),
}

impl ErrorShape for AppError {
	fn status(&self) -> StatusCode {
		match self {
			Self::Validation(..) | Self::Json(..) | Self::Query(..) => StatusCode::BAD_REQUEST,
			Self::Database(..) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::RateLimit(..) => StatusCode::TOO_MANY_REQUESTS,
		}
	}

	fn errors(&self) -> Vec<Message<'_>> {
		match self {
			Self::Validation(errors) => errors
				.field_errors()
				.into_iter()
				.flat_map(|(field, errors)| {
					errors.iter().map(move |error| Message {
						content: error.code.clone(),
						field: Some(Cow::Borrowed(field)),
						details: None,
					})
				})
				.collect(),
			Self::Json(error) => vec![Message {
				content: Cow::Owned(error.body_text()),
				field: None,
				details: None,
			}],
			Self::Query(error) => vec![Message {
				content: Cow::Owned(error.to_string()),
				field: None,
				details: None,
			}],
			// Database details stay server-side.
			Self::Database(..) => vec![Message {
				content: Cow::Borrowed("internal_server_error"),
				field: None,
				details: None,
			}],
			Self::RateLimit(..) => vec![Message {
				content: Cow::Borrowed("rate_limited"),
				field: None,
				details: None,
			}],
		}
	}
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response<Body> {
		if let Self::Database(ref error) = self {
			tracing::error!(%error, "database error");
		}

		self.response()
	}
}

/// Error type for a route module: either a shared [`AppError`] or the
/// module's own error `E`.
///
/// Route modules alias this as `type RouteError = error::RouteError<Error>;`
/// so handlers can use `?` on both their own errors and database results.
#[derive(Debug)]
pub enum RouteError<E>
where
	E: ErrorShape,
{
	App(AppError),
	Route(E),
}

impl<E: ErrorShape> From<E> for RouteError<E> {
	fn from(error: E) -> Self {
		Self::Route(error)
	}
}

impl<E: ErrorShape> From<sqlx::Error> for RouteError<E> {
	fn from(error: sqlx::Error) -> Self {
		Self::App(AppError::Database(error))
	}
}

impl<E: ErrorShape> IntoResponse for RouteError<E> {
	fn into_response(self) -> Response<Body> {
		match self {
			Self::App(error) => error.into_response(),
			Self::Route(error) => error.response(),
		}
	}
}

impl<E: ErrorShape> aide::operation::OperationOutput for RouteError<E> {
	type Inner = ErrorResponse<'static>;
}
