use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts},
	http::{header, request},
};
use uuid::Uuid;

use crate::{
	error::RouteError,
	openapi::{SECURITY_SCHEME_BEARER, SECURITY_SCHEME_SESSION},
	route::auth,
	session, Database,
};

pub const AUTHORIZATION_PREFIX: &str = "Bearer ";

/// The authenticated caller: the session row's id and the user it belongs
/// to, fetched fresh from the database on every request.
///
/// The session id doubles as an opaque bearer token, so the caller can
/// present it either as a `session` cookie or as an
/// `Authorization: Bearer <uuid>` header.
///
/// ```rust
/// async fn route(session: Session) {
///   println!("{:?}", session.user);
/// }
/// ```
#[derive(Debug)]
pub struct Session {
	pub id: Uuid,
	pub user: auth::model::User,
}

/// Resolves a session id to its owning user. A missing row means the
/// credential is stale or forged; a missing user means the account was
/// deleted since the session was issued. Both read as an invalid credential.
async fn resolve_user(
	database: &Database,
	session_id: Uuid,
) -> Result<Option<auth::model::User>, sqlx::Error> {
	sqlx::query_as::<_, auth::model::User>(
		r#"
			SELECT u.* FROM "user" u
			WHERE u.id = (SELECT user_id FROM session WHERE id = $1)
		"#,
	)
	.bind(session_id)
	.fetch_optional(database)
	.await
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
	Database: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	/// Extracts the session from the request using a session cookie or a
	/// bearer token.
	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let authorization = parts.headers.get(header::AUTHORIZATION);

		Ok(if let Some(authorization) = authorization {
			let slice = authorization
				.to_str()
				.map_err(|_| auth::Error::InvalidSessionToken)?;

			if !slice.starts_with(AUTHORIZATION_PREFIX) {
				return Err(auth::Error::InvalidSessionToken.into());
			}

			let session_id = Uuid::parse_str(&slice[AUTHORIZATION_PREFIX.len()..])
				.map_err(|_| auth::Error::InvalidSessionToken)?;

			let database = Database::from_ref(state);
			let user = resolve_user(&database, session_id)
				.await?
				.ok_or(auth::Error::InvalidSessionToken)?;

			Session {
				id: session_id,
				user,
			}
		} else {
			let cookies = parts
				.headers
				.get_all(header::COOKIE)
				.into_iter()
				.filter_map(|value| value.to_str().ok());

			let session_id = cookies
				.flat_map(cookie::Cookie::split_parse)
				.filter_map(Result::ok)
				.find(|cookie| cookie.name() == session::COOKIE_NAME)
				.ok_or(auth::Error::NoSessionCookieOrToken)?;

			let session_id = Uuid::parse_str(session_id.value())
				.map_err(|_| auth::Error::InvalidSessionCookie)?;

			let database = Database::from_ref(state);
			let user = resolve_user(&database, session_id)
				.await?
				.ok_or(auth::Error::InvalidSessionCookie)?;

			Session {
				id: session_id,
				user,
			}
		})
	}
}

impl OperationInput for Session {
	/// Operation input for the session extractor.
	///
	/// This adds the session cookie and bearer token requirements to the
	/// `OpenAPI` operation.
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		operation.security.extend([
			[(SECURITY_SCHEME_SESSION.to_string(), Vec::new())]
				.into_iter()
				.collect(),
			[(SECURITY_SCHEME_BEARER.to_string(), Vec::new())]
				.into_iter()
				.collect(),
		]);
	}
}
