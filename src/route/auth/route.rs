use aide::{axum::IntoApiResponse, transform::TransformOperation};
use argon2::Argon2;
use axum::{
	extract::State,
	http::{header, StatusCode},
};
use uuid::Uuid;

use crate::{
	extract::{Json, Session},
	openapi::tag,
	session, AppState, Database,
};

use super::{model, Error, RouteError};

pub const KEY_LENGTH: usize = 32;

/// Hashes a password with Argon2, using the user's id as a salt.
/// Since this is only used for logging in and registering, the scope of this
/// function can remain in here with no issues.
fn hash_password(
	hasher: &Argon2,
	password: &str,
	id: &Uuid,
) -> Result<[u8; KEY_LENGTH], argon2::Error> {
	let mut hash = [0; KEY_LENGTH];

	hasher.hash_password_into(password.as_bytes(), id.as_bytes(), &mut hash)?;
	Ok(hash)
}

/// Logs in to an account, returning the session as a cookie and as a bearer
/// token in the body.
pub async fn login(
	State(state): State<AppState>,
	Json(auth): Json<model::LoginInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let user = sqlx::query_as::<_, model::User>(r#"SELECT * FROM "user" WHERE email = $1"#)
		.bind(&auth.email)
		.fetch_optional(&state.database)
		.await?;

	let Some(user) = user else {
		return Err(Error::InvalidEmailOrPassword.into());
	};

	let hashed = hash_password(&state.hasher, &auth.password, &user.id).map_err(Error::Argon)?;

	if user.password != hashed {
		return Err(Error::InvalidEmailOrPassword.into());
	}

	let session = sqlx::query_as::<_, model::Session>(
		"INSERT INTO session (user_id) VALUES ($1) RETURNING id, user_id, created_at",
	)
	.bind(user.id)
	.fetch_one(&state.database)
	.await?;

	let cookie = session::create_cookie(session.id);

	Ok(([(header::SET_COOKIE, cookie.to_string())], Json(session)))
}

pub fn login_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Log in")
		.description("Logs in to an account, returning an associated session cookie and bearer token.")
		.tag(tag::AUTH)
}

/// Logs out of the authenticated account, invalidating the session.
pub async fn logout(
	State(database): State<Database>,
	session: Session,
) -> Result<impl IntoApiResponse, RouteError> {
	sqlx::query("DELETE FROM session WHERE id = $1")
		.bind(session.id)
		.execute(&database)
		.await?;

	// Clear the session cookie
	Ok((
		[(header::SET_COOKIE, session::clear_cookie().to_string())],
		StatusCode::NO_CONTENT,
	))
}

pub fn logout_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Log out")
		.description("Logs out of the authenticated account, invalidating the session.")
		.tag(tag::AUTH)
}

/// Registers a new account, returning the new session as a cookie and as a
/// bearer token in the body.
pub async fn register(
	State(state): State<AppState>,
	Json(auth): Json<model::RegisterInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let user_id = Uuid::new_v4();
	let hashed = hash_password(&state.hasher, &auth.password, &user_id).map_err(Error::Argon)?;

	let mut tx = state.database.begin().await?;

	sqlx::query(r#"INSERT INTO "user" (id, email, password, username) VALUES ($1, $2, $3, $4)"#)
		.bind(user_id)
		.bind(&auth.email)
		.bind(hashed.as_slice())
		.bind(&auth.username)
		.execute(&mut *tx)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref d) if d.constraint() == Some("user_email_key") => {
				RouteError::from(Error::EmailTaken)
			}
			e => RouteError::from(e),
		})?;

	let session = sqlx::query_as::<_, model::Session>(
		"INSERT INTO session (user_id) VALUES ($1) RETURNING id, user_id, created_at",
	)
	.bind(user_id)
	.fetch_one(&mut *tx)
	.await?;

	tx.commit().await?;

	let cookie = session::create_cookie(session.id);

	Ok(([(header::SET_COOKIE, cookie.to_string())], Json(session)))
}

pub fn register_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Register account")
		.description("Registers a new account, returning an associated session cookie and bearer token.")
		.tag(tag::AUTH)
}

/// Returns the authenticated user.
pub async fn get_me(session: Session) -> Json<model::User> {
	Json(session.user)
}

pub fn get_me_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Get user")
		.description("Returns the authenticated user.")
		.tag(tag::AUTH)
}
