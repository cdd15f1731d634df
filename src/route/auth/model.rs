use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_username(username: &str) -> Result<(), ValidationError> {
	if username.chars().any(|c| !c.is_alphanumeric()) {
		return Err(ValidationError::new("username must be alphanumeric"));
	}

	Ok(())
}

/// A single user.
#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
pub struct User {
	/// The unique identifier of the user.
	pub id: Uuid,
	/// The user's primary email address, used for logging in.
	#[serde(skip_serializing)]
	#[allow(dead_code)]
	pub email: String,
	/// The hashed password.
	#[serde(skip)]
	pub password: Vec<u8>,
	/// The username that is displayed to the public.
	pub username: String,
	/// URL of the user's profile image, if one is set.
	pub profile_image_url: Option<String>,
	/// The creation time of the user.
	pub created_at: chrono::DateTime<chrono::Utc>,
}

/// An active session. The id is the opaque bearer token handed to the
/// client.
#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Session {
	#[serde(rename = "token")]
	pub id: Uuid,
	/// The user that owns the session.
	#[serde(skip)]
	#[allow(dead_code)]
	pub user_id: Uuid,
	/// The creation time of the session.
	pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct LoginInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct RegisterInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
	/// The username that is displayed to the public.
	#[validate(length(min = 3, max = 16), custom(function = "validate_username"))]
	pub username: String,
}
