pub use crate::route::model::{Page, Paginate};

use schemars::JsonSchema;
use serde::Serialize;
use uuid::Uuid;

/// The post row as stored, before the owner and attachments are joined in.
#[derive(Debug, sqlx::FromRow)]
pub struct PostRow {
	pub id: Uuid,
	pub user_id: Uuid,
	pub content: String,
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A post row joined with its author's public fields, as produced by the
/// list queries.
#[derive(Debug, sqlx::FromRow)]
pub struct PostAuthorRow {
	pub id: Uuid,
	pub user_id: Uuid,
	pub content: String,
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: chrono::DateTime<chrono::Utc>,
	pub username: String,
	pub profile_image_url: Option<String>,
}

/// The public summary of a post's author.
#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Author {
	pub id: Uuid,
	pub username: String,
	pub profile_image_url: Option<String>,
}

/// A media file attached to a post.
#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Attachment {
	/// The unique identifier of the attachment.
	pub id: Uuid,
	#[serde(skip_serializing)]
	pub post_id: Uuid,
	/// The public URL the file is served from.
	pub url: String,
	/// The remote store's opaque id, needed to delete the object later.
	pub remote_id: String,
	/// `image` or `video`.
	pub kind: String,
	/// The upload time of the attachment.
	pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A single post, created by a user, with its owner summary and attachments.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Post {
	/// The unique identifier of the post.
	pub id: Uuid,
	/// The user that created the post.
	pub author: Author,
	/// The text content of the post.
	pub content: String,
	/// Media attached to the post, oldest first.
	pub attachments: Vec<Attachment>,
	/// The creation time of the post.
	pub created_at: chrono::DateTime<chrono::Utc>,
	/// The last time the post was edited.
	pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Post {
	pub fn new(row: PostRow, author: Author, attachments: Vec<Attachment>) -> Self {
		Self {
			id: row.id,
			author,
			content: row.content,
			attachments,
			created_at: row.created_at,
			updated_at: row.updated_at,
		}
	}
}

impl From<PostAuthorRow> for PostRow {
	fn from(row: PostAuthorRow) -> Self {
		Self {
			id: row.id,
			user_id: row.user_id,
			content: row.content,
			created_at: row.created_at,
			updated_at: row.updated_at,
		}
	}
}

impl PostAuthorRow {
	pub fn author(&self) -> Author {
		Author {
			id: self.user_id,
			username: self.username.clone(),
			profile_image_url: self.profile_image_url.clone(),
		}
	}
}
