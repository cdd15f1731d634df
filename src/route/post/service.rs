//! Orchestrates post writes across the database and the remote media store.
//!
//! A post and its attachment rows only ever appear together, in one
//! transaction, after every remote upload has succeeded. When the database
//! side fails after uploads have happened, the uploads are deleted again;
//! when the remote side fails during cleanup, the orphaned object is leaked
//! and logged. A live attachment row pointing at a missing remote object is
//! the one state this module never allows.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
	media::{FileUpload, UploadedFile, Uploader},
	Database,
};

use super::{
	model::{Attachment, Author, Page, Paginate, Post, PostAuthorRow, PostRow},
	Error,
};

pub struct PostService {
	database: Database,
	uploader: Uploader,
}

impl PostService {
	pub fn new(database: Database, uploader: Uploader) -> Self {
		Self { database, uploader }
	}

	/// Creates a post with zero or more attached files.
	///
	/// Files are uploaded before the transaction opens; if the transaction
	/// then fails, every object uploaded for this request is deleted again
	/// before the error is surfaced, so the store never holds files for a
	/// post that does not exist.
	pub async fn create(
		&self,
		author_id: Uuid,
		content: &str,
		files: Vec<FileUpload>,
	) -> Result<Post, Error> {
		let content = content.trim();

		if content.is_empty() {
			return Err(Error::EmptyContent);
		}

		let author = self.author(author_id).await?;
		let uploaded = self.uploader.upload_all(files).await?;

		match self.persist_create(author_id, content, &uploaded).await {
			Ok((post, attachments)) => Ok(Post::new(post, author, attachments)),
			Err(error) => {
				let ids: Vec<String> = uploaded
					.iter()
					.map(|file| file.media.remote_id.clone())
					.collect();
				self.uploader.discard(&ids).await;

				Err(Error::Database(error))
			}
		}
	}

	/// Updates a post's content and/or replaces its media with a single new
	/// file. The new file is uploaded first and the old objects are deleted
	/// only after the transaction referencing the new one has committed, so
	/// there is no moment where the post references nothing resolvable.
	pub async fn update(
		&self,
		caller_id: Uuid,
		post_id: Uuid,
		content: Option<&str>,
		file: Option<FileUpload>,
	) -> Result<Post, Error> {
		let (post, old_attachments) = self.fetch(post_id).await?;

		if post.user_id != caller_id {
			return Err(Error::NotPostOwner);
		}

		let content = content.map(str::trim);

		if content == Some("") {
			return Err(Error::EmptyContent);
		}

		let author = self.author(post.user_id).await?;

		let replacement = match file {
			Some(file) => self.uploader.upload_all(vec![file]).await?.pop(),
			None => None,
		};

		match self
			.persist_update(post_id, content, replacement.as_ref())
			.await
		{
			Ok((post, new_attachment)) => {
				if replacement.is_some() {
					let old_ids: Vec<String> = old_attachments
						.iter()
						.map(|attachment| attachment.remote_id.clone())
						.collect();
					self.uploader.discard(&old_ids).await;
				}

				let attachments = match new_attachment {
					Some(attachment) => vec![attachment],
					None => old_attachments,
				};

				Ok(Post::new(post, author, attachments))
			}
			Err(error) => {
				if let Some(file) = &replacement {
					self.uploader
						.discard(std::slice::from_ref(&file.media.remote_id))
						.await;
				}

				Err(Error::Database(error))
			}
		}
	}

	/// Deletes a post and its attachments. Rows go first, inside a
	/// transaction; remote objects are cleaned up afterwards on a
	/// best-effort basis. A dangling row pointing at a deleted object would
	/// serve broken links, while an orphaned remote object is merely
	/// reclaimable garbage.
	pub async fn delete(&self, caller_id: Uuid, post_id: Uuid) -> Result<(), Error> {
		let (post, attachments) = self.fetch(post_id).await?;

		if post.user_id != caller_id {
			return Err(Error::NotPostOwner);
		}

		let mut tx = self.database.begin().await?;

		sqlx::query("DELETE FROM attachment WHERE post_id = $1")
			.bind(post_id)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM post WHERE id = $1")
			.bind(post_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		// The outcome is decided; remote cleanup cannot change it.
		let ids: Vec<String> = attachments
			.iter()
			.map(|attachment| attachment.remote_id.clone())
			.collect();
		self.uploader.discard(&ids).await;

		Ok(())
	}

	/// Returns a single post with its owner summary and attachments.
	pub async fn get(&self, post_id: Uuid) -> Result<Post, Error> {
		let (post, attachments) = self.fetch(post_id).await?;
		let author = self.author(post.user_id).await?;

		Ok(Post::new(post, author, attachments))
	}

	/// Returns a page of all posts, newest first.
	pub async fn list(&self, paginate: &Paginate) -> Result<Page<Post>, Error> {
		let rows = sqlx::query_as::<_, PostAuthorRow>(
			r#"
				SELECT p.id, p.user_id, p.content, p.created_at, p.updated_at,
				       u.username, u.profile_image_url
				FROM post p
				JOIN "user" u ON u.id = p.user_id
				ORDER BY p.created_at DESC
				LIMIT $1 OFFSET $2
			"#,
		)
		.bind(paginate.limit())
		.bind(paginate.offset())
		.fetch_all(&self.database)
		.await?;

		let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM post")
			.fetch_one(&self.database)
			.await?;

		Ok(Page::new(self.assemble(rows).await?, paginate, total))
	}

	/// Returns a page of one user's posts, newest first.
	pub async fn list_by(&self, user_id: Uuid, paginate: &Paginate) -> Result<Page<Post>, Error> {
		let rows = sqlx::query_as::<_, PostAuthorRow>(
			r#"
				SELECT p.id, p.user_id, p.content, p.created_at, p.updated_at,
				       u.username, u.profile_image_url
				FROM post p
				JOIN "user" u ON u.id = p.user_id
				WHERE p.user_id = $1
				ORDER BY p.created_at DESC
				LIMIT $2 OFFSET $3
			"#,
		)
		.bind(user_id)
		.bind(paginate.limit())
		.bind(paginate.offset())
		.fetch_all(&self.database)
		.await?;

		let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM post WHERE user_id = $1")
			.bind(user_id)
			.fetch_one(&self.database)
			.await?;

		Ok(Page::new(self.assemble(rows).await?, paginate, total))
	}

	async fn persist_create(
		&self,
		author_id: Uuid,
		content: &str,
		uploaded: &[UploadedFile],
	) -> Result<(PostRow, Vec<Attachment>), sqlx::Error> {
		let mut tx = self.database.begin().await?;

		let post = sqlx::query_as::<_, PostRow>(
			r#"
				INSERT INTO post (id, user_id, content)
				VALUES ($1, $2, $3)
				RETURNING id, user_id, content, created_at, updated_at
			"#,
		)
		.bind(Uuid::new_v4())
		.bind(author_id)
		.bind(content)
		.fetch_one(&mut *tx)
		.await?;

		let mut attachments = Vec::with_capacity(uploaded.len());

		for file in uploaded {
			let attachment = sqlx::query_as::<_, Attachment>(
				r#"
					INSERT INTO attachment (id, post_id, url, remote_id, kind)
					VALUES ($1, $2, $3, $4, $5)
					RETURNING id, post_id, url, remote_id, kind, created_at
				"#,
			)
			.bind(Uuid::new_v4())
			.bind(post.id)
			.bind(&file.media.url)
			.bind(&file.media.remote_id)
			.bind(file.kind.as_str())
			.fetch_one(&mut *tx)
			.await?;

			attachments.push(attachment);
		}

		tx.commit().await?;

		Ok((post, attachments))
	}

	async fn persist_update(
		&self,
		post_id: Uuid,
		content: Option<&str>,
		replacement: Option<&UploadedFile>,
	) -> Result<(PostRow, Option<Attachment>), sqlx::Error> {
		let mut tx = self.database.begin().await?;

		let post = sqlx::query_as::<_, PostRow>(
			r#"
				UPDATE post
				SET content = COALESCE($1, content), updated_at = now()
				WHERE id = $2
				RETURNING id, user_id, content, created_at, updated_at
			"#,
		)
		.bind(content)
		.bind(post_id)
		.fetch_one(&mut *tx)
		.await?;

		let attachment = match replacement {
			Some(file) => {
				sqlx::query("DELETE FROM attachment WHERE post_id = $1")
					.bind(post_id)
					.execute(&mut *tx)
					.await?;

				Some(
					sqlx::query_as::<_, Attachment>(
						r#"
							INSERT INTO attachment (id, post_id, url, remote_id, kind)
							VALUES ($1, $2, $3, $4, $5)
							RETURNING id, post_id, url, remote_id, kind, created_at
						"#,
					)
					.bind(Uuid::new_v4())
					.bind(post_id)
					.bind(&file.media.url)
					.bind(&file.media.remote_id)
					.bind(file.kind.as_str())
					.fetch_one(&mut *tx)
					.await?,
				)
			}
			None => None,
		};

		tx.commit().await?;

		Ok((post, attachment))
	}

	async fn fetch(&self, post_id: Uuid) -> Result<(PostRow, Vec<Attachment>), Error> {
		let post = sqlx::query_as::<_, PostRow>(
			"SELECT id, user_id, content, created_at, updated_at FROM post WHERE id = $1",
		)
		.bind(post_id)
		.fetch_optional(&self.database)
		.await?
		.ok_or(Error::UnknownPost(post_id))?;

		let attachments = sqlx::query_as::<_, Attachment>(
			r#"
				SELECT id, post_id, url, remote_id, kind, created_at
				FROM attachment
				WHERE post_id = $1
				ORDER BY created_at
			"#,
		)
		.bind(post_id)
		.fetch_all(&self.database)
		.await?;

		Ok((post, attachments))
	}

	async fn author(&self, user_id: Uuid) -> Result<Author, Error> {
		sqlx::query_as::<_, Author>(
			r#"SELECT id, username, profile_image_url FROM "user" WHERE id = $1"#,
		)
		.bind(user_id)
		.fetch_optional(&self.database)
		.await?
		.ok_or(Error::UnknownUser(user_id))
	}

	/// Joins a page of rows with their attachments in one round trip.
	async fn assemble(&self, rows: Vec<PostAuthorRow>) -> Result<Vec<Post>, Error> {
		let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();

		let attachments = sqlx::query_as::<_, Attachment>(
			r#"
				SELECT id, post_id, url, remote_id, kind, created_at
				FROM attachment
				WHERE post_id = ANY($1)
				ORDER BY created_at
			"#,
		)
		.bind(&ids)
		.fetch_all(&self.database)
		.await?;

		let mut by_post: HashMap<Uuid, Vec<Attachment>> = HashMap::new();

		for attachment in attachments {
			by_post
				.entry(attachment.post_id)
				.or_default()
				.push(attachment);
		}

		Ok(rows
			.into_iter()
			.map(|row| {
				let author = row.author();
				let attachments = by_post.remove(&row.id).unwrap_or_default();

				Post::new(row.into(), author, attachments)
			})
			.collect())
	}
}
