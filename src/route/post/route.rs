use aide::{transform::TransformOperation, NoApi};
use axum::extract::{Multipart, Path, State};
use uuid::Uuid;

use crate::{
	extract::{Json, Query, Session},
	media::FileUpload,
	openapi::tag,
	AppState,
};

use super::{
	model::{self, Page, Paginate},
	service::PostService,
	Error, RouteError,
};

fn service(state: &AppState) -> PostService {
	PostService::new(state.database.clone(), state.uploader.clone())
}

/// Collects the `content` field and any `files` parts out of a multipart
/// body. Field order is not significant.
async fn read_multipart(
	mut multipart: Multipart,
) -> Result<(Option<String>, Vec<FileUpload>), Error> {
	let mut content = None;
	let mut files = Vec::new();

	while let Some(field) = multipart.next_field().await? {
		let name = field.name().unwrap_or_default().to_owned();

		match name.as_str() {
			"content" => content = Some(field.text().await?),
			"files" | "file" => {
				let name = field.file_name().unwrap_or("upload").to_owned();
				let mime = field
					.content_type()
					.unwrap_or("application/octet-stream")
					.to_owned();
				let bytes = field.bytes().await?;

				files.push(FileUpload { name, mime, bytes });
			}
			_ => {}
		}
	}

	Ok((content, files))
}

/// Returns a paginated response of all posts, newest first.
pub async fn get_posts(
	State(state): State<AppState>,
	Query(paginate): Query<Paginate>,
) -> Result<Json<Page<model::Post>>, RouteError> {
	let page = service(&state).list(&paginate).await?;

	Ok(Json(page))
}

pub fn get_posts_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Get all posts")
		.description("Returns a paginated response of all posts, newest first.")
		.tag(tag::POST)
}

/// Returns a paginated response of your posts, newest first.
pub async fn get_user_posts(
	State(state): State<AppState>,
	session: Session,
	Query(paginate): Query<Paginate>,
) -> Result<Json<Page<model::Post>>, RouteError> {
	let page = service(&state).list_by(session.user.id, &paginate).await?;

	Ok(Json(page))
}

pub fn get_user_posts_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Get own posts")
		.description("Returns a paginated response of your posts, newest first.")
		.tag(tag::POST)
}

/// Returns a single post by its unique id.
pub async fn get_post(
	State(state): State<AppState>,
	Path(post_id): Path<Uuid>,
) -> Result<Json<model::Post>, RouteError> {
	let post = service(&state).get(post_id).await?;

	Ok(Json(post))
}

pub fn get_post_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Get single post")
		.description("Returns a single post by its unique id.")
		.tag(tag::POST)
}

/// Creates a new post from a multipart body: a required `content` field and
/// up to ten `files` parts.
pub async fn create_post(
	State(state): State<AppState>,
	session: Session,
	NoApi(multipart): NoApi<Multipart>,
) -> Result<Json<model::Post>, RouteError> {
	let (content, files) = read_multipart(multipart).await?;
	let content = content.ok_or(Error::EmptyContent)?;

	let post = service(&state)
		.create(session.user.id, &content, files)
		.await?;

	Ok(Json(post))
}

pub fn create_post_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Create post")
		.description(
			"Creates a new post from a multipart body: a required `content` field and up to ten `files` parts.",
		)
		.tag(tag::POST)
}

/// Updates an existing post: a new `content` field and/or a single
/// replacement `file` part, each optional.
pub async fn update_post(
	State(state): State<AppState>,
	session: Session,
	Path(post_id): Path<Uuid>,
	NoApi(multipart): NoApi<Multipart>,
) -> Result<Json<model::Post>, RouteError> {
	let (content, mut files) = read_multipart(multipart).await?;

	if files.len() > 1 {
		return Err(Error::Media(crate::media::Error::TooManyFiles {
			count: files.len(),
			max: 1,
		})
		.into());
	}

	let post = service(&state)
		.update(session.user.id, post_id, content.as_deref(), files.pop())
		.await?;

	Ok(Json(post))
}

pub fn update_post_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Update post")
		.description(
			"Updates an existing post: a new `content` field and/or a single replacement `file` part.",
		)
		.tag(tag::POST)
}

/// Deletes an existing post by its unique id, along with its attachments.
pub async fn delete_post(
	State(state): State<AppState>,
	session: Session,
	Path(post_id): Path<Uuid>,
) -> Result<(), RouteError> {
	service(&state).delete(session.user.id, post_id).await?;

	Ok(())
}

pub fn delete_post_docs(op: TransformOperation) -> TransformOperation {
	op.summary("Delete post")
		.description("Deletes an existing post by its unique id, along with its attachments.")
		.tag(tag::POST)
}
