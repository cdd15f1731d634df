use std::borrow::Cow;

use aide::{
	openapi::{ApiKeyLocation, SecurityScheme, Tag},
	transform::TransformOpenApi,
};

use crate::{error, extract::Json, session};

pub const SECURITY_SCHEME_SESSION: &str = "Session";
pub const SECURITY_SCHEME_BEARER: &str = "Bearer";

pub mod tag {
	pub const AUTH: &str = "Auth";
	pub const POST: &str = "Post";
}

pub fn docs(api: TransformOpenApi) -> TransformOpenApi {
	api.title("Ripple API")
		.summary("A small social-posting API")
		.description(include_str!("../README.md"))
		.tag(Tag {
			name: tag::AUTH.into(),
			description: Some("User registration and sessions".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::POST.into(),
			description: Some("Posts and their media attachments".into()),
			..Default::default()
		})
		.security_scheme(
			SECURITY_SCHEME_SESSION,
			SecurityScheme::ApiKey {
				location: ApiKeyLocation::Cookie,
				name: session::COOKIE_NAME.into(),
				description: Some("A user session cookie".into()),
				extensions: Default::default(),
			},
		)
		.security_scheme(
			SECURITY_SCHEME_BEARER,
			SecurityScheme::Http {
				scheme: "bearer".into(),
				bearer_format: Some("uuid".into()),
				description: Some("A session id presented as a bearer token".into()),
				extensions: Default::default(),
			},
		)
		.default_response_with::<Json<error::ErrorResponse<'static>>, _>(|res| {
			res.example(error::ErrorResponse {
				success: false,
				errors: vec![error::Message {
					content: "error message".into(),
					field: Some("optional field".into()),
					details: Some(Cow::Owned({
						let mut map = error::Map::new();
						map.insert("key".into(), serde_json::json!("value"));
						map
					})),
				}],
			})
		})
}
