#![cfg(feature = "test")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use jobber_graphql::{
	_preludet::*,
	auth::TokenState,
	client::JobberClient,
	error::ErrorKind,
	photos::{self, NOTE_CREATE_MUTATION},
};

const GRAPHQL_PATH: &str = "/api/graphql";

async fn build_client(base: &str) -> JobberClient {
	let config = mock_config(base);
	let token = TokenState::new("access-photos", "refresh-photos", unix_now() + 3600);
	let store = seeded_secret_store(&config, &token).await;

	JobberClient::from_secret_store(Arc::new(store), config)
		.await
		.expect("Client should build from the seeded store.")
}

#[tokio::test]
async fn attach_photos_sends_note_create_with_markdown_body() {
	let server = MockServer::start_async().await;
	let mutation = server
		.mock_async(|when, then| {
			when.method(POST).path(GRAPHQL_PATH).json_body(json!({
				"query": NOTE_CREATE_MUTATION,
				"variables": {
					"visitId": "visit-42",
					"content": "## Roof - Before/After\n\n\
						[Photo 1: before.jpg](https://bucket.s3.amazonaws.com/photos/before.jpg)\n\
						[Photo 2: after.jpg](https://bucket.s3.amazonaws.com/photos/after.jpg)"
				}
			}));
			then.status(200).json_body(json!({
				"data": { "noteCreate": { "note": { "id": "note-1", "body": "…", "createdAt": "2024-01-01T00:00:00Z" } } }
			}));
		})
		.await;
	let client = build_client(&server.base_url()).await;
	let data = photos::attach_photos_to_visit(
		&client,
		"visit-42",
		&[
			"https://bucket.s3.amazonaws.com/photos/before.jpg",
			"https://bucket.s3.amazonaws.com/photos/after.jpg",
		],
		"Roof - Before/After",
	)
	.await
	.expect("Note creation should succeed.");

	mutation.assert_async().await;

	assert_eq!(data["noteCreate"]["note"]["id"], "note-1");
}

#[tokio::test]
async fn attach_photos_surfaces_graphql_errors() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(GRAPHQL_PATH);
			then.status(200).json_body(json!({
				"data": null,
				"errors": [{ "message": "Visit not found" }]
			}));
		})
		.await;

	let client = build_client(&server.base_url()).await;
	let err = photos::attach_photos_to_visit(
		&client,
		"missing",
		&["https://bucket/a.jpg"],
		photos::DEFAULT_NOTE_TITLE,
	)
	.await
	.expect_err("GraphQL errors should surface.");

	assert_eq!(err.kind(), ErrorKind::GraphQl);
	assert!(err.to_string().contains("Visit not found"));
}
