//! Photo notes: render uploaded photo links as markdown and attach them to a visit.

// self
use crate::{_prelude::*, client::JobberClient};

/// Title used when none is given.
pub const DEFAULT_NOTE_TITLE: &str = "Photos";

/// Creates a note on a visit (the note subject).
pub const NOTE_CREATE_MUTATION: &str = r#"
mutation($visitId: ID!, $content: String!) {
	noteCreate(input: {
		subject: { id: $visitId }
		body: $content
	}) {
		note {
			id
			body
			createdAt
		}
	}
}
"#;

/// Renders `## {title}` followed by one numbered `[Photo N: file](url)` line per URL.
///
/// The link text is the last path segment of each URL.
pub fn format_photo_urls_markdown<S>(urls: &[S], title: &str) -> String
where
	S: AsRef<str>,
{
	let links = urls
		.iter()
		.enumerate()
		.map(|(i, url)| {
			let url = url.as_ref();
			let filename = url.rsplit('/').next().unwrap_or(url);

			format!("[Photo {}: {filename}]({url})", i + 1)
		})
		.collect::<Vec<_>>()
		.join("\n");

	format!("## {title}\n\n{links}")
}

/// Posts a note listing `urls` on the visit `visit_id` and returns the mutation `data`.
///
/// The photos must already be uploaded somewhere publicly reachable.
pub async fn attach_photos_to_visit<S>(
	client: &JobberClient,
	visit_id: &str,
	urls: &[S],
	title: &str,
) -> Result<Value>
where
	S: AsRef<str>,
{
	let variables = serde_json::json!({
		"visitId": visit_id,
		"content": format_photo_urls_markdown(urls, title),
	});

	client.execute_query(NOTE_CREATE_MUTATION, Some(variables), None).await
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn markdown_numbers_links_by_filename() {
		let urls = [
			"https://bucket.s3.amazonaws.com/photos/before.jpg",
			"https://bucket.s3.amazonaws.com/photos/after.jpg",
		];

		assert_eq!(
			format_photo_urls_markdown(&urls, "Roof Cleaning - Before/After"),
			"## Roof Cleaning - Before/After\n\n\
			 [Photo 1: before.jpg](https://bucket.s3.amazonaws.com/photos/before.jpg)\n\
			 [Photo 2: after.jpg](https://bucket.s3.amazonaws.com/photos/after.jpg)"
		);
	}

	#[test]
	fn markdown_handles_empty_and_slashless_input() {
		assert_eq!(format_photo_urls_markdown::<&str>(&[], DEFAULT_NOTE_TITLE), "## Photos\n\n");
		assert_eq!(
			format_photo_urls_markdown(&["plain.jpg".to_owned()], "T"),
			"## T\n\n[Photo 1: plain.jpg](plain.jpg)"
		);
		assert_eq!(
			format_photo_urls_markdown(&["https://h/dir/"], "T"),
			"## T\n\n[Photo 1: ](https://h/dir/)"
		);
	}
}
