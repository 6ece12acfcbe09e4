//! Web-link helpers for confirming created resources in the Jobber UI.

// self
use crate::_prelude::*;

/// Field holding a resource's web link in GraphQL responses.
pub const WEB_URI_FIELD: &str = "jobberWebUri";

/// Failures raised while reading links out of resource data.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum UrlHelperError {
	/// Resource data is not a JSON object.
	#[error("Resource data must be an object, got {found}.")]
	NotAnObject {
		/// JSON type that was found instead.
		found: &'static str,
	},
	/// A required field is absent or null.
	#[error(
		"Resource data missing required field '{field}'. Include '{field}' in the GraphQL query or check resource permissions."
	)]
	MissingField {
		/// Name of the missing field.
		field: String,
	},
	/// The link field holds something other than a string.
	#[error("Field '{field}' must be a string, got {found}.")]
	NotAString {
		/// Name of the offending field.
		field: String,
		/// JSON type that was found instead.
		found: &'static str,
	},
	/// The link field is blank.
	#[error("Field '{field}' is an empty string.")]
	Empty {
		/// Name of the offending field.
		field: String,
	},
}

/// Formats a two-line success message with the resource's web link.
///
/// The display name is taken from `name_field` and falls back to `id`.
pub fn format_success(
	resource_type: &str,
	resource: &Value,
	name_field: &str,
) -> Result<String, UrlHelperError> {
	let map = as_object(resource)?;
	let id = map.get("id").ok_or_else(|| missing("id"))?;
	let uri = map.get(WEB_URI_FIELD).ok_or_else(|| missing(WEB_URI_FIELD))?;
	let name = map.get(name_field).unwrap_or(id);

	Ok(format!(
		"✅ {resource_type} created: {}\n🔗 View in Jobber: {}",
		display(name),
		display(uri)
	))
}

/// Wraps `url` in an OSC 8 terminal hyperlink; `text` defaults to the URL itself.
pub fn clickable_link(url: &str, text: Option<&str>) -> String {
	let text = text.filter(|t| !t.is_empty()).unwrap_or(url);

	format!("\x1b]8;;{url}\x1b\\{text}\x1b]8;;\x1b\\")
}

/// Returns the non-blank string stored under `field`.
pub fn validate_url<'a>(resource: &'a Value, field: &str) -> Result<&'a str, UrlHelperError> {
	let value = match as_object(resource)?.get(field) {
		None | Some(Value::Null) => return Err(missing(field)),
		Some(value) => value,
	};
	let url = value
		.as_str()
		.ok_or_else(|| UrlHelperError::NotAString { field: field.into(), found: kind(value) })?;

	if url.trim().is_empty() {
		return Err(UrlHelperError::Empty { field: field.into() });
	}

	Ok(url)
}

fn as_object(value: &Value) -> Result<&serde_json::Map<String, Value>, UrlHelperError> {
	value.as_object().ok_or(UrlHelperError::NotAnObject { found: kind(value) })
}

fn missing(field: &str) -> UrlHelperError {
	UrlHelperError::MissingField { field: field.into() }
}

fn display(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

fn kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}
