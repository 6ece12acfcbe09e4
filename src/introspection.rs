//! Schema introspection: fetch the `__schema` document, cache it on disk, and diff versions.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// crates.io
use directories::BaseDirs;
// self
use crate::{_prelude::*, client::JobberClient};

/// Standard introspection query covering types, fields, arguments, and directives.
pub const INTROSPECTION_QUERY: &str = r#"
query IntrospectionQuery {
	__schema {
		queryType { name }
		mutationType { name }
		subscriptionType { name }
		types {
			kind
			name
			description
			fields(includeDeprecated: true) {
				name
				description
				args {
					name
					description
					type { kind name ofType { kind name } }
				}
				type { kind name ofType { kind name } }
				isDeprecated
				deprecationReason
			}
			inputFields {
				name
				description
				type { kind name ofType { kind name } }
			}
			interfaces { kind name }
			enumValues(includeDeprecated: true) {
				name
				description
				isDeprecated
				deprecationReason
			}
			possibleTypes { kind name }
		}
		directives {
			name
			description
			locations
			args { name description }
		}
	}
}
"#;

/// Placeholder used for fields without a description.
pub const NO_DESCRIPTION: &str = "No description available";

/// Introspection failures.
#[derive(Debug, ThisError)]
pub enum IntrospectionError {
	/// The introspection query itself failed.
	#[error(transparent)]
	Client(#[from] Error),
	/// The schema cache could not be written or removed.
	#[error("{message}")]
	Cache {
		/// Human-readable description.
		message: String,
	},
	/// The schema document does not have the expected shape.
	#[error("{message}")]
	Schema {
		/// Human-readable description.
		message: String,
	},
	/// The requested type does not exist.
	#[error("Type '{name}' not found in schema.")]
	TypeNotFound {
		/// Requested type name.
		name: String,
	},
}

/// JSON file holding the last fetched schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaCache {
	path: PathBuf,
}
impl SchemaCache {
	/// Uses `path` as the cache file.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Uses `<user cache dir>/jobber/schema.json`.
	pub fn user_default() -> Result<Self, IntrospectionError> {
		Self::default_location().map(Self::new).ok_or_else(|| IntrospectionError::Cache {
			message: "Could not determine the user cache directory.".into(),
		})
	}

	/// Default cache file, if a home directory is known.
	pub fn default_location() -> Option<PathBuf> {
		BaseDirs::new().map(|dirs| dirs.cache_dir().join("jobber").join("schema.json"))
	}

	/// Cache file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Reads the cached schema; a missing, unreadable, or corrupt file is a miss.
	pub fn load(&self) -> Option<Value> {
		let bytes = fs::read(&self.path).ok()?;

		serde_json::from_slice(&bytes).ok()
	}

	/// Writes `schema` through a temporary file and renames it into place.
	pub fn store(&self, schema: &Value) -> Result<(), IntrospectionError> {
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| {
				cache_error(format!("Failed to create cache directory {}: {e}", parent.display()))
			})?;
		}

		let serialized = serde_json::to_vec_pretty(schema)
			.map_err(|e| cache_error(format!("Failed to serialize schema: {e}")))?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path)
				.map_err(|e| cache_error(format!("Failed to create {}: {e}", tmp_path.display())))?;

			file.write_all(&serialized)
				.map_err(|e| cache_error(format!("Failed to write {}: {e}", tmp_path.display())))?;
			file.sync_all()
				.map_err(|e| cache_error(format!("Failed to sync {}: {e}", tmp_path.display())))?;
		}

		fs::rename(&tmp_path, &self.path)
			.map_err(|e| cache_error(format!("Failed to replace {}: {e}", self.path.display())))
	}

	/// Deletes the cache file; returns `false` if there was nothing to delete.
	pub fn clear(&self) -> Result<bool, IntrospectionError> {
		match fs::remove_file(&self.path) {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(cache_error(format!("Failed to remove {}: {e}", self.path.display()))),
		}
	}
}

/// Type and field additions and removals between two schema versions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
	/// Types only present in the new schema.
	pub added_types: BTreeSet<String>,
	/// Types only present in the old schema.
	pub removed_types: BTreeSet<String>,
	/// Per type present in both, fields only present in the new schema.
	pub added_fields: BTreeMap<String, BTreeSet<String>>,
	/// Per type present in both, fields only present in the old schema.
	pub removed_fields: BTreeMap<String, BTreeSet<String>>,
}
impl SchemaDiff {
	/// Returns `true` if anything was removed.
	pub fn is_breaking(&self) -> bool {
		!self.removed_types.is_empty() || !self.removed_fields.is_empty()
	}

	/// Returns `true` if the schemas have the same types and fields.
	pub fn is_empty(&self) -> bool {
		self.added_types.is_empty() && self.added_fields.is_empty() && !self.is_breaking()
	}
}

/// Returns the schema, from `cache` when allowed and present, otherwise from the API.
///
/// A fresh schema is written back to `cache` when one is given.
pub async fn fetch_schema(
	client: &JobberClient,
	cache: Option<&SchemaCache>,
	use_cache: bool,
) -> Result<Value, IntrospectionError> {
	if use_cache && let Some(schema) = cache.and_then(SchemaCache::load) {
		return Ok(schema);
	}

	let schema = client.execute_query(INTROSPECTION_QUERY, None, None).await?;

	if let Some(cache) = cache {
		cache.store(&schema)?;
	}

	Ok(schema)
}

/// Maps each field of `type_name` to its description.
pub fn extract_field_descriptions(
	schema: &Value,
	type_name: &str,
) -> Result<BTreeMap<String, String>, IntrospectionError> {
	let ty = schema_types(schema)?
		.iter()
		.find(|ty| ty.get("name").and_then(Value::as_str) == Some(type_name))
		.ok_or_else(|| IntrospectionError::TypeNotFound { name: type_name.into() })?;

	Ok(fields_of(ty)
		.filter_map(|field| {
			let name = field.get("name").and_then(Value::as_str)?;
			let description =
				field.get("description").and_then(Value::as_str).unwrap_or(NO_DESCRIPTION);

			Some((name.to_owned(), description.to_owned()))
		})
		.collect())
}

/// Diffs type and field names between two schemas.
///
/// Fields are only compared for types that have fields in both versions.
pub fn compare_schemas(old: &Value, new: &Value) -> Result<SchemaDiff, IntrospectionError> {
	let old_types = types_by_name(old)?;
	let new_types = types_by_name(new)?;
	let mut diff = SchemaDiff {
		added_types: new_types.keys().filter(|n| !old_types.contains_key(*n)).cloned().collect(),
		removed_types: old_types.keys().filter(|n| !new_types.contains_key(*n)).cloned().collect(),
		..Default::default()
	};

	for (name, old_ty) in &old_types {
		let Some(new_ty) = new_types.get(name) else {
			continue;
		};
		let old_fields = field_names(old_ty);
		let new_fields = field_names(new_ty);

		if old_fields.is_empty() || new_fields.is_empty() {
			continue;
		}

		let added: BTreeSet<_> = new_fields.difference(&old_fields).cloned().collect();
		let removed: BTreeSet<_> = old_fields.difference(&new_fields).cloned().collect();

		if !added.is_empty() {
			diff.added_fields.insert(name.clone(), added);
		}
		if !removed.is_empty() {
			diff.removed_fields.insert(name.clone(), removed);
		}
	}

	Ok(diff)
}

fn schema_types(schema: &Value) -> Result<&Vec<Value>, IntrospectionError> {
	schema.pointer("/__schema/types").and_then(Value::as_array).ok_or_else(|| {
		IntrospectionError::Schema { message: "Schema is missing '__schema.types'.".into() }
	})
}

fn types_by_name(schema: &Value) -> Result<BTreeMap<String, &Value>, IntrospectionError> {
	Ok(schema_types(schema)?
		.iter()
		.filter_map(|ty| ty.get("name").and_then(Value::as_str).map(|name| (name.to_owned(), ty)))
		.collect())
}

fn fields_of(ty: &Value) -> impl Iterator<Item = &Value> {
	ty.get("fields").and_then(Value::as_array).into_iter().flatten()
}

fn field_names(ty: &Value) -> BTreeSet<String> {
	fields_of(ty).filter_map(|f| f.get("name").and_then(Value::as_str)).map(str::to_owned).collect()
}

fn cache_error(message: String) -> IntrospectionError {
	IntrospectionError::Cache { message }
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn schema(types: Value) -> Value {
		json!({ "__schema": { "types": types } })
	}

	#[test]
	fn extracts_descriptions_with_placeholder() {
		let schema = schema(json!([
			{ "name": "Client", "fields": [
				{ "name": "firstName", "description": "The first name of the client" },
				{ "name": "jobberWebUri", "description": null },
				{ "name": "id" }
			] },
			{ "name": "Boolean", "fields": null }
		]));
		let fields = extract_field_descriptions(&schema, "Client").expect("Client should exist.");

		assert_eq!(fields["firstName"], "The first name of the client");
		assert_eq!(fields["jobberWebUri"], NO_DESCRIPTION);
		assert_eq!(fields["id"], NO_DESCRIPTION);
		assert!(
			extract_field_descriptions(&schema, "Boolean").expect("Scalars exist.").is_empty()
		);
		assert!(matches!(
			extract_field_descriptions(&schema, "Quote"),
			Err(IntrospectionError::TypeNotFound { ref name }) if name == "Quote"
		));
		assert!(matches!(
			extract_field_descriptions(&json!({}), "Quote"),
			Err(IntrospectionError::Schema { .. })
		));
	}

	#[test]
	fn compare_reports_sorted_changes() {
		let old = schema(json!([
			{ "name": "Client", "fields": [{ "name": "id" }, { "name": "legacy" }] },
			{ "name": "Gone", "fields": [{ "name": "id" }] },
			{ "name": "String", "fields": null }
		]));
		let new = schema(json!([
			{ "name": "Client", "fields": [{ "name": "id" }, { "name": "zeta" }, { "name": "alpha" }] },
			{ "name": "Quote", "fields": [{ "name": "id" }] },
			{ "name": "String", "fields": null }
		]));
		let diff = compare_schemas(&old, &new).expect("Schemas should compare.");

		assert_eq!(diff.added_types.iter().collect::<Vec<_>>(), ["Quote"]);
		assert_eq!(diff.removed_types.iter().collect::<Vec<_>>(), ["Gone"]);
		assert_eq!(diff.added_fields["Client"].iter().collect::<Vec<_>>(), ["alpha", "zeta"]);
		assert_eq!(diff.removed_fields["Client"].iter().collect::<Vec<_>>(), ["legacy"]);
		assert!(diff.is_breaking());
		assert!(compare_schemas(&new, &new).expect("Schemas should compare.").is_empty());
	}

	#[test]
	fn cache_round_trip_and_clear() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let cache = SchemaCache::new(dir.path().join("nested").join("schema.json"));
		let value = schema(json!([{ "name": "Client" }]));

		assert!(cache.load().is_none());

		cache.store(&value).expect("Cache write should succeed.");

		assert_eq!(cache.load(), Some(value));
		assert!(!cache.path().with_extension("tmp").exists());
		assert!(cache.clear().expect("Clear should succeed."));
		assert!(!cache.clear().expect("Second clear should succeed."));
	}

	#[test]
	fn corrupt_cache_is_a_miss() {
		let dir = tempfile::tempdir().expect("Temp dir should be created.");
		let cache = SchemaCache::new(dir.path().join("schema.json"));

		fs::write(cache.path(), b"{ not json").expect("Writing garbage should succeed.");

		assert!(cache.load().is_none());
	}

	#[test]
	fn default_location_ends_with_jobber_schema() {
		if let Some(path) = SchemaCache::default_location() {
			assert!(path.ends_with("jobber/schema.json"));
		}
	}
}
