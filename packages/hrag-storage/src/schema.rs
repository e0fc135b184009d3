use crate::{Error, Result};

pub const DEFAULT_COLLECTION: &str = "docstore/data";

/// Maps a collection name such as "docstore/data" onto its table, "docstore__data".
///
/// Each `/` becomes `__` and every other character is kept, so the mapping stays one-to-one only
/// while `_` never touches another `_` or a `/`. Names breaking that rule are rejected.
pub fn table_name(collection: &str) -> Result<String> {
	let trimmed = collection.trim();

	if trimmed.is_empty() {
		return Err(Error::InvalidArgument("Collection name must be non-empty.".to_string()));
	}
	if !trimmed
		.chars()
		.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-' | '/'))
	{
		return Err(Error::InvalidArgument(format!(
			"Collection name {collection:?} contains unsupported characters."
		)));
	}
	if ["__", "_/", "/_"].iter().any(|pattern| trimmed.contains(pattern)) {
		return Err(Error::InvalidArgument(format!(
			"Collection name {collection:?} would share a table with another collection."
		)));
	}

	Ok(trimmed.replace('/', "__"))
}

pub fn render_create_table(table: &str) -> String {
	format!("CREATE TABLE IF NOT EXISTS [{table}] (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
}
