use crate::search::filter::normalize_url_filter;

const FIELD_SEPARATOR: char = '\u{1f}';
const GROUP_SEPARATOR: char = '\u{1e}';
const MAX_FINGERPRINT_LEN: usize = 64;

/// Lowercases, trims and collapses whitespace runs to one space.
pub fn normalize_query(query: &str) -> String {
	query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Sorted, deduplicated group names. Input order never affects the result.
pub fn normalize_groups(groups: &[String]) -> Vec<String> {
	let mut out: Vec<String> = groups.iter().map(|group| strip_separators(group)).collect();

	out.sort();
	out.dedup();

	out
}

/// BLAKE3 digest of the normalized key fields, hex encoded and truncated to `len` characters.
pub fn fingerprint(
	index_id: &str,
	query: &str,
	groups: &[String],
	url_filter: Option<&str>,
	len: usize,
) -> String {
	let groups = normalize_groups(groups).join(&GROUP_SEPARATOR.to_string());
	let url_filter = normalize_url_filter(url_filter).unwrap_or_default();
	let payload = [
		strip_separators(&normalize_query(query)),
		strip_separators(index_id),
		groups,
		strip_separators(&url_filter),
	]
	.join(&FIELD_SEPARATOR.to_string());
	let mut hex = blake3::hash(payload.as_bytes()).to_hex().to_string();

	hex.truncate(len.clamp(1, MAX_FINGERPRINT_LEN));

	hex
}

pub fn cache_key_prefix(fingerprint: &str) -> &str {
	let len = fingerprint.len().min(12);

	&fingerprint[..len]
}

fn strip_separators(raw: &str) -> String {
	raw.chars().filter(|ch| *ch != FIELD_SEPARATOR && *ch != GROUP_SEPARATOR).collect()
}
