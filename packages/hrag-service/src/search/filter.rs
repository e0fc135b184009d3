use reqwest::Url;

use crate::hierarchy::Climb;

/// Strips surrounding whitespace and slashes. An empty result means no filter.
pub fn normalize_url_filter(filter: Option<&str>) -> Option<String> {
	let trimmed = filter?.trim().trim_matches('/');

	(!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Path component of an absolute URL, or the raw string for anything that does not parse as one.
pub fn url_path(source_url: &str) -> String {
	let trimmed = source_url.trim();

	match Url::parse(trimmed) {
		Ok(url) => url.path().to_string(),
		Err(_) => trimmed.to_string(),
	}
}

/// `filter` must already be normalized.
pub fn matches_url_filter(source_url: Option<&str>, filter: Option<&str>) -> bool {
	let Some(filter) = filter else {
		return true;
	};
	let Some(source_url) = source_url else {
		return false;
	};

	url_path(source_url).starts_with(&format!("/{filter}/"))
}

/// Keeps climbs whose child's source URL lies under the filter prefix.
pub fn apply_url_filter(climbs: Vec<Climb>, filter: Option<&str>) -> Vec<Climb> {
	if filter.is_none() {
		return climbs;
	}

	climbs
		.into_iter()
		.filter(|climb| matches_url_filter(climb.child.metadata.source_url.as_deref(), filter))
		.collect()
}
