use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
	hierarchy::{Climb, Provenance},
	registry::SourceArchive,
};
use hrag_storage::models::{Node, NodeMetadata};

pub const UNKNOWN_TITLE: &str = "Title not found";
pub const UNKNOWN_DOCUMENT: &str = "Unknown document";
pub const MISSING_SOURCE_URL: &str = "URL not found";
pub const ROOT_HEADER_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
	/// The matched child chunk.
	pub precise_content: String,
	/// The child's parent, or the child itself when it has none.
	pub context_content: String,
	pub score: f32,
	pub title: String,
	pub source_url: String,
	pub header_path: String,
	pub file_ref: Option<String>,
	pub file_type: Option<String>,
	pub search_text_start: Option<String>,
	pub search_text_end: Option<String>,
	pub node_anchor_id: Option<String>,
	pub page_number: Option<i64>,
	pub page_confidence: Option<f64>,
	pub html_confidence: Option<f64>,
	pub node_hierarchy: Provenance,
}

pub fn build_result(climb: &Climb, archive: &SourceArchive) -> SearchResult {
	let meta = &climb.child.metadata;
	let file_ref = resolve_file_ref(meta, archive);
	let file_type = file_ref.as_deref().and_then(extension).or_else(|| meta.file_type.clone());

	SearchResult {
		precise_content: climb.child.text.clone(),
		context_content: climb.parent.text.clone(),
		score: climb.score,
		title: title(meta),
		source_url: non_blank(meta.source_url.as_deref())
			.unwrap_or(MISSING_SOURCE_URL)
			.to_string(),
		header_path: non_blank(meta.header_path.as_deref()).unwrap_or(ROOT_HEADER_PATH).to_string(),
		file_ref,
		file_type,
		search_text_start: meta.search_text_start.clone(),
		search_text_end: meta.search_text_end.clone(),
		node_anchor_id: meta.node_anchor_id.clone(),
		page_number: meta.page_number,
		page_confidence: meta.page_confidence,
		html_confidence: meta.html_confidence,
		node_hierarchy: climb.provenance,
	}
}

/// "Header 2", then "Header 1", then the file name.
pub fn title(meta: &NodeMetadata) -> String {
	meta.extra_str("Header 2")
		.or_else(|| meta.extra_str("Header 1"))
		.or_else(|| non_blank(meta.file_name.as_deref()))
		.unwrap_or(UNKNOWN_TITLE)
		.to_string()
}

/// Text sent to the reranker for one candidate: the parent's text, optionally prefixed with its
/// document and section.
pub fn rerank_document(parent: &Node, breadcrumb: bool) -> String {
	if !breadcrumb {
		return parent.text.clone();
	}

	let meta = &parent.metadata;
	let document = non_blank(meta.file_name.as_deref()).unwrap_or(UNKNOWN_DOCUMENT);
	let sections: Vec<&str> = meta
		.header_path
		.as_deref()
		.unwrap_or_default()
		.split('/')
		.map(str::trim)
		.filter(|segment| !segment.is_empty())
		.collect();
	let section = if sections.is_empty() { "Root".to_string() } else { sections.join(" > ") };

	format!("[Document: {document} | Section: {section}]\n\n{}", parent.text)
}

fn resolve_file_ref(meta: &NodeMetadata, archive: &SourceArchive) -> Option<String> {
	if let Some(source) = non_blank(meta.source_filename.as_deref()) {
		return Some(source.to_string());
	}

	let file_name = non_blank(meta.file_name.as_deref())?;

	Some(archive.lookup(file_name).unwrap_or(file_name).to_string())
}

fn extension(file_ref: &str) -> Option<String> {
	Path::new(file_ref).extension().map(|ext| ext.to_string_lossy().to_lowercase())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.filter(|value| !value.trim().is_empty())
}
