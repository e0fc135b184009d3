use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A chunk record. Its tier is not stored: it follows from walking `relationships.parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
	pub id: String,
	pub text: String,
	#[serde(default)]
	pub metadata: NodeMetadata,
	#[serde(default)]
	pub relationships: Relationships,
}
impl Node {
	pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			text: text.into(),
			metadata: NodeMetadata::default(),
			relationships: Relationships::default(),
		}
	}

	pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
		self.relationships.parent = Some(parent_id.into());

		self
	}

	pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
		self.metadata = metadata;

		self
	}

	pub fn parent_id(&self) -> Option<&str> {
		self.relationships.parent.as_deref().filter(|id| !id.is_empty())
	}
}

/// Identifiers of related nodes. Resolving one is always a store lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationships {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub previous: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub next: Option<String>,
}

/// Well-known ingestion keys plus every other key under `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file_name: Option<String>,
	/// Slash-delimited section titles, e.g. "/Guide/Install".
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub header_path: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file_type: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source_filename: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub search_text_start: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub search_text_end: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub node_anchor_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub page_number: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub page_confidence: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub html_confidence: Option<f64>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl NodeMetadata {
	pub fn extra_str(&self, key: &str) -> Option<&str> {
		self.extra.get(key).and_then(Value::as_str).filter(|value| !value.trim().is_empty())
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeLookup {
	Found(Node),
	NotFound,
	/// The stored value exists but does not decode.
	Corrupt { reason: String },
}
impl NodeLookup {
	pub fn found(self) -> Option<Node> {
		match self {
			Self::Found(node) => Some(node),
			Self::NotFound | Self::Corrupt { .. } => None,
		}
	}
}
