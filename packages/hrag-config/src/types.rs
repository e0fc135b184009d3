use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	/// Root directory holding one sub-directory per index.
	pub indexes_dir: PathBuf,
	#[serde(default = "default_docstore_file")]
	pub docstore_file: String,
	/// Node store collection holding chunk records.
	#[serde(default = "default_collection")]
	pub collection: String,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
	#[serde(default = "default_busy_timeout_ms")]
	pub busy_timeout_ms: u64,
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	/// Collections are named "<collection_prefix>_<index_id>".
	pub collection_prefix: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	/// Optional. Reranking is skipped when absent or when `api_base` is blank.
	pub rerank: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	/// Leaf candidates requested from the vector source per query.
	pub candidate_k: u32,
	pub default_top_k: u32,
	pub max_top_k: u32,
	pub candidate_timeout_ms: u64,
	pub rerank_timeout_ms: u64,
	/// Prefix reranker documents with "[Document: .. | Section: ..]".
	pub rerank_breadcrumb: bool,
	pub cache: SearchCache,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			candidate_k: 50,
			default_top_k: 5,
			max_top_k: 50,
			candidate_timeout_ms: 30_000,
			rerank_timeout_ms: 15_000,
			rerank_breadcrumb: true,
			cache: SearchCache::default(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchCache {
	pub enabled: bool,
	pub max_ram_entries: usize,
	/// Hex characters kept from the BLAKE3 digest.
	pub fingerprint_len: usize,
	pub file_name: String,
}
impl Default for SearchCache {
	fn default() -> Self {
		Self {
			enabled: true,
			max_ram_entries: 10_000,
			fingerprint_len: 16,
			file_name: "cache.json".to_string(),
		}
	}
}

fn default_docstore_file() -> String {
	"docstore.sqlite".to_string()
}

fn default_collection() -> String {
	"docstore/data".to_string()
}

fn default_pool_max_conns() -> u32 {
	8
}

fn default_busy_timeout_ms() -> u64 {
	5_000
}
