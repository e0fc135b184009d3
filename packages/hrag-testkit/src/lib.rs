mod error;

pub use error::{Error, Result};

use std::{
	collections::HashSet,
	env,
	path::{Path, PathBuf},
	sync::Mutex,
};

use serde_json::Map;
use tempfile::TempDir;
use uuid::Uuid;

use hrag_config::{
	Config, EmbeddingProviderConfig, ProviderConfig, Providers, Qdrant, Search, Service, Storage,
};
use hrag_storage::{
	db::{NodeStore, StoreOptions},
	models::{Node, NodeMetadata},
	queries,
	schema::DEFAULT_COLLECTION,
};

pub const DOCSTORE_FILE: &str = "docstore.sqlite";
pub const VECTOR_DIM: u32 = 8;

/// A temporary indexes root. Every index created through it lives in its own sub-directory and
/// disappears with the value.
pub struct TestIndexes {
	root: TempDir,
	created: Mutex<HashSet<String>>,
}
impl TestIndexes {
	pub fn new() -> Result<Self> {
		let root = tempfile::Builder::new().prefix("hrag_test_").tempdir()?;

		Ok(Self { root, created: Mutex::new(HashSet::new()) })
	}

	pub fn root(&self) -> &Path {
		self.root.path()
	}

	pub fn index_dir(&self, index_id: &str) -> PathBuf {
		self.root.path().join(index_id)
	}

	pub fn unique_index_id(&self, prefix: &str) -> String {
		format!("{prefix}_{}", Uuid::new_v4().simple())
	}

	/// Creates `<root>/<index_id>/docstore.sqlite` holding `nodes` in the default collection.
	pub async fn create_index(&self, index_id: &str, nodes: &[Node]) -> Result<PathBuf> {
		let dir = self.index_dir(index_id);

		tokio::fs::create_dir_all(&dir).await?;

		let store = NodeStore::create(&dir.join(DOCSTORE_FILE), &StoreOptions::default()).await?;

		queries::put_all(&store, nodes, DEFAULT_COLLECTION).await?;
		store.close().await;
		self.created.lock().unwrap_or_else(|err| err.into_inner()).insert(index_id.to_string());

		Ok(dir)
	}

	/// Opens an index created by [`Self::create_index`].
	pub async fn open_store(&self, index_id: &str) -> Result<NodeStore> {
		if !self.created.lock().unwrap_or_else(|err| err.into_inner()).contains(index_id) {
			return Err(Error::Message(format!("Index {index_id:?} was not created by this root.")));
		}

		Ok(NodeStore::open(&self.index_dir(index_id).join(DOCSTORE_FILE), &StoreOptions::default())
			.await?)
	}

	/// A complete configuration rooted at this directory. Provider endpoints point at
	/// localhost and are expected to be replaced by test doubles.
	pub fn config(&self) -> Config {
		test_config(self.root.path())
	}
}

pub fn test_config(indexes_dir: &Path) -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		storage: Storage {
			indexes_dir: indexes_dir.to_path_buf(),
			docstore_file: DOCSTORE_FILE.to_string(),
			collection: DEFAULT_COLLECTION.to_string(),
			pool_max_conns: 4,
			busy_timeout_ms: 5_000,
			qdrant: Qdrant {
				url: env_qdrant_url().unwrap_or_else(|| "http://127.0.0.1:6334".to_string()),
				collection_prefix: "hrag_test".to_string(),
				vector_dim: VECTOR_DIM,
			},
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test-embedding".to_string(),
				dimensions: VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rerank: Some(ProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/rerank".to_string(),
				model: "test-rerank".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			}),
		},
		search: Search::default(),
	}
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("HRAG_QDRANT_URL").ok()
}

/// Top-level context node.
pub fn parent(id: &str, text: &str) -> Node {
	Node::new(id, text)
}

/// Child node. `parent_id` of `None` makes it standalone.
pub fn child(id: &str, parent_id: Option<&str>, text: &str) -> Node {
	let node = Node::new(id, text);

	match parent_id {
		Some(parent_id) => node.with_parent(parent_id),
		None => node,
	}
}

/// Leaf sub-chunk under `child_id`.
pub fn leaf(id: &str, child_id: &str) -> Node {
	Node::new(id, format!("leaf {id}")).with_parent(child_id)
}

/// Metadata with a source URL and file name, the fields most display tests need.
pub fn source_metadata(source_url: &str, file_name: &str) -> NodeMetadata {
	NodeMetadata {
		source_url: Some(source_url.to_string()),
		file_name: Some(file_name.to_string()),
		..NodeMetadata::default()
	}
}
