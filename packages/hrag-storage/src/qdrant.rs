/// Payload key carrying the leaf node id of an indexed sub-chunk.
pub const NODE_ID_PAYLOAD_KEY: &str = "node_id";

use crate::Result;

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection_prefix: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &hrag_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection_prefix: cfg.collection_prefix.clone(),
			vector_dim: cfg.vector_dim,
		})
	}

	pub fn collection_for(&self, index_id: &str) -> String {
		collection_name(&self.collection_prefix, index_id)
	}
}

pub fn collection_name(prefix: &str, index_id: &str) -> String {
	format!("{prefix}_{index_id}")
}
