use std::{collections::HashMap, sync::Arc};

use qdrant_client::qdrant::{
	PointId, Query, QueryPointsBuilder, ScoredPoint, Value, point_id::PointIdOptions, value::Kind,
};

use crate::{BoxFuture, EmbeddingProvider};
use hrag_config::EmbeddingProviderConfig;
use hrag_storage::qdrant::{NODE_ID_PAYLOAD_KEY, QdrantStore};

/// A leaf id proposed by the vector index with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
	pub node_id: String,
	pub score: f32,
}
impl Candidate {
	pub fn new(node_id: impl Into<String>, score: f32) -> Self {
		Self { node_id: node_id.into(), score }
	}
}

pub trait CandidateSource
where
	Self: Send + Sync,
{
	fn query<'a>(
		&'a self,
		query: &'a str,
		top_k: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Candidate>>>;
}

/// Nearest-neighbour candidates from the index's Qdrant collection.
pub struct QdrantCandidateSource {
	qdrant: Arc<QdrantStore>,
	collection: String,
	embedding: Arc<dyn EmbeddingProvider>,
	embedding_cfg: EmbeddingProviderConfig,
}
impl QdrantCandidateSource {
	pub fn new(
		qdrant: Arc<QdrantStore>,
		index_id: &str,
		embedding: Arc<dyn EmbeddingProvider>,
		embedding_cfg: EmbeddingProviderConfig,
	) -> Self {
		let collection = qdrant.collection_for(index_id);

		Self { qdrant, collection, embedding, embedding_cfg }
	}

	async fn nearest(&self, query: &str, top_k: u32) -> color_eyre::Result<Vec<Candidate>> {
		let vectors = self.embedding.embed(&self.embedding_cfg, &[query.to_string()]).await?;
		let Some(vector) = vectors.into_iter().next() else {
			return Err(color_eyre::eyre::eyre!("Embedding provider returned no vectors."));
		};

		if vector.len() != self.qdrant.vector_dim as usize {
			return Err(color_eyre::eyre::eyre!("Embedding vector dimension mismatch."));
		}

		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.limit(top_k as u64)
			.with_payload(true);
		let response = self.qdrant.client.query(search).await?;

		Ok(collect_candidates(&response.result))
	}
}
impl CandidateSource for QdrantCandidateSource {
	fn query<'a>(
		&'a self,
		query: &'a str,
		top_k: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Candidate>>> {
		Box::pin(self.nearest(query, top_k))
	}
}

pub fn collect_candidates(points: &[ScoredPoint]) -> Vec<Candidate> {
	let mut out = Vec::with_capacity(points.len());

	for point in points {
		let node_id = payload_string(&point.payload, NODE_ID_PAYLOAD_KEY)
			.or_else(|| point.id.as_ref().and_then(point_id_to_string));
		let Some(node_id) = node_id else {
			tracing::warn!("Vector candidate missing node_id.");

			continue;
		};

		out.push(Candidate { node_id, score: point.score });
	}

	out
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) if !text.is_empty() => Some(text.to_string()),
		_ => None,
	}
}

fn point_id_to_string(point_id: &PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		Some(PointIdOptions::Num(id)) => Some(id.to_string()),
		None => None,
	}
}
