use std::sync::Arc;

use qdrant_client::{
	client::Payload,
	qdrant::{
		CreateCollectionBuilder, Distance, PointStruct, UpsertPointsBuilder, VectorParamsBuilder,
	},
};

use hrag_config::EmbeddingProviderConfig;
use hrag_service::{BoxFuture, CandidateSource, EmbeddingProvider, QdrantCandidateSource};
use hrag_storage::qdrant::{NODE_ID_PAYLOAD_KEY, QdrantStore};
use hrag_testkit::{TestIndexes, VECTOR_DIM};

struct AxisEmbedding;
impl EmbeddingProvider for AxisEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		let dim = cfg.dimensions as usize;

		Box::pin(async move { Ok(texts.iter().map(|_| axis(dim, 0)).collect()) })
	}
}

fn axis(dim: usize, hot: usize) -> Vec<f32> {
	let mut vec = vec![0.0; dim];

	vec[hot] = 1.0;

	vec
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set HRAG_QDRANT_URL to run this test."]
async fn nearest_points_map_to_leaf_ids() {
	let Some(_) = hrag_testkit::env_qdrant_url() else {
		eprintln!("Skipping nearest_points_map_to_leaf_ids; set HRAG_QDRANT_URL to run this test.");

		return;
	};
	let indexes = TestIndexes::new().expect("Failed to create test indexes root.");
	let cfg = indexes.config();
	let index_id = indexes.unique_index_id("qdrant");
	let qdrant =
		Arc::new(QdrantStore::new(&cfg.storage.qdrant).expect("Failed to build Qdrant client."));
	let collection = qdrant.collection_for(&index_id);
	let dim = VECTOR_DIM as usize;

	qdrant
		.client
		.create_collection(
			CreateCollectionBuilder::new(collection.clone())
				.vectors_config(VectorParamsBuilder::new(VECTOR_DIM as u64, Distance::Cosine)),
		)
		.await
		.expect("Failed to create Qdrant collection.");

	let mut points = Vec::new();

	for (n, leaf_id) in ["leaf-near", "leaf-far"].into_iter().enumerate() {
		let mut payload = Payload::new();

		payload.insert(NODE_ID_PAYLOAD_KEY, leaf_id);
		points.push(PointStruct::new(n as u64 + 1, axis(dim, n), payload));
	}

	qdrant
		.client
		.upsert_points(UpsertPointsBuilder::new(collection.clone(), points).wait(true))
		.await
		.expect("Failed to upsert Qdrant points.");

	let source = QdrantCandidateSource::new(
		qdrant.clone(),
		&index_id,
		Arc::new(AxisEmbedding),
		cfg.providers.embedding.clone(),
	);
	let candidates = source.query("anything", 2).await.expect("Candidate query failed.");
	let _ = qdrant.client.delete_collection(collection).await;

	assert_eq!(candidates.len(), 2);
	assert_eq!(candidates[0].node_id, "leaf-near");
	assert!(candidates[0].score > candidates[1].score);
}
