use std::cmp::Ordering;

use color_eyre::{Result, eyre};
use serde_json::Value;

use crate::Endpoint;

/// One scored document, `index` points into the documents sent to the reranker.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankHit {
	pub index: usize,
	pub score: f32,
}

/// Scores `docs` against `query` and returns at most `top_n` hits, best first.
pub async fn rerank(
	cfg: &hrag_config::ProviderConfig,
	query: &str,
	docs: &[String],
	top_n: usize,
) -> Result<Vec<RerankHit>> {
	let body = serde_json::json!({
		"model": cfg.model,
		"query": query,
		"documents": docs,
		"top_n": top_n,
	});
	let json = Endpoint::from(cfg).post_json(&body).await?;

	parse_rerank_response(json, docs.len(), top_n)
}

fn parse_rerank_response(json: Value, doc_count: usize, top_n: usize) -> Result<Vec<RerankHit>> {
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Rerank response is missing results array."))?;
	let mut hits = Vec::with_capacity(results.len());

	for item in results {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.ok_or_else(|| eyre::eyre!("Rerank result missing index."))? as usize;
		let score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(|v| v.as_f64())
			.ok_or_else(|| eyre::eyre!("Rerank result missing score."))? as f32;

		if index >= doc_count || hits.iter().any(|hit: &RerankHit| hit.index == index) {
			continue;
		}

		hits.push(RerankHit { index, score });
	}

	hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
	hits.truncate(top_n);

	Ok(hits)
}
