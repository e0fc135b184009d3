pub mod filter;
pub mod result;

use std::{cmp::Ordering, collections::HashSet, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
	Error, Result, RetrievalService,
	cache::CachedHit,
	candidates::Candidate,
	hierarchy::{Climb, HierarchyResolver, Provenance},
	registry::IndexHandle,
};
use hrag_storage::{models::Node, queries};
pub use result::SearchResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
	pub index_id: String,
	pub query: String,
	/// Access groups already resolved by the caller.
	#[serde(default)]
	pub groups: Vec<String>,
	#[serde(default)]
	pub url_filter: Option<String>,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default = "default_rerank")]
	pub rerank: bool,
}
impl SearchRequest {
	pub fn new(index_id: impl Into<String>, query: impl Into<String>) -> Self {
		Self {
			index_id: index_id.into(),
			query: query.into(),
			groups: Vec::new(),
			url_filter: None,
			top_k: None,
			rerank: default_rerank(),
		}
	}
}

impl RetrievalService {
	pub async fn search(&self, req: SearchRequest) -> Result<Vec<SearchResult>> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let top_k = self.resolve_top_k(req.top_k)?;
		let handle = self.registry.get_or_load(&req.index_id).await?;
		let url_filter = filter::normalize_url_filter(req.url_filter.as_deref());
		// Only reranked orderings are cached.
		let cache_key = (req.rerank && self.cache.enabled()).then(|| {
			self.cache.key(&handle.index_id, query, &req.groups, url_filter.as_deref())
		});

		// A cached list shorter than top_k may come from a smaller earlier request.
		if let Some(key) = &cache_key
			&& let Some(hits) = self.cache.get_at_least(key, top_k).await
		{
			return self.rebuild_cached(&handle, hits, top_k).await;
		}

		let climbs = self.retrieve(&handle, query, top_k).await?;
		let climbs = filter::apply_url_filter(climbs, url_filter.as_deref());
		let ranked = if req.rerank {
			self.rerank_or_fallback(query, climbs, top_k).await
		} else {
			order_by_score(climbs, top_k)
		};

		if let Some(key) = &cache_key
			&& !ranked.is_empty()
		{
			let hits: Vec<CachedHit> = ranked
				.iter()
				.map(|climb| CachedHit::new(&climb.child.id, &climb.parent.id, climb.score))
				.collect();

			self.cache.set(key, &hits).await;
		}

		tracing::info!(
			index_id = %handle.index_id,
			results = ranked.len(),
			rerank = req.rerank,
			"Search completed."
		);

		Ok(ranked.iter().map(|climb| result::build_result(climb, &handle.source_archive)).collect())
	}

	fn resolve_top_k(&self, requested: Option<u32>) -> Result<usize> {
		let cfg = &self.cfg.search;
		let top_k = requested.unwrap_or(cfg.default_top_k);

		if top_k == 0 {
			return Err(Error::InvalidRequest {
				message: "top_k must be greater than zero.".to_string(),
			});
		}

		Ok(top_k.min(cfg.max_top_k) as usize)
	}

	async fn retrieve(&self, handle: &IndexHandle, query: &str, top_k: usize) -> Result<Vec<Climb>> {
		let candidate_k = self.cfg.search.candidate_k.max(top_k as u32);
		let timeout = Duration::from_millis(self.cfg.search.candidate_timeout_ms);
		let candidates: Vec<Candidate> =
			match tokio::time::timeout(timeout, handle.candidates.query(query, candidate_k)).await {
				Ok(Ok(candidates)) => candidates,
				Ok(Err(err)) => {
					tracing::error!(error = %err, index_id = %handle.index_id, "Candidate source failed.");

					return Err(Error::ServiceUnavailable {
						message: format!("Candidate source failed: {err}"),
					});
				},
				Err(_) => {
					tracing::error!(
						index_id = %handle.index_id,
						timeout_ms = self.cfg.search.candidate_timeout_ms,
						"Candidate source timed out."
					);

					return Err(Error::ServiceUnavailable {
						message: "Candidate source timed out.".to_string(),
					});
				},
			};

		if candidates.is_empty() {
			return Ok(Vec::new());
		}

		let mut resolver = HierarchyResolver::new(&handle.store, &handle.collection);
		let climbs = resolver.resolve(&candidates).await?;

		tracing::debug!(
			index_id = %handle.index_id,
			candidates = candidates.len(),
			resolved = climbs.len(),
			"Hierarchy resolved."
		);

		Ok(climbs)
	}

	/// Reranks parent documents. Any reranker problem falls back to carried-score order.
	async fn rerank_or_fallback(&self, query: &str, climbs: Vec<Climb>, top_k: usize) -> Vec<Climb> {
		if climbs.is_empty() {
			return climbs;
		}

		let Some(rerank_cfg) = self.cfg.providers.rerank.as_ref() else {
			tracing::debug!("Reranker not configured. Ordering by vector score.");

			return order_by_score(climbs, top_k);
		};
		let docs: Vec<String> = climbs
			.iter()
			.map(|climb| result::rerank_document(&climb.parent, self.cfg.search.rerank_breadcrumb))
			.collect();
		let timeout = Duration::from_millis(self.cfg.search.rerank_timeout_ms);
		let call = self.providers.rerank.rerank(rerank_cfg, query, &docs, top_k);

		match tokio::time::timeout(timeout, call).await {
			Ok(Ok(hits)) => {
				let mut seen = HashSet::new();
				let mut reranked: Vec<Climb> = hits
					.into_iter()
					.filter(|hit| hit.index < climbs.len() && seen.insert(hit.index))
					.map(|hit| Climb { score: hit.score, ..climbs[hit.index].clone() })
					.collect();

				if reranked.is_empty() {
					tracing::warn!("Reranker returned no usable scores. Ordering by vector score.");

					return order_by_score(climbs, top_k);
				}

				reranked.sort_by(|a, b| cmp_score_desc(a.score, b.score));
				reranked.truncate(top_k);

				reranked
			},
			Ok(Err(err)) => {
				tracing::warn!(error = %err, "Reranker failed. Ordering by vector score.");

				order_by_score(climbs, top_k)
			},
			Err(_) => {
				tracing::warn!(
					timeout_ms = self.cfg.search.rerank_timeout_ms,
					"Reranker timed out. Ordering by vector score."
				);

				order_by_score(climbs, top_k)
			},
		}
	}

	async fn rebuild_cached(
		&self,
		handle: &IndexHandle,
		hits: Vec<CachedHit>,
		top_k: usize,
	) -> Result<Vec<SearchResult>> {
		let mut out = Vec::with_capacity(hits.len().min(top_k));

		for hit in hits.into_iter().take(top_k) {
			let Some(child) = self.cached_node(handle, &hit.child_id).await? else {
				tracing::warn!(child_id = %hit.child_id, "Cached result references a missing child.");

				continue;
			};
			let parent = if hit.parent_id == hit.child_id {
				child.clone()
			} else {
				let Some(parent) = self.cached_node(handle, &hit.parent_id).await? else {
					tracing::warn!(
						parent_id = %hit.parent_id,
						"Cached result references a missing parent."
					);

					continue;
				};

				parent
			};
			let climb = Climb { child, parent, score: hit.score, provenance: Provenance::Cached };

			out.push(result::build_result(&climb, &handle.source_archive));
		}

		tracing::info!(index_id = %handle.index_id, results = out.len(), "Search served from cache.");

		Ok(out)
	}

	async fn cached_node(&self, handle: &IndexHandle, id: &str) -> Result<Option<Node>> {
		Ok(queries::get(&handle.store, id, &handle.collection).await?.found())
	}
}

/// Stable sort by descending score, then truncation.
pub fn order_by_score(mut climbs: Vec<Climb>, top_k: usize) -> Vec<Climb> {
	climbs.sort_by(|a, b| cmp_score_desc(a.score, b.score));
	climbs.truncate(top_k);

	climbs
}

fn cmp_score_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

fn default_rerank() -> bool {
	true
}
