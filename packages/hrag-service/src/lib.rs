pub mod admin;
pub mod cache;
pub mod candidates;
pub mod hierarchy;
pub mod registry;
pub mod search;

mod error;

pub use admin::CacheStats;
pub use cache::{CacheKey, CachedHit, QueryCache};
pub use candidates::{Candidate, CandidateSource, QdrantCandidateSource};
pub use error::{Error, Result};
pub use hierarchy::{Climb, HierarchyResolver, Provenance};
pub use registry::{IndexHandle, IndexLoader, IndexRegistry, StoreIndexLoader};
pub use search::{SearchRequest, SearchResult};

use std::{future::Future, pin::Pin, sync::Arc};

use hrag_config::{Config, EmbeddingProviderConfig, ProviderConfig};
use hrag_providers::{embedding, rerank};

pub use hrag_providers::rerank::RerankHit;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
		top_n: usize,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RerankHit>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, rerank: Arc<dyn RerankProvider>) -> Self {
		Self { embedding, rerank }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider }
	}
}

/// Query-side entry point: owns the index registry, the query cache and the model providers.
pub struct RetrievalService {
	pub cfg: Config,
	pub registry: IndexRegistry,
	pub cache: QueryCache,
	pub providers: Providers,
}
impl RetrievalService {
	/// Builds a service that loads indexes from `storage.indexes_dir` and queries Qdrant.
	pub fn new(cfg: Config) -> Result<Self> {
		let providers = Providers::default();
		let loader = StoreIndexLoader::new(&cfg, providers.embedding.clone())?;

		Ok(Self::with_parts(cfg, Arc::new(loader), providers))
	}

	pub fn with_parts(cfg: Config, loader: Arc<dyn IndexLoader>, providers: Providers) -> Self {
		let cache = QueryCache::new(&cfg);

		Self { cfg, registry: IndexRegistry::new(loader), cache, providers }
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
		top_n: usize,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RerankHit>>> {
		Box::pin(rerank::rerank(cfg, query, docs, top_n))
	}
}
