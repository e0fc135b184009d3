use serde::{Deserialize, Serialize};

use crate::{Result, RetrievalService, registry};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
	pub ram_hits: u64,
	pub disk_hits: u64,
	pub misses: u64,
	pub writes: u64,
	pub total_requests: u64,
	/// Share of lookups answered by either tier, rounded to two decimals.
	pub hit_rate_percentage: f64,
	pub ram_entries: usize,
}
impl CacheStats {
	pub fn from_counts(
		ram_hits: u64,
		disk_hits: u64,
		misses: u64,
		writes: u64,
		ram_entries: usize,
	) -> Self {
		let total_requests = ram_hits + disk_hits + misses;
		let hit_rate_percentage = if total_requests == 0 {
			0.0
		} else {
			let rate = (ram_hits + disk_hits) as f64 / total_requests as f64 * 100.0;

			(rate * 100.0).round() / 100.0
		};

		Self {
			ram_hits,
			disk_hits,
			misses,
			writes,
			total_requests,
			hit_rate_percentage,
			ram_entries,
		}
	}
}

impl RetrievalService {
	/// Deletes one index's persisted cache and its RAM entries.
	pub async fn purge_index_cache(&self, index_id: &str) -> Result<bool> {
		registry::validate_index_id(index_id)?;

		self.cache.purge(index_id).await
	}

	/// Drops the loaded handle and the cache of an index, e.g. after it was rebuilt.
	pub async fn invalidate_index(&self, index_id: &str) -> Result<bool> {
		registry::validate_index_id(index_id)?;

		let was_loaded = self.registry.invalidate(index_id);

		self.cache.purge(index_id).await?;
		tracing::info!(index_id = %index_id, was_loaded, "Index invalidated.");

		Ok(was_loaded)
	}

	pub fn cache_stats(&self) -> CacheStats {
		self.cache.stats()
	}

	pub fn reset_cache_stats(&self) {
		self.cache.reset_stats();
	}

	pub fn clear_ram_cache(&self) -> usize {
		let cleared = self.cache.clear_ram();

		tracing::info!(cleared, "RAM cache cleared.");

		cleared
	}
}
