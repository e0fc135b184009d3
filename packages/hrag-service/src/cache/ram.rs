use moka::{policy::EvictionPolicy, sync::Cache};

use crate::cache::{CacheKey, CachedHit};

/// In-memory tier shared by every index, bounded by entry count with LRU eviction.
///
/// Pending maintenance is flushed after each insert so the bound holds as soon as `insert`
/// returns.
pub(crate) struct RamTier {
	entries: Cache<CacheKey, Vec<CachedHit>>,
}
impl RamTier {
	pub(crate) fn new(capacity: usize) -> Self {
		let entries = Cache::builder()
			.max_capacity(capacity.max(1) as u64)
			.eviction_policy(EvictionPolicy::lru())
			.build();

		Self { entries }
	}

	pub(crate) fn get(&self, key: &CacheKey) -> Option<Vec<CachedHit>> {
		self.entries.get(key)
	}

	pub(crate) fn insert(&self, key: CacheKey, hits: Vec<CachedHit>) {
		self.entries.insert(key, hits);
		self.entries.run_pending_tasks();
	}

	pub(crate) fn remove_index(&self, index_id: &str) -> usize {
		let keys: Vec<CacheKey> = self
			.entries
			.iter()
			.filter(|(key, _)| key.index_id == index_id)
			.map(|(key, _)| CacheKey::clone(&key))
			.collect();

		for key in &keys {
			self.entries.invalidate(key);
		}

		self.entries.run_pending_tasks();

		keys.len()
	}

	pub(crate) fn clear(&self) -> usize {
		let removed = self.len();

		self.entries.invalidate_all();
		self.entries.run_pending_tasks();

		removed
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.run_pending_tasks();

		self.entries.entry_count() as usize
	}
}
