//! Two-tier query result cache.
//!
//! The RAM tier is an LRU shared by every index. The persistent tier is one JSON document per
//! index at `<indexes_dir>/<index_id>/<file_name>`, rewritten through a temp file and a rename
//! under that index's lock. Entries hold only `(child, parent, score)` triples; the nodes
//! themselves are re-read from the store on every hit.
//!
//! Every index carries a generation that `purge` bumps. A key remembers the generation it was
//! derived under, and `set` drops writes whose generation is no longer current, so a search that
//! straddles a purge cannot write pre-purge results back.

pub mod key;

mod disk;
mod ram;

use std::{
	collections::HashMap,
	path::PathBuf,
	sync::{
		Arc, Mutex,
		atomic::{AtomicU64, Ordering},
	},
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, admin::CacheStats};
use disk::Snapshot;
use hrag_config::Config;
use key::cache_key_prefix;
use ram::RamTier;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
	pub index_id: String,
	pub fingerprint: String,
	/// Purge generation of the index when the key was derived.
	pub generation: u64,
}

/// One cached result, stored on disk as `[child_id, parent_id, score]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CachedTriple", into = "CachedTriple")]
pub struct CachedHit {
	pub child_id: String,
	pub parent_id: String,
	pub score: f32,
}
impl CachedHit {
	pub fn new(child_id: impl Into<String>, parent_id: impl Into<String>, score: f32) -> Self {
		Self { child_id: child_id.into(), parent_id: parent_id.into(), score }
	}
}
impl From<CachedTriple> for CachedHit {
	fn from((child_id, parent_id, score): CachedTriple) -> Self {
		Self { child_id, parent_id, score }
	}
}
impl From<CachedHit> for CachedTriple {
	fn from(hit: CachedHit) -> Self {
		(hit.child_id, hit.parent_id, hit.score)
	}
}

type CachedTriple = (String, String, f32);

#[derive(Default)]
struct IndexSlot {
	write: tokio::sync::Mutex<()>,
	generation: AtomicU64,
}

#[derive(Default)]
struct Counters {
	ram_hits: AtomicU64,
	disk_hits: AtomicU64,
	misses: AtomicU64,
	writes: AtomicU64,
}

pub struct QueryCache {
	enabled: bool,
	fingerprint_len: usize,
	file_name: String,
	indexes_dir: PathBuf,
	ram: RamTier,
	slots: Mutex<HashMap<String, Arc<IndexSlot>>>,
	counters: Counters,
}
impl QueryCache {
	pub fn new(cfg: &Config) -> Self {
		let cache_cfg = &cfg.search.cache;

		Self {
			enabled: cache_cfg.enabled,
			fingerprint_len: cache_cfg.fingerprint_len,
			file_name: cache_cfg.file_name.clone(),
			indexes_dir: cfg.storage.indexes_dir.clone(),
			ram: RamTier::new(cache_cfg.max_ram_entries),
			slots: Mutex::new(HashMap::new()),
			counters: Counters::default(),
		}
	}

	pub fn enabled(&self) -> bool {
		self.enabled
	}

	pub fn key(
		&self,
		index_id: &str,
		query: &str,
		groups: &[String],
		url_filter: Option<&str>,
	) -> CacheKey {
		CacheKey {
			index_id: index_id.to_string(),
			fingerprint: key::fingerprint(
				index_id,
				query,
				groups,
				url_filter,
				self.fingerprint_len,
			),
			generation: self.slot(index_id).generation.load(Ordering::Acquire),
		}
	}

	/// RAM first, then the index's cache file. A disk hit is copied into RAM.
	pub async fn get(&self, key: &CacheKey) -> Option<Vec<CachedHit>> {
		self.get_at_least(key, 0).await
	}

	/// Like `get`, but an entry holding fewer than `min_hits` results counts as a miss.
	pub async fn get_at_least(&self, key: &CacheKey, min_hits: usize) -> Option<Vec<CachedHit>> {
		if !self.enabled {
			return None;
		}

		if let Some(hits) = self.ram.get(key) {
			if hits.len() < min_hits {
				return self.short_entry(key, hits.len(), min_hits);
			}

			self.counters.ram_hits.fetch_add(1, Ordering::Relaxed);
			tracing::debug!(
				index_id = %key.index_id,
				cache_key_prefix = cache_key_prefix(&key.fingerprint),
				hit = true,
				tier = "ram",
				"Query cache lookup."
			);

			return Some(hits);
		}

		let path = self.path_for(&key.index_id);
		let document = match disk::read(&path).await {
			Ok(Snapshot::Loaded(document)) => Some(document),
			Ok(Snapshot::Missing) => None,
			Ok(Snapshot::Corrupt { reason }) => {
				tracing::warn!(
					index_id = %key.index_id,
					path = %path.display(),
					reason = %reason,
					"Cache file is corrupt. Treating as a miss."
				);

				None
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					index_id = %key.index_id,
					"Cache read failed."
				);

				None
			},
		};
		let hits = document.and_then(|mut document| document.remove(&key.fingerprint));

		match hits {
			Some(hits) if hits.len() < min_hits => {
				self.ram.insert(key.clone(), hits.clone());

				self.short_entry(key, hits.len(), min_hits)
			},
			Some(hits) => {
				self.counters.disk_hits.fetch_add(1, Ordering::Relaxed);
				self.ram.insert(key.clone(), hits.clone());
				tracing::debug!(
					index_id = %key.index_id,
					cache_key_prefix = cache_key_prefix(&key.fingerprint),
					hit = true,
					tier = "disk",
					"Query cache lookup."
				);

				Some(hits)
			},
			None => {
				self.counters.misses.fetch_add(1, Ordering::Relaxed);
				tracing::debug!(
					index_id = %key.index_id,
					cache_key_prefix = cache_key_prefix(&key.fingerprint),
					hit = false,
					"Query cache lookup."
				);

				None
			},
		}
	}

	/// Stores `hits` in both tiers with scores rounded to two decimals. Failures are logged and
	/// swallowed. Writes for a key derived before the index's last purge are dropped.
	pub async fn set(&self, key: &CacheKey, hits: &[CachedHit]) {
		if !self.enabled {
			return;
		}

		let rounded: Vec<CachedHit> = hits
			.iter()
			.map(|hit| CachedHit { score: round_score(hit.score), ..hit.clone() })
			.collect();
		let slot = self.slot(&key.index_id);
		let _guard = slot.write.lock().await;
		let current = slot.generation.load(Ordering::Acquire);

		if current != key.generation {
			tracing::debug!(
				index_id = %key.index_id,
				cache_key_prefix = cache_key_prefix(&key.fingerprint),
				key_generation = key.generation,
				current_generation = current,
				"Cache write skipped. Index was purged after the key was derived."
			);

			return;
		}

		self.ram.insert(key.clone(), rounded.clone());

		match self.persist(key, rounded).await {
			Ok(()) => {
				self.counters.writes.fetch_add(1, Ordering::Relaxed);
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					index_id = %key.index_id,
					cache_key_prefix = cache_key_prefix(&key.fingerprint),
					"Cache write failed."
				);
			},
		}
	}

	/// Deletes the index's cache file and drops its RAM entries. Returns whether a file existed.
	pub async fn purge(&self, index_id: &str) -> Result<bool> {
		let slot = self.slot(index_id);
		let _guard = slot.write.lock().await;

		slot.generation.fetch_add(1, Ordering::AcqRel);

		let path = self.path_for(index_id);
		let removed = disk::remove(&path).await.map_err(|err| Error::Storage {
			message: format!("Failed to remove cache file {}: {err}", path.display()),
		})?;
		let dropped = self.ram.remove_index(index_id);

		tracing::info!(index_id = %index_id, removed, ram_entries_dropped = dropped, "Cache purged.");

		Ok(removed)
	}

	pub fn stats(&self) -> CacheStats {
		CacheStats::from_counts(
			self.counters.ram_hits.load(Ordering::Relaxed),
			self.counters.disk_hits.load(Ordering::Relaxed),
			self.counters.misses.load(Ordering::Relaxed),
			self.counters.writes.load(Ordering::Relaxed),
			self.ram.len(),
		)
	}

	pub fn reset_stats(&self) {
		self.counters.ram_hits.store(0, Ordering::Relaxed);
		self.counters.disk_hits.store(0, Ordering::Relaxed);
		self.counters.misses.store(0, Ordering::Relaxed);
		self.counters.writes.store(0, Ordering::Relaxed);
	}

	pub fn clear_ram(&self) -> usize {
		self.ram.clear()
	}

	/// Read-modify-write of the index's cache file. The caller holds the index's write lock.
	async fn persist(&self, key: &CacheKey, hits: Vec<CachedHit>) -> std::io::Result<()> {
		let path = self.path_for(&key.index_id);
		let snapshot = disk::read(&path).await?;

		if let Snapshot::Corrupt { reason } = &snapshot {
			tracing::warn!(
				index_id = %key.index_id,
				reason = %reason,
				"Replacing corrupt cache file."
			);
		}

		let mut document = snapshot.into_document();

		document.insert(key.fingerprint.clone(), hits);

		disk::write_atomic(&path, &document).await
	}

	fn path_for(&self, index_id: &str) -> PathBuf {
		disk::cache_path(&self.indexes_dir, index_id, &self.file_name)
	}

	fn short_entry(&self, key: &CacheKey, cached: usize, wanted: usize) -> Option<Vec<CachedHit>> {
		self.counters.misses.fetch_add(1, Ordering::Relaxed);
		tracing::debug!(
			index_id = %key.index_id,
			cache_key_prefix = cache_key_prefix(&key.fingerprint),
			cached,
			wanted,
			"Cached entry is shorter than requested. Treating as a miss."
		);

		None
	}

	fn slot(&self, index_id: &str) -> Arc<IndexSlot> {
		let mut slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());

		slots.entry(index_id.to_string()).or_default().clone()
	}
}

pub fn round_score(score: f32) -> f32 {
	(score * 100.0).round() / 100.0
}
