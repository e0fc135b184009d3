//! Leaf → child → parent climb and the two-level deduplication that follows it.

use std::collections::{HashMap, hash_map::Entry};

use serde::{Deserialize, Serialize};

use crate::{Result, candidates::Candidate};
use hrag_storage::{
	db::NodeStore,
	models::{Node, NodeLookup},
	queries,
};

/// How a result's context node was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
	/// Leaf, child and parent all resolved.
	FullChain,
	/// The child has no parent and serves as its own context.
	Standalone,
	/// The child names a parent the store cannot return; the child stands in.
	ParentUnresolved,
	/// Rebuilt from a cached `(child, parent, score)` triple.
	Cached,
}
impl Provenance {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::FullChain => "full_chain",
			Self::Standalone => "standalone",
			Self::ParentUnresolved => "parent_unresolved",
			Self::Cached => "cached",
		}
	}
}

/// A resolved candidate: the precise child, its context parent and the leaf score it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Climb {
	pub child: Node,
	pub parent: Node,
	pub score: f32,
	pub provenance: Provenance,
}

/// Resolves candidates against one node store. Lookups are memoized for the resolver's lifetime,
/// so one resolver should serve one query.
pub struct HierarchyResolver<'a> {
	store: &'a NodeStore,
	collection: &'a str,
	memo: HashMap<String, Option<Node>>,
}
impl<'a> HierarchyResolver<'a> {
	pub fn new(store: &'a NodeStore, collection: &'a str) -> Self {
		Self { store, collection, memo: HashMap::new() }
	}

	/// Climbs every candidate and deduplicates the survivors at child then parent level.
	pub async fn resolve(&mut self, candidates: &[Candidate]) -> Result<Vec<Climb>> {
		let mut climbs = Vec::with_capacity(candidates.len());

		for candidate in candidates {
			if let Some(climb) = self.climb(candidate).await? {
				climbs.push(climb);
			}
		}

		Ok(dedup_by_parent(dedup_by_child(climbs)))
	}

	pub async fn climb(&mut self, candidate: &Candidate) -> Result<Option<Climb>> {
		let Some(leaf) = self.fetch(&candidate.node_id).await? else {
			tracing::warn!(node_id = %candidate.node_id, "Dropping candidate with unresolvable leaf.");

			return Ok(None);
		};
		let Some(child_id) = leaf.parent_id() else {
			tracing::warn!(node_id = %leaf.id, "Dropping leaf without a parent reference.");

			return Ok(None);
		};
		let Some(child) = self.fetch(child_id).await? else {
			tracing::warn!(
				node_id = %leaf.id,
				child_id = %child_id,
				"Dropping leaf whose child cannot be resolved."
			);

			return Ok(None);
		};
		let (parent, provenance) = match child.parent_id() {
			None => (child.clone(), Provenance::Standalone),
			Some(parent_id) => match self.fetch(parent_id).await? {
				Some(parent) => (parent, Provenance::FullChain),
				None => {
					tracing::warn!(
						child_id = %child.id,
						parent_id = %parent_id,
						"Parent cannot be resolved. Using the child as context."
					);

					(child.clone(), Provenance::ParentUnresolved)
				},
			},
		};

		Ok(Some(Climb { child, parent, score: candidate.score, provenance }))
	}

	async fn fetch(&mut self, id: &str) -> Result<Option<Node>> {
		if let Some(cached) = self.memo.get(id) {
			return Ok(cached.clone());
		}

		let node = match queries::get(self.store, id, self.collection).await? {
			NodeLookup::Found(node) => Some(node),
			NodeLookup::NotFound => {
				tracing::debug!(node_id = %id, "Node not found.");

				None
			},
			NodeLookup::Corrupt { reason } => {
				tracing::warn!(node_id = %id, reason = %reason, "Stored node does not decode.");

				None
			},
		};

		self.memo.insert(id.to_string(), node.clone());

		Ok(node)
	}
}

/// Keeps one climb per child. A later climb replaces an earlier one only with a strictly
/// higher score; the survivor keeps the slot of the first occurrence.
pub fn dedup_by_child(climbs: Vec<Climb>) -> Vec<Climb> {
	dedup_by(climbs, |climb| climb.child.id.clone())
}

/// Same rule as [`dedup_by_child`], keyed by the context parent.
pub fn dedup_by_parent(climbs: Vec<Climb>) -> Vec<Climb> {
	dedup_by(climbs, |climb| climb.parent.id.clone())
}

fn dedup_by<F>(climbs: Vec<Climb>, key: F) -> Vec<Climb>
where
	F: Fn(&Climb) -> String,
{
	let mut slots: HashMap<String, usize> = HashMap::new();
	let mut out: Vec<Climb> = Vec::with_capacity(climbs.len());

	for climb in climbs {
		match slots.entry(key(&climb)) {
			Entry::Occupied(slot) => {
				let existing = &mut out[*slot.get()];

				if climb.score > existing.score {
					*existing = climb;
				}
			},
			Entry::Vacant(slot) => {
				slot.insert(out.len());
				out.push(climb);
			},
		}
	}

	out
}
