use std::{
	collections::BTreeMap,
	io::{self, ErrorKind},
	path::{Path, PathBuf},
};

use crate::cache::CachedHit;

/// Per-index cache document: fingerprint → ordered hits.
pub(crate) type CacheDocument = BTreeMap<String, Vec<CachedHit>>;

pub(crate) enum Snapshot {
	Missing,
	Corrupt { reason: String },
	Loaded(CacheDocument),
}
impl Snapshot {
	pub(crate) fn into_document(self) -> CacheDocument {
		match self {
			Self::Loaded(document) => document,
			Self::Missing | Self::Corrupt { .. } => CacheDocument::new(),
		}
	}
}

pub(crate) fn cache_path(indexes_dir: &Path, index_id: &str, file_name: &str) -> PathBuf {
	indexes_dir.join(index_id).join(file_name)
}

pub(crate) async fn read(path: &Path) -> io::Result<Snapshot> {
	let raw = match tokio::fs::read(path).await {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Snapshot::Missing),
		Err(err) => return Err(err),
	};

	Ok(match serde_json::from_slice(&raw) {
		Ok(document) => Snapshot::Loaded(document),
		Err(err) => Snapshot::Corrupt { reason: err.to_string() },
	})
}

/// Replaces the document atomically: readers observe the old file or the new one, never a mix.
pub(crate) async fn write_atomic(path: &Path, document: &CacheDocument) -> io::Result<()> {
	let encoded = serde_json::to_vec(document)?;
	let tmp = tmp_path(path);

	tokio::fs::write(&tmp, encoded).await?;

	if let Err(err) = tokio::fs::rename(&tmp, path).await {
		let _ = tokio::fs::remove_file(&tmp).await;

		return Err(err);
	}

	Ok(())
}

pub(crate) async fn remove(path: &Path) -> io::Result<bool> {
	match tokio::fs::remove_file(path).await {
		Ok(()) => Ok(true),
		Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
		Err(err) => Err(err),
	}
}

fn tmp_path(path: &Path) -> PathBuf {
	let mut raw = path.as_os_str().to_owned();

	raw.push(".tmp");

	PathBuf::from(raw)
}
