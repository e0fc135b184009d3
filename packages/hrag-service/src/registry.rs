use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	sync::{Arc, Mutex},
};

use tokio::sync::OnceCell;
use walkdir::WalkDir;

use crate::{
	BoxFuture, EmbeddingProvider, Error, Result,
	candidates::{CandidateSource, QdrantCandidateSource},
};
use hrag_config::{Config, EmbeddingProviderConfig};
use hrag_storage::{
	db::{NodeStore, StoreOptions},
	qdrant::QdrantStore,
};

/// Directory under an index holding the original uploaded files.
pub const SOURCE_ARCHIVE_DIR: &str = "source_files_archive";

/// Everything a query needs for one index.
pub struct IndexHandle {
	pub index_id: String,
	pub index_dir: PathBuf,
	pub store: NodeStore,
	pub collection: String,
	pub candidates: Arc<dyn CandidateSource>,
	pub source_archive: SourceArchive,
}

pub trait IndexLoader
where
	Self: Send + Sync,
{
	fn load<'a>(&'a self, index_id: &'a str) -> BoxFuture<'a, Result<IndexHandle>>;
}

/// Loaded index handles keyed by index id.
///
/// Each id owns a `OnceCell`, so concurrent first queries for one index share a single load and a
/// failed load leaves the cell empty for the next caller to retry.
pub struct IndexRegistry {
	loader: Arc<dyn IndexLoader>,
	cells: Mutex<HashMap<String, Arc<OnceCell<Arc<IndexHandle>>>>>,
}
impl IndexRegistry {
	pub fn new(loader: Arc<dyn IndexLoader>) -> Self {
		Self { loader, cells: Mutex::new(HashMap::new()) }
	}

	pub async fn get_or_load(&self, index_id: &str) -> Result<Arc<IndexHandle>> {
		validate_index_id(index_id)?;

		let cell = {
			let mut cells = self.cells.lock().unwrap_or_else(|err| err.into_inner());

			cells.entry(index_id.to_string()).or_default().clone()
		};
		let handle = cell
			.get_or_try_init(|| async {
				tracing::info!(index_id = %index_id, "Loading index.");

				self.loader.load(index_id).await.map(Arc::new)
			})
			.await?;

		Ok(handle.clone())
	}

	/// Forgets the handle so the next query reloads the index. Returns whether one was loaded.
	pub fn invalidate(&self, index_id: &str) -> bool {
		let removed = self.cells.lock().unwrap_or_else(|err| err.into_inner()).remove(index_id);

		removed.is_some_and(|cell| cell.initialized())
	}

	pub fn loaded_ids(&self) -> Vec<String> {
		let cells = self.cells.lock().unwrap_or_else(|err| err.into_inner());
		let mut ids: Vec<String> = cells
			.iter()
			.filter(|(_, cell)| cell.initialized())
			.map(|(id, _)| id.clone())
			.collect();

		ids.sort();

		ids
	}
}

/// Rejects ids that could escape the indexes directory.
pub fn validate_index_id(index_id: &str) -> Result<()> {
	let invalid = index_id.trim().is_empty()
		|| index_id == "."
		|| index_id == ".."
		|| index_id.contains(['/', '\\'])
		|| index_id.chars().any(char::is_control);

	if invalid {
		return Err(Error::InvalidRequest {
			message: format!("Index id {index_id:?} is not a valid directory name."),
		});
	}

	Ok(())
}

/// Loads `<indexes_dir>/<index_id>/<docstore_file>` and a Qdrant candidate source for it.
pub struct StoreIndexLoader {
	indexes_dir: PathBuf,
	docstore_file: String,
	collection: String,
	store_options: StoreOptions,
	qdrant: Arc<QdrantStore>,
	embedding: Arc<dyn EmbeddingProvider>,
	embedding_cfg: EmbeddingProviderConfig,
}
impl StoreIndexLoader {
	pub fn new(cfg: &Config, embedding: Arc<dyn EmbeddingProvider>) -> Result<Self> {
		let qdrant = QdrantStore::new(&cfg.storage.qdrant)?;

		Ok(Self {
			indexes_dir: cfg.storage.indexes_dir.clone(),
			docstore_file: cfg.storage.docstore_file.clone(),
			collection: cfg.storage.collection.clone(),
			store_options: StoreOptions::from_config(&cfg.storage),
			qdrant: Arc::new(qdrant),
			embedding,
			embedding_cfg: cfg.providers.embedding.clone(),
		})
	}

	async fn load_index(&self, index_id: &str) -> Result<IndexHandle> {
		let index_dir = self.indexes_dir.join(index_id);

		if !index_dir.is_dir() {
			return Err(Error::NotFound { message: format!("Index {index_id:?} does not exist.") });
		}

		let store =
			NodeStore::open(&index_dir.join(&self.docstore_file), &self.store_options).await?;
		let candidates = QdrantCandidateSource::new(
			self.qdrant.clone(),
			index_id,
			self.embedding.clone(),
			self.embedding_cfg.clone(),
		);
		let source_archive = SourceArchive::load(&index_dir).await;

		Ok(IndexHandle {
			index_id: index_id.to_string(),
			index_dir,
			store,
			collection: self.collection.clone(),
			candidates: Arc::new(candidates),
			source_archive,
		})
	}
}
impl IndexLoader for StoreIndexLoader {
	fn load<'a>(&'a self, index_id: &'a str) -> BoxFuture<'a, Result<IndexHandle>> {
		Box::pin(self.load_index(index_id))
	}
}

/// File names under an index's source archive, keyed by file stem.
#[derive(Debug, Clone, Default)]
pub struct SourceArchive {
	by_stem: HashMap<String, String>,
}
impl SourceArchive {
	/// Scans `<index_dir>/source_files_archive` recursively. A missing archive is empty.
	pub async fn load(index_dir: &Path) -> Self {
		let root = index_dir.join(SOURCE_ARCHIVE_DIR);

		match tokio::task::spawn_blocking(move || Self::scan(&root)).await {
			Ok(archive) => archive,
			Err(err) => {
				tracing::warn!(error = %err, "Source archive scan task failed.");

				Self::default()
			},
		}
	}

	/// Walks `root` in file-name order. The first file seen for a stem wins. Unreadable entries
	/// are skipped with a warning.
	pub fn scan(root: &Path) -> Self {
		let mut by_stem = HashMap::new();

		if !root.is_dir() {
			return Self { by_stem };
		}

		for entry in WalkDir::new(root).sort_by_file_name() {
			let entry = match entry {
				Ok(entry) => entry,
				Err(err) => {
					tracing::warn!(
						error = %err,
						path = ?err.path(),
						"Skipping unreadable source archive entry."
					);

					continue;
				},
			};

			if !entry.file_type().is_file() {
				continue;
			}

			let path = entry.path();
			let (Some(stem), Some(name)) = (path.file_stem(), path.file_name()) else {
				continue;
			};

			by_stem
				.entry(stem.to_string_lossy().into_owned())
				.or_insert_with(|| name.to_string_lossy().into_owned());
		}

		Self { by_stem }
	}

	/// Archived file whose stem matches the stem of `file_name`.
	pub fn lookup(&self, file_name: &str) -> Option<&str> {
		let stem = Path::new(file_name).file_stem()?.to_string_lossy();

		self.by_stem.get(&*stem).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.by_stem.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_stem.is_empty()
	}
}
