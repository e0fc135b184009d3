mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, ProviderConfig, Providers, Qdrant, Search, SearchCache,
	Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.indexes_dir.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "storage.indexes_dir must be non-empty.".to_string(),
		});
	}

	for (label, value) in [
		("storage.docstore_file", &cfg.storage.docstore_file),
		("storage.collection", &cfg.storage.collection),
		("storage.qdrant.url", &cfg.storage.qdrant.url),
		("storage.qdrant.collection_prefix", &cfg.storage.qdrant.collection_prefix),
		("search.cache.file_name", &cfg.search.cache.file_name),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if let Some(rerank) = cfg.providers.rerank.as_ref() {
		if rerank.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: "Provider rerank api_key must be non-empty.".to_string(),
			});
		}
		if rerank.model.trim().is_empty() {
			return Err(Error::Validation {
				message: "Provider rerank model must be non-empty.".to_string(),
			});
		}
	}
	if cfg.search.candidate_k == 0 {
		return Err(Error::Validation {
			message: "search.candidate_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_top_k == 0 {
		return Err(Error::Validation {
			message: "search.default_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_top_k < cfg.search.default_top_k {
		return Err(Error::Validation {
			message: "search.max_top_k must be greater than or equal to search.default_top_k."
				.to_string(),
		});
	}
	if cfg.search.candidate_timeout_ms == 0 || cfg.search.rerank_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search timeouts must be greater than zero.".to_string(),
		});
	}
	if cfg.search.cache.max_ram_entries == 0 {
		return Err(Error::Validation {
			message: "search.cache.max_ram_entries must be greater than zero.".to_string(),
		});
	}
	if !(1..=64).contains(&cfg.search.cache.fingerprint_len) {
		return Err(Error::Validation {
			message: "search.cache.fingerprint_len must be in the range 1-64.".to_string(),
		});
	}
	if cfg.search.cache.file_name.contains(['/', '\\']) {
		return Err(Error::Validation {
			message: "search.cache.file_name must be a bare file name.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.providers
		.rerank
		.as_ref()
		.map(|rerank| rerank.api_base.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.rerank = None;
	}
}
