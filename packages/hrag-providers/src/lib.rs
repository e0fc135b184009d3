pub mod embedding;
pub mod rerank;

use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

use hrag_config::{EmbeddingProviderConfig, ProviderConfig};

/// Where and how to reach one model provider.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
	pub api_base: &'a str,
	pub path: &'a str,
	pub api_key: &'a str,
	pub default_headers: &'a Map<String, Value>,
	pub timeout_ms: u64,
}
impl Endpoint<'_> {
	pub fn url(&self) -> String {
		format!("{}/{}", self.api_base.trim_end_matches('/'), self.path.trim_start_matches('/'))
	}

	/// Posts `body` and returns the decoded JSON reply. Non-2xx statuses are errors.
	pub async fn post_json(&self, body: &Value) -> Result<Value> {
		let client = Client::builder().timeout(Duration::from_millis(self.timeout_ms)).build()?;
		let res = client
			.post(self.url())
			.headers(auth_headers(self.api_key, self.default_headers)?)
			.json(body)
			.send()
			.await?;

		Ok(res.error_for_status()?.json().await?)
	}
}
impl<'a> From<&'a EmbeddingProviderConfig> for Endpoint<'a> {
	fn from(cfg: &'a EmbeddingProviderConfig) -> Self {
		Self {
			api_base: &cfg.api_base,
			path: &cfg.path,
			api_key: &cfg.api_key,
			default_headers: &cfg.default_headers,
			timeout_ms: cfg.timeout_ms,
		}
	}
}
impl<'a> From<&'a ProviderConfig> for Endpoint<'a> {
	fn from(cfg: &'a ProviderConfig) -> Self {
		Self {
			api_base: &cfg.api_base,
			path: &cfg.path,
			api_key: &cfg.api_key,
			default_headers: &cfg.default_headers,
			timeout_ms: cfg.timeout_ms,
		}
	}
}

/// Bearer auth plus the configured extra headers. A configured `authorization` header replaces
/// the bearer one.
pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {}", api_key.trim()).parse()?);

	for (name, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(eyre::eyre!("Default header {name:?} must be a string."));
		};

		headers.insert(HeaderName::from_bytes(name.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}
