use std::{
	fs,
	path::{Path, PathBuf},
	time::Instant,
};

use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use hrag_cli::QueryArgs;
use hrag_config::Config;
use hrag_service::{CacheStats, RetrievalService, SearchRequest, SearchResult};

#[derive(Debug, Parser)]
#[command(
	version = hrag_cli::VERSION,
	rename_all = "kebab",
	styles = hrag_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Run one query and print its results as JSON.
	Search(SearchArgs),
	/// Replay a JSON dataset of queries and report latency and cache statistics.
	Replay(ReplayArgs),
	/// Delete the persisted query cache of one index.
	PurgeCache(PurgeCacheArgs),
}

#[derive(Debug, ClapArgs)]
pub struct SearchArgs {
	#[command(flatten)]
	pub query: QueryArgs,
}

#[derive(Debug, ClapArgs)]
pub struct ReplayArgs {
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	#[arg(long, value_name = "N", default_value_t = 2)]
	pub runs_per_query: u32,
}

#[derive(Debug, ClapArgs)]
pub struct PurgeCacheArgs {
	#[arg(long, short = 'i', value_name = "INDEX")]
	pub index: String,
}

#[derive(Debug, Deserialize)]
struct ReplayDataset {
	name: Option<String>,
	#[serde(default)]
	defaults: ReplayDefaults,
	queries: Vec<ReplayQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct ReplayDefaults {
	index_id: Option<String>,
	#[serde(default)]
	groups: Vec<String>,
	url_filter: Option<String>,
	top_k: Option<u32>,
	rerank: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ReplayQuery {
	id: Option<String>,
	query: String,
	index_id: Option<String>,
	groups: Option<Vec<String>>,
	url_filter: Option<String>,
	top_k: Option<u32>,
	rerank: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ReplayOutput {
	dataset: String,
	query_count: usize,
	runs_per_query: u32,
	summary: ReplaySummary,
	cache: CacheStats,
	queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
struct ReplaySummary {
	cold_latency_ms_mean: f64,
	warm_latency_ms_mean: f64,
	latency_ms_p50: f64,
	latency_ms_p95: f64,
}

#[derive(Debug, Serialize)]
struct QueryReport {
	id: String,
	index_id: String,
	query: String,
	result_count: usize,
	cold_latency_ms: f64,
	warm_latency_ms: Option<f64>,
	/// True when every warm run returned the same results as the cold run.
	stable: bool,
	titles: Vec<String>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = hrag_config::load(&args.config)?;
	let filter = EnvFilter::try_new(cfg.service.log_level.as_str())
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	match args.command {
		Command::Search(search) => run_search(cfg, search).await,
		Command::Replay(replay) => run_replay(cfg, replay).await,
		Command::PurgeCache(purge) => run_purge(cfg, purge).await,
	}
}

async fn run_search(cfg: Config, args: SearchArgs) -> color_eyre::Result<()> {
	let service = RetrievalService::new(cfg)?;
	let QueryArgs { index, query, groups, url_filter, top_k, no_rerank } = args.query;
	let request = SearchRequest { index_id: index, query, groups, url_filter, top_k, rerank: !no_rerank };
	let results = service.search(request).await?;

	println!("{}", serde_json::to_string_pretty(&results)?);

	Ok(())
}

async fn run_purge(cfg: Config, args: PurgeCacheArgs) -> color_eyre::Result<()> {
	let service = RetrievalService::new(cfg)?;
	let removed = service.purge_index_cache(&args.index).await?;

	println!("{}", serde_json::json!({ "index_id": args.index, "removed": removed }));

	Ok(())
}

async fn run_replay(cfg: Config, args: ReplayArgs) -> color_eyre::Result<()> {
	let dataset = load_dataset(&args.dataset)?;
	let service = RetrievalService::new(cfg)?;
	let runs = args.runs_per_query.max(1);
	let mut reports = Vec::with_capacity(dataset.queries.len());
	let mut cold = Vec::with_capacity(dataset.queries.len());
	let mut warm = Vec::new();

	for (index, query) in dataset.queries.iter().enumerate() {
		let request = merge_query(&dataset.defaults, query)?;
		let id = query.id.clone().unwrap_or_else(|| format!("q{}", index + 1));
		let (first, cold_ms) = timed_search(&service, request.clone()).await?;
		let mut warm_ms = Vec::new();
		let mut stable = true;

		for _ in 1..runs {
			let (again, latency_ms) = timed_search(&service, request.clone()).await?;

			stable &= same_results(&first, &again);
			warm_ms.push(latency_ms);
		}

		tracing::info!(
			query_id = %id,
			result_count = first.len(),
			cold_latency_ms = cold_ms,
			stable,
			"Replayed query."
		);
		cold.push(cold_ms);
		warm.extend_from_slice(&warm_ms);
		reports.push(QueryReport {
			id,
			index_id: request.index_id,
			query: request.query,
			result_count: first.len(),
			cold_latency_ms: cold_ms,
			warm_latency_ms: (!warm_ms.is_empty()).then(|| mean(&warm_ms)),
			stable,
			titles: first.iter().map(|result| result.title.clone()).collect(),
		});
	}

	let mut all: Vec<f64> = cold.iter().chain(warm.iter()).copied().collect();

	all.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

	let output = ReplayOutput {
		dataset: dataset.name.clone().unwrap_or_else(|| "replay".to_string()),
		query_count: reports.len(),
		runs_per_query: runs,
		summary: ReplaySummary {
			cold_latency_ms_mean: mean(&cold),
			warm_latency_ms_mean: mean(&warm),
			latency_ms_p50: percentile(&all, 0.50),
			latency_ms_p95: percentile(&all, 0.95),
		},
		cache: service.cache_stats(),
		queries: reports,
	};

	println!("{}", serde_json::to_string_pretty(&output)?);

	Ok(())
}

async fn timed_search(
	service: &RetrievalService,
	request: SearchRequest,
) -> color_eyre::Result<(Vec<SearchResult>, f64)> {
	let start = Instant::now();
	let results = service.search(request).await?;

	Ok((results, start.elapsed().as_secs_f64() * 1_000.0))
}

fn load_dataset(path: &Path) -> color_eyre::Result<ReplayDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: ReplayDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

fn merge_query(defaults: &ReplayDefaults, query: &ReplayQuery) -> color_eyre::Result<SearchRequest> {
	let index_id = query
		.index_id
		.clone()
		.or_else(|| defaults.index_id.clone())
		.ok_or_else(|| eyre::eyre!("Query {:?} has no index_id and no default.", query.query))?;

	Ok(SearchRequest {
		index_id,
		query: query.query.clone(),
		groups: query.groups.clone().unwrap_or_else(|| defaults.groups.clone()),
		url_filter: query.url_filter.clone().or_else(|| defaults.url_filter.clone()),
		top_k: query.top_k.or(defaults.top_k),
		rerank: query.rerank.or(defaults.rerank).unwrap_or(true),
	})
}

fn same_results(a: &[SearchResult], b: &[SearchResult]) -> bool {
	a.len() == b.len()
		&& a.iter().zip(b).all(|(left, right)| {
			left.precise_content == right.precise_content
				&& left.context_content == right.context_content
		})
}

fn mean(values: &[f64]) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	values.iter().sum::<f64>() / values.len() as f64
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;

		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}
