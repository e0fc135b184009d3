use std::{sync::Arc, time::Duration};

use hrag_service::{Error, SearchRequest};
use hrag_testkit::{child, leaf};

use super::{FixedCandidates, FixtureLoader, RerankScript, ScriptedRerank, build_service, test_indexes};

#[tokio::test]
async fn invalidate_index_drops_handle_and_cache() {
	let indexes = test_indexes();

	indexes
		.create_index("docs", &[child("C", None, "text"), leaf("L", "C")])
		.await
		.expect("Failed to create index.");

	let candidates = FixedCandidates::new(&[("L", 0.5)]);
	let loader = FixtureLoader::new(&indexes, candidates.clone());
	let service =
		build_service(indexes.config(), loader.clone(), ScriptedRerank::new(RerankScript::Fail));

	service.search(SearchRequest::new("docs", "text")).await.expect("Search failed.");

	assert!(indexes.index_dir("docs").join("cache.json").exists());
	assert!(service.invalidate_index("docs").await.expect("Invalidate failed."));
	assert!(!indexes.index_dir("docs").join("cache.json").exists());

	service.search(SearchRequest::new("docs", "text")).await.expect("Search failed.");

	assert_eq!(loader.loads(), 2);
	assert_eq!(candidates.calls(), 2);
}

#[tokio::test]
async fn search_straddling_an_invalidate_does_not_recache() {
	let indexes = test_indexes();

	indexes
		.create_index("docs", &[child("C", None, "text"), leaf("L", "C")])
		.await
		.expect("Failed to create index.");

	let service = Arc::new(build_service(
		indexes.config(),
		FixtureLoader::new(&indexes, FixedCandidates::new(&[("L", 0.5)])),
		ScriptedRerank::new(RerankScript::Slow(Duration::from_millis(300))),
	));
	let in_flight = {
		let service = service.clone();

		tokio::spawn(async move { service.search(SearchRequest::new("docs", "text")).await })
	};

	tokio::time::sleep(Duration::from_millis(100)).await;
	service.invalidate_index("docs").await.expect("Invalidate failed.");

	let results = in_flight.await.expect("Search task panicked.").expect("Search failed.");

	assert_eq!(results.len(), 1);
	assert!(!indexes.index_dir("docs").join("cache.json").exists());
	assert_eq!(service.cache_stats().ram_entries, 0);
	assert_eq!(service.cache_stats().writes, 0);

	service.search(SearchRequest::new("docs", "text")).await.expect("Search failed.");

	assert!(indexes.index_dir("docs").join("cache.json").exists());
	assert_eq!(service.cache_stats().ram_entries, 1);
}

#[tokio::test]
async fn stats_reset_and_ram_clear() {
	let indexes = test_indexes();

	indexes
		.create_index("docs", &[child("C", None, "text"), leaf("L", "C")])
		.await
		.expect("Failed to create index.");

	let service = build_service(
		indexes.config(),
		FixtureLoader::new(&indexes, FixedCandidates::new(&[("L", 0.5)])),
		ScriptedRerank::new(RerankScript::Fail),
	);

	service.search(SearchRequest::new("docs", "text")).await.expect("Search failed.");
	service.search(SearchRequest::new("docs", "text")).await.expect("Search failed.");

	let stats = service.cache_stats();

	assert_eq!((stats.misses, stats.ram_hits, stats.writes), (1, 1, 1));
	assert_eq!(stats.hit_rate_percentage, 50.0);
	assert_eq!(service.clear_ram_cache(), 1);

	service.reset_cache_stats();

	assert_eq!(service.cache_stats().total_requests, 0);

	service.search(SearchRequest::new("docs", "text")).await.expect("Search failed.");

	assert_eq!(service.cache_stats().disk_hits, 1);
}

#[tokio::test]
async fn purge_rejects_path_like_ids() {
	let indexes = test_indexes();
	let service = build_service(
		indexes.config(),
		FixtureLoader::new(&indexes, FixedCandidates::new(&[])),
		ScriptedRerank::new(RerankScript::Fail),
	);

	assert!(matches!(
		service.purge_index_cache("../etc").await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(!service.purge_index_cache("never-cached").await.expect("Purge failed."));
}
