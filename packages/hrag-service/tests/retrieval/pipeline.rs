use std::sync::Arc;

use hrag_service::{Error, Provenance, SearchRequest};
use hrag_testkit::{child, leaf, parent, source_metadata};

use super::{
	FailingCandidates, FixedCandidates, FixtureLoader, RerankScript, ScriptedRerank,
	StalledCandidates, build_service, test_indexes,
};

fn plain(index_id: &str, query: &str) -> SearchRequest {
	SearchRequest { rerank: false, ..SearchRequest::new(index_id, query) }
}

#[tokio::test]
async fn leaves_climb_to_one_child_parent_pair() {
	let indexes = test_indexes();
	let nodes = vec![
		parent("P", "Overview of the grant. Overhead rates are 70% for on-campus research."),
		child("C", Some("P"), "Overhead rates are 70%."),
		leaf("L1", "C"),
		leaf("L2", "C"),
	];

	indexes.create_index("grants", &nodes).await.expect("Failed to create index.");

	let candidates = FixedCandidates::new(&[("L1", 0.95), ("L2", 0.80)]);
	let loader = FixtureLoader::new(&indexes, candidates);
	let service = build_service(indexes.config(), loader, ScriptedRerank::new(RerankScript::Fail));
	let results = service.search(plain("grants", "overhead rate")).await.expect("Search failed.");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].score, 0.95);
	assert_eq!(results[0].precise_content, "Overhead rates are 70%.");
	assert_eq!(
		results[0].context_content,
		"Overview of the grant. Overhead rates are 70% for on-campus research."
	);
	assert_eq!(results[0].node_hierarchy, Provenance::FullChain);
}

#[tokio::test]
async fn standalone_child_is_its_own_context() {
	let indexes = test_indexes();
	let nodes = vec![child("C", None, "A short standalone section."), leaf("L1", "C")];

	indexes.create_index("solo", &nodes).await.expect("Failed to create index.");

	let loader = FixtureLoader::new(&indexes, FixedCandidates::new(&[("L1", 0.7)]));
	let service = build_service(indexes.config(), loader, ScriptedRerank::new(RerankScript::Fail));
	let results = service.search(plain("solo", "section")).await.expect("Search failed.");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].precise_content, results[0].context_content);
	assert_eq!(results[0].node_hierarchy, Provenance::Standalone);
}

#[tokio::test]
async fn dedup_runs_at_child_then_parent_level() {
	let indexes = test_indexes();
	let nodes = vec![
		parent("P", "parent text"),
		child("C1", Some("P"), "first child"),
		child("C2", Some("P"), "second child"),
		child("C3", None, "other section"),
		leaf("La", "C1"),
		leaf("Lb", "C1"),
		leaf("Lc", "C2"),
		leaf("Ld", "C3"),
	];

	indexes.create_index("dedup", &nodes).await.expect("Failed to create index.");

	let candidates =
		FixedCandidates::new(&[("La", 0.5), ("Lc", 0.6), ("Lb", 0.7), ("Ld", 0.3)]);
	let loader = FixtureLoader::new(&indexes, candidates);
	let service = build_service(indexes.config(), loader, ScriptedRerank::new(RerankScript::Fail));
	let results = service.search(plain("dedup", "child")).await.expect("Search failed.");

	assert_eq!(results.len(), 2);
	assert_eq!(results[0].precise_content, "first child");
	assert_eq!(results[0].score, 0.7);
	assert_eq!(results[1].precise_content, "other section");
}

#[tokio::test]
async fn unresolvable_parent_falls_back_to_child() {
	let indexes = test_indexes();
	let nodes = vec![child("C", Some("gone"), "orphaned child"), leaf("L1", "C")];

	indexes.create_index("orphans", &nodes).await.expect("Failed to create index.");

	let loader = FixtureLoader::new(&indexes, FixedCandidates::new(&[("L1", 0.4)]));
	let service = build_service(indexes.config(), loader, ScriptedRerank::new(RerankScript::Fail));
	let results = service.search(plain("orphans", "child")).await.expect("Search failed.");

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].context_content, "orphaned child");
	assert_eq!(results[0].node_hierarchy, Provenance::ParentUnresolved);
}

#[tokio::test]
async fn unresolvable_candidates_yield_empty_results() {
	let indexes = test_indexes();
	let nodes = vec![
		child("C", None, "text"),
		parent("rootless-leaf", "leaf without a parent reference"),
		leaf("dangling", "missing-child"),
	];

	indexes.create_index("broken", &nodes).await.expect("Failed to create index.");

	let candidates =
		FixedCandidates::new(&[("unknown", 0.9), ("rootless-leaf", 0.8), ("dangling", 0.7)]);
	let loader = FixtureLoader::new(&indexes, candidates);
	let service = build_service(indexes.config(), loader, ScriptedRerank::new(RerankScript::Fail));

	assert!(service.search(plain("broken", "q")).await.expect("Search failed.").is_empty());

	let empty_loader = FixtureLoader::new(&indexes, FixedCandidates::new(&[]));
	let empty_service =
		build_service(indexes.config(), empty_loader, ScriptedRerank::new(RerankScript::Fail));

	assert!(empty_service.search(plain("broken", "q")).await.expect("Search failed.").is_empty());
}

fn fallback_fixture() -> Vec<hrag_storage::models::Node> {
	vec![
		child("A", None, "alpha section"),
		child("B", None, "beta section"),
		child("C", None, "gamma section"),
		leaf("La", "A"),
		leaf("Lb", "B"),
		leaf("Lc", "C"),
	]
}

#[tokio::test]
async fn reranker_failures_match_the_no_rerank_ordering() {
	let indexes = test_indexes();

	indexes.create_index("fallback", &fallback_fixture()).await.expect("Failed to create index.");

	let candidates = FixedCandidates::new(&[("La", 0.3), ("Lb", 0.9), ("Lc", 0.6)]);
	let mut cfg = indexes.config();

	cfg.search.rerank_timeout_ms = 50;

	let baseline = build_service(
		cfg.clone(),
		FixtureLoader::new(&indexes, candidates.clone()),
		ScriptedRerank::new(RerankScript::Fail),
	)
	.search(SearchRequest { top_k: Some(2), ..plain("fallback", "section") })
	.await
	.expect("Search failed.");
	let expected: Vec<(String, f32)> =
		baseline.iter().map(|result| (result.precise_content.clone(), result.score)).collect();

	assert_eq!(
		expected,
		vec![("beta section".to_string(), 0.9), ("gamma section".to_string(), 0.6)]
	);

	for script in [RerankScript::Fail, RerankScript::Empty, RerankScript::Stall] {
		let rerank = ScriptedRerank::new(script);
		let mut cfg = cfg.clone();

		cfg.search.cache.enabled = false;

		let service =
			build_service(cfg, FixtureLoader::new(&indexes, candidates.clone()), rerank.clone());
		let results = service
			.search(SearchRequest { top_k: Some(2), ..SearchRequest::new("fallback", "section") })
			.await
			.expect("Search failed.");
		let got: Vec<(String, f32)> =
			results.iter().map(|result| (result.precise_content.clone(), result.score)).collect();

		assert_eq!(rerank.calls(), 1);
		assert_eq!(got, expected);
	}
}

#[tokio::test]
async fn reranker_scores_replace_vector_scores() {
	let indexes = test_indexes();

	indexes.create_index("reranked", &fallback_fixture()).await.expect("Failed to create index.");

	let candidates = FixedCandidates::new(&[("La", 0.3), ("Lb", 0.9), ("Lc", 0.6)]);
	let rerank = ScriptedRerank::new(RerankScript::ByText(vec![
		("alpha", 0.99),
		("gamma", 0.5),
		("beta", 0.1),
	]));
	let service = build_service(
		indexes.config(),
		FixtureLoader::new(&indexes, candidates),
		rerank.clone(),
	);
	let results = service
		.search(SearchRequest { top_k: Some(2), ..SearchRequest::new("reranked", "section") })
		.await
		.expect("Search failed.");
	let got: Vec<(&str, f32)> =
		results.iter().map(|result| (result.precise_content.as_str(), result.score)).collect();

	assert_eq!(got, vec![("alpha section", 0.99), ("gamma section", 0.5)]);

	let docs = rerank.last_docs();

	assert_eq!(docs.len(), 3);
	assert!(
		docs.iter().all(|doc| doc.starts_with("[Document: Unknown document | Section: Root]\n\n"))
	);
}

#[tokio::test]
async fn url_filter_is_slash_insensitive_and_prefix_bound() {
	let indexes = test_indexes();
	let nodes = vec![
		child("About", None, "about the lab")
			.with_metadata(source_metadata("https://lab.example.org/about/x", "about.md")),
		child("Research", None, "research areas")
			.with_metadata(source_metadata("https://lab.example.org/research/y", "research.md")),
		leaf("La", "About"),
		leaf("Lr", "Research"),
	];

	indexes.create_index("site", &nodes).await.expect("Failed to create index.");

	let loader = FixtureLoader::new(&indexes, FixedCandidates::new(&[("Lr", 0.9), ("La", 0.8)]));
	let service = build_service(indexes.config(), loader, ScriptedRerank::new(RerankScript::Fail));

	for filter in ["about", "about/", "/about"] {
		let results = service
			.search(SearchRequest { url_filter: Some(filter.to_string()), ..plain("site", "lab") })
			.await
			.expect("Search failed.");

		assert_eq!(results.len(), 1, "filter {filter:?}");
		assert_eq!(results[0].source_url, "https://lab.example.org/about/x");
		assert_eq!(results[0].title, "about.md");
	}

	let none = service
		.search(SearchRequest { url_filter: Some("/nowhere/".to_string()), ..plain("site", "lab") })
		.await
		.expect("Search failed.");

	assert!(none.is_empty());

	let all = service
		.search(SearchRequest { url_filter: Some("/".to_string()), ..plain("site", "lab") })
		.await
		.expect("Search failed.");

	assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn candidate_source_failures_surface_as_unavailable() {
	let indexes = test_indexes();

	indexes.create_index("down", &fallback_fixture()).await.expect("Failed to create index.");

	let failing = build_service(
		indexes.config(),
		FixtureLoader::new(&indexes, Arc::new(FailingCandidates)),
		ScriptedRerank::new(RerankScript::Fail),
	);
	let err = failing.search(plain("down", "q")).await.expect_err("Search must fail.");

	assert!(matches!(err, Error::ServiceUnavailable { .. }), "{err:?}");

	let mut cfg = indexes.config();

	cfg.search.candidate_timeout_ms = 50;

	let stalled = build_service(
		cfg,
		FixtureLoader::new(&indexes, Arc::new(StalledCandidates)),
		ScriptedRerank::new(RerankScript::Fail),
	);
	let err = stalled.search(plain("down", "q")).await.expect_err("Search must time out.");

	assert!(matches!(err, Error::ServiceUnavailable { .. }), "{err:?}");
}

#[tokio::test]
async fn request_validation_and_top_k_bounds() {
	let indexes = test_indexes();

	indexes.create_index("bounds", &fallback_fixture()).await.expect("Failed to create index.");

	let mut cfg = indexes.config();

	cfg.search.default_top_k = 1;
	cfg.search.max_top_k = 2;

	let service = build_service(
		cfg,
		FixtureLoader::new(&indexes, FixedCandidates::new(&[("La", 0.3), ("Lb", 0.9), ("Lc", 0.6)])),
		ScriptedRerank::new(RerankScript::Fail),
	);

	assert!(matches!(
		service.search(plain("bounds", "   ")).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(
		service.search(SearchRequest { top_k: Some(0), ..plain("bounds", "q") }).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(matches!(service.search(plain("missing", "q")).await, Err(Error::NotFound { .. })));
	assert!(matches!(
		service.search(plain("../bounds", "q")).await,
		Err(Error::InvalidRequest { .. })
	));
	assert_eq!(service.search(plain("bounds", "q")).await.expect("Search failed.").len(), 1);
	assert_eq!(
		service
			.search(SearchRequest { top_k: Some(10), ..plain("bounds", "q") })
			.await
			.expect("Search failed.")
			.len(),
		2
	);
}
