use std::{sync::Arc, time::Duration};

use hrag_service::{Error, IndexRegistry};
use hrag_testkit::{child, leaf};

use super::{FixedCandidates, FixtureLoader, test_indexes};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_queries_share_one_load() {
	let indexes = test_indexes();

	indexes
		.create_index("shared", &[child("C", None, "text"), leaf("L", "C")])
		.await
		.expect("Failed to create index.");

	let loader = FixtureLoader::with_delay(
		&indexes,
		FixedCandidates::new(&[]),
		Duration::from_millis(100),
	);
	let registry = Arc::new(IndexRegistry::new(loader.clone()));
	let mut tasks = Vec::new();

	for _ in 0..16 {
		let registry = registry.clone();

		tasks.push(tokio::spawn(async move { registry.get_or_load("shared").await }));
	}

	let mut handles = Vec::new();

	for task in tasks {
		handles.push(task.await.expect("Load task panicked.").expect("Load failed."));
	}

	assert_eq!(loader.loads(), 1);
	assert!(handles.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
	assert_eq!(registry.loaded_ids(), vec!["shared".to_string()]);
}

#[tokio::test]
async fn failed_load_is_retried_on_next_use() {
	let indexes = test_indexes();
	let loader = FixtureLoader::new(&indexes, FixedCandidates::new(&[]));
	let registry = IndexRegistry::new(loader.clone());

	assert!(matches!(registry.get_or_load("late").await, Err(Error::NotFound { .. })));
	assert!(registry.loaded_ids().is_empty());

	indexes
		.create_index("late", &[child("C", None, "text")])
		.await
		.expect("Failed to create index.");

	registry.get_or_load("late").await.expect("Load failed.");

	assert_eq!(loader.loads(), 2);
}

#[tokio::test]
async fn invalidate_forces_a_reload() {
	let indexes = test_indexes();

	indexes.create_index("idx", &[child("C", None, "text")]).await.expect("Failed to create index.");

	let loader = FixtureLoader::new(&indexes, FixedCandidates::new(&[]));
	let registry = IndexRegistry::new(loader.clone());
	let first = registry.get_or_load("idx").await.expect("Load failed.");

	assert!(registry.invalidate("idx"));
	assert!(!registry.invalidate("idx"));

	let second = registry.get_or_load("idx").await.expect("Load failed.");

	assert!(!Arc::ptr_eq(&first, &second));
	assert_eq!(loader.loads(), 2);
}
