use std::{
	sync::{Arc, atomic::Ordering},
	time::Duration,
};

use tokio::time::Instant;

use rfp_domain::{Outcome, SourceTier};
use rfp_service::Error;
use rfp_testkit::{MemoryIndex, vector_with_similarity};

use super::{DIM, FailingEmbedding, chunk, historical, memory_service, query, service_with};

fn seed(index: &MemoryIndex) {
	index.insert(historical("acme", "rfp-pinned", Outcome::Won), vector_with_similarity(DIM, 0.7));
	index.insert(historical("acme", "rfp-other", Outcome::Lost), vector_with_similarity(DIM, 0.8));
	index.insert(chunk("acme", "kb-1", 0, SourceTier::Support), vector_with_similarity(DIM, 0.9));
	index.insert(chunk("acme", "kb-2", 0, SourceTier::Support), vector_with_similarity(DIM, 0.6));
}

#[tokio::test]
async fn failed_historical_tier_degrades_instead_of_failing() {
	let (service, index, _) = memory_service();

	seed(&index);
	index.fail_tier(SourceTier::Historical);

	let mut q = query("acme");

	q.pinned_source_id = Some("rfp-pinned".to_string());

	let result = service.retrieve(&q).await.expect("Partial failure must not propagate.");

	assert_eq!(result.degraded, vec![SourceTier::Historical]);
	assert!(result.is_degraded());
	assert_eq!(result.counts.pinned, 1);
	assert_eq!(result.counts.support, 2);
	assert_eq!(result.counts.historical, 0);
	assert!(result.matches.iter().all(|m| m.tier != SourceTier::Historical));
}

#[tokio::test]
async fn every_tier_failing_yields_an_empty_degraded_result() {
	let (service, index, _) = memory_service();

	seed(&index);
	index.fail_when(|_| true);

	let result = service.retrieve(&query("acme")).await.expect("Tier failures are contained.");

	assert!(result.is_empty());
	assert_eq!(result.degraded, vec![SourceTier::Support, SourceTier::Historical]);
}

#[tokio::test]
async fn embedding_failure_is_fatal_and_skips_search() {
	let index = Arc::new(MemoryIndex::new());

	seed(&index);

	let service = service_with(index.clone(), Arc::new(FailingEmbedding));
	let err = service.retrieve(&query("acme")).await.expect_err("Expected embedding failure.");

	assert!(matches!(err, Error::EmbeddingFailure { .. }), "Unexpected error: {err}");
	assert_eq!(index.search_calls(), 0);
}

#[tokio::test]
async fn blank_question_is_rejected_before_embedding() {
	let (service, _, calls) = memory_service();
	let mut q = query("acme");

	q.question = "   ".to_string();

	let err = service.retrieve(&q).await.expect_err("Expected invalid request.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn zero_query_vector_is_rejected() {
	let (service, index, _) = memory_service();
	let err = service
		.retrieve_with_vector(&query("acme"), &vec![0.0; DIM])
		.await
		.expect_err("Zero vectors must not reach the index.");

	assert!(matches!(err, Error::InvalidRequest { .. }), "Unexpected error: {err}");
	assert_eq!(index.search_calls(), 0);
}

#[tokio::test]
async fn deadline_cancels_in_flight_searches() {
	let (service, index, _) = memory_service();

	seed(&index);
	index.set_latency(Duration::from_millis(500));

	let mut q = query("acme");

	q.deadline = Some(Instant::now() + Duration::from_millis(20));

	let started = Instant::now();
	let err = service.retrieve(&q).await.expect_err("Expected deadline error.");

	assert!(matches!(err, Error::DeadlineExceeded), "Unexpected error: {err}");
	assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test]
async fn empty_category_search_falls_back_to_whole_support_tier() {
	let (service, index, _) = memory_service();
	let mut tagged = chunk("acme", "kb-legal", 0, SourceTier::Support);

	tagged.category = Some("legal".to_string());

	index.insert(tagged, vector_with_similarity(DIM, 0.8));

	let mut q = query("acme");

	q.category = Some("pricing".to_string());

	let result = service.retrieve(&q).await.expect("Retrieval failed.");

	assert_eq!(result.counts.support, 1);
	assert_eq!(result.matches[0].chunk.document_id, "kb-legal");

	q.category = Some("legal".to_string());

	let result = service.retrieve(&q).await.expect("Retrieval failed.");

	assert_eq!(result.counts.support, 1);
}

#[tokio::test]
async fn empty_library_is_a_valid_empty_result() {
	let (service, _, _) = memory_service();
	let result = service.retrieve(&query("acme")).await.expect("Retrieval failed.");

	assert!(result.is_empty());
	assert!(!result.is_degraded());
	assert_eq!(result.candidate_count, 0);
}
