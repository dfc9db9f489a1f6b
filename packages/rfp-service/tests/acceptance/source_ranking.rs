use std::sync::Arc;

use rfp_domain::{Outcome, SourceTier};
use rfp_service::{DEFAULT_SOURCE_LIMIT, Error, SourceQuery};
use rfp_testkit::{tenant, vector_with_similarity};

use super::{DIM, LeakyIndex, SpyEmbedding, chunk, hit, historical, memory_service, query, service_with};

fn source_query(tenant_id: &str) -> SourceQuery {
	SourceQuery::new(tenant(tenant_id), "Describe your data encryption practices.")
}

#[tokio::test]
async fn historical_documents_rank_as_pinned_candidates() {
	let (service, index, calls) = memory_service();

	index.insert(historical("acme", "rfp-won", Outcome::Won), vector_with_similarity(DIM, 0.7));
	index.insert(historical("acme", "rfp-lost", Outcome::Lost), vector_with_similarity(DIM, 0.8));
	index.insert(
		historical("acme", "rfp-pending", Outcome::Pending),
		vector_with_similarity(DIM, 0.7),
	);
	index.insert(chunk("acme", "kb-a", 0, SourceTier::Support), vector_with_similarity(DIM, 0.99));
	index.insert(historical("globex", "rfp-rival", Outcome::Won), vector_with_similarity(DIM, 0.99));

	let ranked = service.rank_sources(&source_query("acme")).await.expect("Source ranking failed.");
	let order: Vec<&str> = ranked.iter().map(|c| c.document_id.as_str()).collect();

	// Pending at 0.7 edges out lost at 0.8 once outcome is weighed in.
	assert_eq!(order, vec!["rfp-won", "rfp-pending", "rfp-lost"]);
	assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
	assert!(ranked.windows(2).all(|pair| pair[0].composite_score >= pair[1].composite_score));

	let mut q = query("acme");

	q.pinned_source_id = Some(ranked[0].document_id.clone());

	let result = service.retrieve(&q).await.expect("Retrieval failed.");

	assert_eq!(result.counts.pinned, 1);
}

#[tokio::test]
async fn only_won_and_limit_narrow_the_candidates() {
	let (service, index, _) = memory_service();

	for idx in 0..5_u32 {
		index.insert(
			historical("acme", &format!("rfp-won-{idx}"), Outcome::Won),
			vector_with_similarity(DIM, 0.9 - idx as f32 * 0.1),
		);
	}

	index.insert(historical("acme", "rfp-lost", Outcome::Lost), vector_with_similarity(DIM, 0.95));

	let defaults = service.rank_sources(&source_query("acme")).await.expect("Source ranking failed.");

	assert_eq!(defaults.len(), DEFAULT_SOURCE_LIMIT as usize);

	let mut q = source_query("acme");

	q.only_won = true;
	q.limit = 10;

	let won = service.rank_sources(&q).await.expect("Source ranking failed.");

	assert_eq!(won.len(), 5);
	assert!(won.iter().all(|c| c.outcome == Some(Outcome::Won)));

	q.exclude_document_id = Some("rfp-won-0".to_string());

	let excluded = service.rank_sources(&q).await.expect("Source ranking failed.");

	assert_eq!(excluded.len(), 4);
	assert_eq!(excluded[0].document_id, "rfp-won-1");
}

#[tokio::test]
async fn empty_history_and_bad_requests() {
	let (service, _, calls) = memory_service();

	assert!(service.rank_sources(&source_query("acme")).await.expect("Source ranking failed.").is_empty());

	let mut q = source_query("acme");

	q.limit = 0;

	assert!(matches!(service.rank_sources(&q).await, Err(Error::InvalidRequest { .. })));

	let q = SourceQuery::new(tenant("acme"), "  ");

	assert!(matches!(service.rank_sources(&q).await, Err(Error::InvalidRequest { .. })));
	assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn foreign_tenant_sources_are_dropped() {
	let index = LeakyIndex {
		hits: vec![
			hit(historical("globex", "rfp-rival", Outcome::Won), 0.99),
			hit(historical("acme", "rfp-own", Outcome::Won), 0.5),
		],
	};
	let service = service_with(Arc::new(index), Arc::new(SpyEmbedding::new()));
	let ranked = service.rank_sources(&source_query("acme")).await.expect("Source ranking failed.");

	assert_eq!(ranked.len(), 1);
	assert_eq!(ranked[0].document_id, "rfp-own");
}
