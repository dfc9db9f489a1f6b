use std::sync::atomic::Ordering;

use rfp_domain::{Outcome, SourceTier, point_id_for};
use rfp_service::{DocumentInput, EMBEDDING_BATCH_SIZE, Error};
use rfp_testkit::{tenant, vector_with_similarity};

use super::{DIM, chunk, memory_service, query};

fn document(tenant_id: &str, document_id: &str, chunk_count: usize) -> DocumentInput {
	DocumentInput {
		tenant_id: tenant(tenant_id),
		document_id: document_id.to_string(),
		tier: SourceTier::Historical,
		category: Some("security".to_string()),
		outcome: Some(Outcome::Won),
		recency_at: None,
		quality_score: Some(80.0),
		chunks: (0..chunk_count).map(|idx| format!("{document_id} section {idx}.")).collect(),
	}
}

#[tokio::test]
async fn large_documents_are_embedded_in_batches() {
	let (service, index, calls) = memory_service();
	let report =
		service.index_document(document("acme", "rfp-2024", 250)).await.expect("Ingestion failed.");

	assert_eq!(EMBEDDING_BATCH_SIZE, 100);
	assert_eq!(report.indexed, 250);
	assert_eq!(report.batches, 3);
	assert_eq!(calls.load(Ordering::SeqCst), 3);
	assert_eq!(index.len(), 250);

	let record = index
		.records()
		.into_iter()
		.find(|record| record.chunk.chunk_index == 249)
		.expect("Last chunk missing.");

	assert_eq!(record.chunk.chunk_count, 250);
	assert_eq!(record.point_id, point_id_for(&tenant("acme"), "rfp-2024", 249));
}

#[tokio::test]
async fn reingesting_a_document_replaces_its_chunks() {
	let (service, index, _) = memory_service();

	service.index_document(document("acme", "rfp-2024", 5)).await.expect("Ingestion failed.");
	service.index_document(document("acme", "rfp-2024", 2)).await.expect("Ingestion failed.");

	let records = index.records();

	assert_eq!(records.len(), 2);
	assert!(records.iter().all(|record| record.chunk.chunk_count == 2));
}

#[tokio::test]
async fn indexed_documents_are_retrievable() {
	let (service, _, _) = memory_service();

	service.index_document(document("acme", "rfp-2024", 3)).await.expect("Ingestion failed.");

	let result = service.retrieve(&query("acme")).await.expect("Retrieval failed.");

	assert_eq!(result.counts.historical, 3);
	assert!(result.matches.iter().all(|m| m.chunk.quality_score == Some(80.0)));

	let other = service.retrieve(&query("globex")).await.expect("Retrieval failed.");

	assert!(other.is_empty());
}

#[tokio::test]
async fn one_invalid_chunk_rejects_the_whole_batch() {
	let (service, index, calls) = memory_service();
	let mut bad = chunk("acme", "kb-1", 2, SourceTier::Support);

	bad.text = "   ".to_string();

	let chunks = vec![
		chunk("acme", "kb-1", 0, SourceTier::Support),
		chunk("acme", "kb-1", 1, SourceTier::Support),
		bad,
	];
	let err = service.index_chunks(&chunks).await.expect_err("Expected validation failure.");

	assert!(matches!(err, Error::InvalidRequest { .. }), "Unexpected error: {err}");
	assert!(index.is_empty());
	assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn duplicate_chunks_and_pinned_tier_are_rejected() {
	let (service, index, _) = memory_service();
	let duplicate = vec![
		chunk("acme", "kb-1", 0, SourceTier::Support),
		chunk("acme", "kb-1", 0, SourceTier::Support),
	];

	assert!(matches!(
		service.index_chunks(&duplicate).await,
		Err(Error::InvalidRequest { .. })
	));

	let mut pinned = document("acme", "rfp-2024", 1);

	pinned.tier = SourceTier::Pinned;

	assert!(matches!(service.index_document(pinned).await, Err(Error::InvalidRequest { .. })));
	assert!(matches!(
		service.index_document(document("acme", "rfp-empty", 0)).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(index.is_empty());
}

#[tokio::test]
async fn delete_is_scoped_to_one_tenant() {
	let (service, index, _) = memory_service();

	for tenant_id in ["acme", "globex"] {
		index.insert(chunk(tenant_id, "rfp-1", 0, SourceTier::Support), vector_with_similarity(DIM, 0.9));
		index.insert(chunk(tenant_id, "rfp-2", 0, SourceTier::Support), vector_with_similarity(DIM, 0.9));
	}

	service.delete_document(&tenant("acme"), "rfp-1").await.expect("Delete failed.");

	let remaining: Vec<(String, String)> = index
		.records()
		.into_iter()
		.map(|record| (record.chunk.tenant_id.as_str().to_string(), record.chunk.document_id))
		.collect();

	assert_eq!(remaining.len(), 3);
	assert!(remaining.contains(&("globex".to_string(), "rfp-1".to_string())));
	assert!(!remaining.contains(&("acme".to_string(), "rfp-1".to_string())));
	assert!(matches!(
		service.delete_document(&tenant("acme"), " ").await,
		Err(Error::InvalidRequest { .. })
	));
}

#[tokio::test]
async fn purging_a_tenant_leaves_other_tenants_untouched() {
	let (service, index, _) = memory_service();

	for tenant_id in ["acme", "globex"] {
		index.insert(chunk(tenant_id, "kb-1", 0, SourceTier::Support), vector_with_similarity(DIM, 0.9));
		index.insert(chunk(tenant_id, "rfp-1", 0, SourceTier::Historical), vector_with_similarity(DIM, 0.8));
	}

	service.delete_tenant(&tenant("acme")).await.expect("Tenant purge failed.");

	let records = index.records();

	assert_eq!(records.len(), 2);
	assert!(records.iter().all(|record| record.chunk.tenant_id.as_str() == "globex"));
	assert!(service.retrieve(&query("acme")).await.expect("Retrieval failed.").is_empty());
	assert_eq!(
		service.retrieve(&query("globex")).await.expect("Retrieval failed.").matches.len(),
		2
	);
}
