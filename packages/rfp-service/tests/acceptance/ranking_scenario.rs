use rfp_domain::{Outcome, SourceTier};
use rfp_service::{assemble_context, assess_availability};
use rfp_testkit::vector_with_similarity;

use super::{DIM, chunk, historical, memory_service, query};

const TOLERANCE: f32 = 1e-4;

#[tokio::test]
async fn won_history_outranks_better_raw_support_match() {
	let (service, index, calls) = memory_service();

	for (doc, sim) in [("kb-a", 0.9_f32), ("kb-b", 0.8), ("kb-c", 0.7)] {
		index.insert(chunk("acme", doc, 0, SourceTier::Support), vector_with_similarity(DIM, sim));
	}

	index.insert(historical("acme", "rfp-won", Outcome::Won), vector_with_similarity(DIM, 0.85));
	index.insert(historical("acme", "rfp-lost", Outcome::Lost), vector_with_similarity(DIM, 0.6));

	let result = service.retrieve(&query("acme")).await.expect("Retrieval failed.");
	let ranked: Vec<(&str, f32)> = result
		.matches
		.iter()
		.map(|scored| (scored.chunk.document_id.as_str(), scored.composite_score))
		.collect();
	let expected = [("rfp-won", 0.76), ("kb-a", 0.69), ("kb-b", 0.63), ("kb-c", 0.57), ("rfp-lost", 0.41)];

	assert_eq!(ranked.len(), expected.len());

	for ((doc, score), (expected_doc, expected_score)) in ranked.iter().zip(expected) {
		assert_eq!(*doc, expected_doc);
		assert!(
			(score - expected_score).abs() < TOLERANCE,
			"{doc} scored {score}, expected {expected_score}."
		);
	}

	assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
	assert_eq!(result.counts.support, 3);
	assert_eq!(result.counts.historical, 2);
	assert_eq!(result.counts.pinned, 0);
	assert_eq!(result.policy_id, service.ranking().policy_id().expect("Policy id."));

	let top = &result.matches[0];

	assert!((top.breakdown.total() - top.composite_score).abs() < f32::EPSILON);
	assert!((top.raw_score - 0.85).abs() < TOLERANCE);

	let availability = assess_availability(&result, service.cfg.retrieval.min_relevance_score);

	assert!(availability.available);
	assert_eq!(availability.relevant_count, 5);
	assert!((availability.mean_score - 0.612).abs() < TOLERANCE);

	let strict = assess_availability(&result, 0.7);

	assert_eq!(strict.relevant_count, 1);

	let context = assemble_context(&result, &service.cfg.context);

	assert!(context.starts_with("KNOWLEDGE BASE\n\nrfp-won chunk 0 text."));
	assert!(!context.contains("PINNED SOURCE"));

	let positions: Vec<usize> = ["rfp-won", "kb-a", "kb-b", "kb-c", "rfp-lost"]
		.iter()
		.map(|doc| context.find(&format!("{doc} chunk 0")).expect("Chunk missing from context."))
		.collect();

	assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn pinned_source_is_labelled_and_rendered_first() {
	let (service, index, _) = memory_service();

	index.insert(historical("acme", "rfp-2023", Outcome::Lost), vector_with_similarity(DIM, 0.3));
	index.insert(chunk("acme", "kb-a", 0, SourceTier::Support), vector_with_similarity(DIM, 0.95));

	let mut q = query("acme");

	q.pinned_source_id = Some("rfp-2023".to_string());

	let result = service.retrieve(&q).await.expect("Retrieval failed.");
	let pinned = result
		.matches
		.iter()
		.find(|scored| scored.chunk.document_id == "rfp-2023")
		.expect("Pinned chunk missing.");

	// The historical search also returns this chunk; the pinned label wins the merge.
	assert_eq!(pinned.tier, SourceTier::Pinned);
	assert_eq!(result.counts.pinned, 1);
	assert_eq!(result.counts.historical, 0);
	assert_eq!(result.matches.len(), 2);

	let context = assemble_context(&result, &service.cfg.context);

	assert!(context.starts_with("PINNED SOURCE\n\nrfp-2023 chunk 0 text.\n\nKNOWLEDGE BASE\n\n"));
}

#[tokio::test]
async fn basic_depth_only_consults_won_history() {
	let (service, index, _) = memory_service();

	index.insert(historical("acme", "rfp-won", Outcome::Won), vector_with_similarity(DIM, 0.5));
	index.insert(historical("acme", "rfp-lost", Outcome::Lost), vector_with_similarity(DIM, 0.9));
	index.insert(historical("acme", "rfp-pending", Outcome::Pending), vector_with_similarity(DIM, 0.9));

	let mut q = query("acme");

	q.depth = rfp_domain::Depth::Basic;

	let result = service.retrieve(&q).await.expect("Retrieval failed.");

	assert_eq!(result.matches.len(), 1);
	assert_eq!(result.matches[0].chunk.outcome, Some(Outcome::Won));

	q.depth = rfp_domain::Depth::Detailed;

	let result = service.retrieve(&q).await.expect("Retrieval failed.");

	assert_eq!(result.counts.historical, 3);
}
