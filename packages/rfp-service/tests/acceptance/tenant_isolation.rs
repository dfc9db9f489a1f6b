use std::sync::Arc;

use rfp_domain::{Depth, Outcome, SourceTier};
use rfp_testkit::vector_with_similarity;

use super::{DIM, LeakyIndex, SpyEmbedding, chunk, hit, historical, memory_service, query, service_with};

#[tokio::test]
async fn overlapping_tenants_never_see_each_other() {
	let (service, index, _) = memory_service();

	// Both tenants hold the same document ids, texts and vectors.
	for tenant_id in ["acme", "globex"] {
		for (idx, sim) in [0.95_f32, 0.8, 0.6, 0.4].into_iter().enumerate() {
			let mut support = chunk(tenant_id, &format!("kb-{idx}"), 0, SourceTier::Support);

			support.category = Some(if idx % 2 == 0 { "security" } else { "general" }.to_string());
			support.text = "Data is encrypted at rest with AES-256.".to_string();

			index.insert(support, vector_with_similarity(DIM, sim));
		}

		index.insert(historical(tenant_id, "rfp-won", Outcome::Won), vector_with_similarity(DIM, 0.9));
		index.insert(historical(tenant_id, "rfp-lost", Outcome::Lost), vector_with_similarity(DIM, 0.7));
	}

	let categories = [None, Some("security"), Some("pricing"), Some("general")];
	let pinned_sources = [None, Some("rfp-won"), Some("kb-1"), Some("missing")];

	for tenant_id in ["acme", "globex"] {
		for category in categories {
			for pinned in pinned_sources {
				for depth in [Depth::Basic, Depth::Detailed] {
					for budget in [1_u32, 3, 15] {
						let mut q = query(tenant_id);

						q.category = category.map(str::to_string);
						q.pinned_source_id = pinned.map(str::to_string);
						q.depth = depth;
						q.budget = Some(budget);

						let result = service.retrieve(&q).await.expect("Retrieval failed.");

						assert!(!result.is_empty());
						assert!(result.matches.len() <= budget as usize);
						assert_eq!(result.isolation_drops, 0);
						assert!(
							result.matches.iter().all(|m| m.chunk.tenant_id.as_str() == tenant_id),
							"Tenant {tenant_id} received foreign chunks for {q:?}."
						);
					}
				}
			}
		}
	}
}

#[tokio::test]
async fn foreign_matches_from_a_leaky_backend_are_dropped() {
	let index = LeakyIndex {
		hits: vec![
			hit(chunk("acme", "kb-1", 0, SourceTier::Support), 0.9),
			hit(chunk("globex", "kb-secret", 0, SourceTier::Support), 0.99),
		],
	};
	let service = service_with(Arc::new(index), Arc::new(SpyEmbedding::new()));
	let result = service.retrieve(&query("acme")).await.expect("Retrieval failed.");

	assert_eq!(result.matches.len(), 1);
	assert_eq!(result.matches[0].chunk.document_id, "kb-1");
	assert!(result.matches.iter().all(|m| m.chunk.tenant_id.as_str() == "acme"));
	// The leaky index answers both stored-tier searches with the foreign hit.
	assert_eq!(result.isolation_drops, 2);
}

#[tokio::test]
async fn pinned_lookup_stays_inside_the_tenant() {
	let (service, index, _) = memory_service();

	index.insert(historical("globex", "rfp-2024", Outcome::Won), vector_with_similarity(DIM, 0.99));
	index.insert(historical("acme", "rfp-2023", Outcome::Won), vector_with_similarity(DIM, 0.5));

	let mut q = query("acme");

	q.pinned_source_id = Some("rfp-2024".to_string());

	let result = service.retrieve(&q).await.expect("Retrieval failed.");

	assert_eq!(result.counts.pinned, 0);
	assert!(result.matches.iter().all(|m| m.chunk.document_id != "rfp-2024"));
}
