use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::{
	Error, Result, RfpService,
	retrieval::{RankingPolicy, ScoreBreakdown, cmp_f32_desc, with_deadline},
};
use rfp_domain::{Outcome, SearchFilter, SourceTier, TenantId, VectorMatch};
use rfp_storage::MAX_TOP_K;

pub const DEFAULT_SOURCE_LIMIT: u32 = 3;
/// Best-matching chunks per document averaged into its similarity.
pub const CHUNKS_PER_SOURCE: usize = 3;

/// Asks which past documents best suit being pinned for a new question.
#[derive(Clone, Debug)]
pub struct SourceQuery {
	pub tenant_id: TenantId,
	pub question: String,
	pub only_won: bool,
	/// The document being answered, never offered as its own source.
	pub exclude_document_id: Option<String>,
	pub limit: u32,
	pub deadline: Option<Instant>,
}
impl SourceQuery {
	pub fn new(tenant_id: TenantId, question: impl Into<String>) -> Self {
		Self {
			tenant_id,
			question: question.into(),
			only_won: false,
			exclude_document_id: None,
			limit: DEFAULT_SOURCE_LIMIT,
			deadline: None,
		}
	}
}

/// One historical document scored as a whole.
#[derive(Clone, Debug, Serialize)]
pub struct SourceCandidate {
	pub document_id: String,
	pub composite_score: f32,
	pub breakdown: ScoreBreakdown,
	/// Mean raw score of the document's best chunks.
	pub similarity: f32,
	pub matched_chunks: usize,
	pub outcome: Option<Outcome>,
	#[serde(with = "rfp_domain::time_serde")]
	pub recency_at: Option<OffsetDateTime>,
	pub quality_score: Option<f32>,
}

impl RfpService {
	/// Ranks the tenant's historical documents as pinned-source candidates.
	pub async fn rank_sources(&self, query: &SourceQuery) -> Result<Vec<SourceCandidate>> {
		if query.question.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "question must be non-empty.".to_string() });
		}
		if query.limit == 0 {
			return Err(Error::InvalidRequest {
				message: "limit must be greater than zero.".to_string(),
			});
		}

		with_deadline(query.deadline, async {
			let vectors = self.embed_texts(std::slice::from_ref(&query.question)).await?;
			let Some(vector) = vectors.into_iter().next() else {
				return Err(Error::EmbeddingFailure {
					message: "Embedding provider returned no vectors.".to_string(),
				});
			};
			let mut filter = SearchFilter::for_tenant(query.tenant_id.clone())
				.with_tier(SourceTier::Historical);

			if query.only_won {
				filter = filter.with_outcome(Outcome::Won);
			}

			// Documents are scored from their chunks, so read as wide a window as the index allows.
			let hits = self.index.search(&vector, &filter, MAX_TOP_K).await?;
			let hits: Vec<VectorMatch> = hits
				.into_iter()
				.filter(|hit| {
					if hit.chunk.tenant_id == query.tenant_id {
						return true;
					}

					tracing::error!(
						tenant_id = %query.tenant_id,
						found_tenant_id = %hit.chunk.tenant_id,
						document_id = %hit.chunk.document_id,
						"Tenant isolation violation. Dropping source candidate."
					);

					false
				})
				.collect();
			let mut ranked = rank_documents(
				hits,
				query.exclude_document_id.as_deref(),
				self.ranking(),
				OffsetDateTime::now_utc(),
			);

			ranked.truncate(query.limit as usize);

			tracing::debug!(
				tenant_id = %query.tenant_id,
				only_won = query.only_won,
				returned = ranked.len(),
				"Source ranking completed."
			);

			Ok(ranked)
		})
		.await
	}
}

/// Aggregates chunk hits per document and orders documents by composite score, then
/// similarity, then document id.
pub fn rank_documents(
	hits: Vec<VectorMatch>,
	exclude_document_id: Option<&str>,
	policy: &RankingPolicy,
	now: OffsetDateTime,
) -> Vec<SourceCandidate> {
	let mut by_document: BTreeMap<String, Vec<VectorMatch>> = BTreeMap::new();

	for hit in hits {
		if exclude_document_id == Some(hit.chunk.document_id.as_str()) {
			continue;
		}

		by_document.entry(hit.chunk.document_id.clone()).or_default().push(hit);
	}

	let mut ranked: Vec<SourceCandidate> = by_document
		.into_iter()
		.filter_map(|(document_id, mut hits)| {
			hits.sort_by(|a, b| {
				cmp_f32_desc(a.raw_score, b.raw_score)
					.then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
			});

			let best = hits.first()?;
			let top = &hits[..hits.len().min(CHUNKS_PER_SOURCE)];
			let similarity = top.iter().map(|hit| hit.raw_score).sum::<f32>() / top.len() as f32;
			let breakdown = policy.score(similarity, &best.chunk, now);

			Some(SourceCandidate {
				document_id,
				composite_score: breakdown.total(),
				breakdown,
				similarity,
				matched_chunks: hits.len(),
				outcome: best.chunk.outcome,
				recency_at: best.chunk.recency_at,
				quality_score: best.chunk.quality_score,
			})
		})
		.collect();

	ranked.sort_by(|a, b| {
		cmp_f32_desc(a.composite_score, b.composite_score)
			.then_with(|| cmp_f32_desc(a.similarity, b.similarity))
			.then_with(|| a.document_id.cmp(&b.document_id))
	});

	ranked
}
