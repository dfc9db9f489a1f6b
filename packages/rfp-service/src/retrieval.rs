mod merge;
mod plan;
mod ranking;

pub use plan::{TierPlan, TierPlans, plan_tiers};
pub use ranking::{RankingPolicy, ScoreBreakdown, ScoredMatch, cmp_f32_desc, cmp_ranked};

use std::future::Future;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::{Error, Result, RfpService, validate_vector};
use merge::Candidate;
use rfp_domain::{Depth, SourceTier, TenantId, VectorMatch};

/// One retrieval request from the answer-generation caller.
#[derive(Clone, Debug)]
pub struct RetrievalQuery {
	pub tenant_id: TenantId,
	pub question: String,
	pub category: Option<String>,
	pub pinned_source_id: Option<String>,
	pub depth: Depth,
	/// Overall cap after ranking. Falls back to `retrieval.total_budget`.
	pub budget: Option<u32>,
	/// Searches still in flight at the deadline are cancelled and the call fails.
	pub deadline: Option<Instant>,
}
impl RetrievalQuery {
	pub fn new(tenant_id: TenantId, question: impl Into<String>) -> Self {
		Self {
			tenant_id,
			question: question.into(),
			category: None,
			pinned_source_id: None,
			depth: Depth::default(),
			budget: None,
			deadline: None,
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
	pub pinned: u32,
	pub support: u32,
	pub historical: u32,
}
impl TierCounts {
	pub fn get(&self, tier: SourceTier) -> u32 {
		match tier {
			SourceTier::Pinned => self.pinned,
			SourceTier::Support => self.support,
			SourceTier::Historical => self.historical,
		}
	}

	fn add(&mut self, tier: SourceTier) {
		match tier {
			SourceTier::Pinned => self.pinned += 1,
			SourceTier::Support => self.support += 1,
			SourceTier::Historical => self.historical += 1,
		}
	}
}

/// Rank-ordered, deduplicated, budget-capped matches for one tenant.
#[derive(Clone, Debug, Serialize)]
pub struct RetrievalResult {
	pub tenant_id: TenantId,
	pub matches: Vec<ScoredMatch>,
	/// Matches per tier after dedup and truncation.
	pub counts: TierCounts,
	/// Tiers whose search failed; their contribution is empty.
	pub degraded: Vec<SourceTier>,
	/// Deduplicated candidates before the budget cut.
	pub candidate_count: usize,
	pub isolation_drops: usize,
	pub policy_id: String,
}
impl RetrievalResult {
	pub fn is_empty(&self) -> bool {
		self.matches.is_empty()
	}

	pub fn is_degraded(&self) -> bool {
		!self.degraded.is_empty()
	}

	/// Groups matches by source document, ordered by each document's best rank.
	pub fn by_document(&self) -> Vec<DocumentGroup<'_>> {
		let mut groups: Vec<DocumentGroup<'_>> = Vec::new();

		for scored in &self.matches {
			let document_id = scored.chunk.document_id.as_str();

			match groups.iter_mut().find(|group| group.document_id == document_id) {
				Some(group) => group.matches.push(scored),
				None => groups.push(DocumentGroup { document_id, matches: vec![scored] }),
			}
		}

		groups
	}
}

#[derive(Debug)]
pub struct DocumentGroup<'a> {
	pub document_id: &'a str,
	pub matches: Vec<&'a ScoredMatch>,
}

impl RfpService {
	/// Embeds the question once, then runs the tier fan-out with that vector.
	pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<RetrievalResult> {
		if query.question.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "question must be non-empty.".to_string() });
		}

		with_deadline(query.deadline, async {
			let vectors = self.embed_texts(std::slice::from_ref(&query.question)).await?;
			let Some(vector) = vectors.into_iter().next() else {
				return Err(Error::EmbeddingFailure {
					message: "Embedding provider returned no vectors.".to_string(),
				});
			};

			self.run_retrieval(query, &vector, OffsetDateTime::now_utc()).await
		})
		.await
	}

	/// Runs retrieval with a precomputed query vector.
	pub async fn retrieve_with_vector(
		&self,
		query: &RetrievalQuery,
		vector: &[f32],
	) -> Result<RetrievalResult> {
		validate_vector(vector, self.cfg.storage.qdrant.vector_dim)
			.map_err(|err| Error::InvalidRequest { message: err.to_string() })?;

		with_deadline(query.deadline, self.run_retrieval(query, vector, OffsetDateTime::now_utc()))
			.await
	}

	async fn run_retrieval(
		&self,
		query: &RetrievalQuery,
		vector: &[f32],
		now: OffsetDateTime,
	) -> Result<RetrievalResult> {
		let budget = query.budget.unwrap_or(self.cfg.retrieval.total_budget);

		if budget == 0 {
			return Err(Error::InvalidRequest {
				message: "budget must be greater than zero.".to_string(),
			});
		}

		let policy_id = self.ranking().policy_id()?;
		let plans = plan_tiers(query, &self.cfg.retrieval);
		let (pinned, support, historical) = tokio::join!(
			async {
				match plans.pinned.as_ref() {
					Some(plan) => Some(self.search_tier(plan, vector).await),
					None => None,
				}
			},
			self.search_tier(&plans.support, vector),
			self.search_tier(&plans.historical, vector),
		);
		let mut degraded = Vec::new();
		let mut isolation_drops = 0;
		let mut candidates = Vec::new();

		for (tier, outcome) in [
			(SourceTier::Pinned, pinned),
			(SourceTier::Support, Some(support)),
			(SourceTier::Historical, Some(historical)),
		] {
			let Some(outcome) = outcome else {
				continue;
			};

			match outcome {
				Ok(hits) =>
					for hit in hits {
						if hit.chunk.tenant_id != query.tenant_id {
							tracing::error!(
								tenant_id = %query.tenant_id,
								found_tenant_id = %hit.chunk.tenant_id,
								document_id = %hit.chunk.document_id,
								tier = tier.as_str(),
								"Tenant isolation violation. Dropping match."
							);

							isolation_drops += 1;

							continue;
						}

						candidates.push(Candidate {
							point_id: hit.point_id,
							tier,
							raw_score: hit.raw_score,
							chunk: hit.chunk,
						});
					},
				Err(err) => {
					tracing::warn!(
						tenant_id = %query.tenant_id,
						tier = tier.as_str(),
						error = %err,
						"Tier search failed. Continuing with degraded result."
					);

					degraded.push(tier);
				},
			}
		}

		let candidates = merge::dedup_candidates(candidates);
		let candidate_count = candidates.len();
		let mut matches = ranking::rank_candidates(candidates, self.ranking(), now);

		matches.truncate(budget as usize);

		let mut counts = TierCounts::default();

		for scored in &matches {
			counts.add(scored.tier);
		}

		tracing::debug!(
			tenant_id = %query.tenant_id,
			candidate_count,
			returned = matches.len(),
			pinned = counts.pinned,
			support = counts.support,
			historical = counts.historical,
			"Retrieval completed."
		);

		Ok(RetrievalResult {
			tenant_id: query.tenant_id.clone(),
			matches,
			counts,
			degraded,
			candidate_count,
			isolation_drops,
			policy_id,
		})
	}

	async fn search_tier(
		&self,
		plan: &TierPlan,
		vector: &[f32],
	) -> rfp_storage::Result<Vec<VectorMatch>> {
		let hits = self.index.search(vector, &plan.filter, plan.top_k).await?;

		if hits.is_empty()
			&& let Some(fallback) = plan.fallback.as_ref()
		{
			tracing::debug!(
				tier = plan.tier.as_str(),
				"Category-filtered search was empty. Retrying without category."
			);

			return self.index.search(vector, fallback, plan.top_k).await;
		}

		Ok(hits)
	}
}

pub(crate) async fn with_deadline<F, T>(deadline: Option<Instant>, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	match deadline {
		Some(deadline) => tokio::time::timeout_at(deadline, fut).await.map_err(|_| {
			tracing::warn!("Retrieval deadline exceeded. In-flight searches were cancelled.");

			Error::DeadlineExceeded
		})?,
		None => fut.await,
	}
}
