use std::cmp::Ordering;

use serde::Serialize;
use time::OffsetDateTime;

use crate::{Result, retrieval::merge::Candidate};
use rfp_domain::{Chunk, Outcome, SourceTier};

const SECONDS_PER_DAY: f64 = 86_400.0;
const MAX_QUALITY: f32 = 100.0;

/// Resolved composite-scoring weights and signal mappings.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankingPolicy {
	pub semantic_weight: f32,
	pub outcome_weight: f32,
	pub recency_weight: f32,
	pub quality_weight: f32,
	pub half_life_days: f32,
	pub recency_floor: f32,
	pub won_bonus: f32,
	pub pending_bonus: f32,
	pub lost_bonus: f32,
	pub absent_outcome_bonus: f32,
	pub neutral_quality: f32,
}
impl RankingPolicy {
	pub fn from_config(cfg: &rfp_config::Ranking) -> Self {
		Self {
			semantic_weight: cfg.weights.semantic,
			outcome_weight: cfg.weights.outcome,
			recency_weight: cfg.weights.recency,
			quality_weight: cfg.weights.quality,
			half_life_days: cfg.recency.half_life_days,
			recency_floor: cfg.recency.floor,
			won_bonus: cfg.outcome.won,
			pending_bonus: cfg.outcome.pending,
			lost_bonus: cfg.outcome.lost,
			absent_outcome_bonus: cfg.outcome.absent,
			neutral_quality: cfg.quality.neutral,
		}
	}

	/// Stable fingerprint of the policy, attached to results so rankings can be reproduced.
	pub fn policy_id(&self) -> Result<String> {
		let raw = serde_json::to_vec(self)?;

		Ok(blake3::hash(&raw).to_hex().to_string())
	}

	pub fn outcome_bonus(&self, outcome: Option<Outcome>) -> f32 {
		match outcome {
			Some(Outcome::Won) => self.won_bonus,
			Some(Outcome::Pending) => self.pending_bonus,
			Some(Outcome::Lost) => self.lost_bonus,
			None => self.absent_outcome_bonus,
		}
	}

	/// Exponential half-life decay, never below the floor. Undated chunks sit at the floor and
	/// timestamps in the future count as brand new.
	pub fn recency_decay(&self, recency_at: Option<OffsetDateTime>, now: OffsetDateTime) -> f32 {
		let Some(ts) = recency_at else {
			return self.recency_floor;
		};
		let age_days = ((now - ts).as_seconds_f64() / SECONDS_PER_DAY).max(0.0);
		let decay = 0.5_f64.powf(age_days / f64::from(self.half_life_days)) as f32;

		decay.max(self.recency_floor)
	}

	pub fn quality_signal(&self, quality_score: Option<f32>) -> f32 {
		quality_score.unwrap_or(self.neutral_quality).clamp(0.0, MAX_QUALITY) / MAX_QUALITY
	}

	pub fn score(&self, raw_score: f32, chunk: &Chunk, now: OffsetDateTime) -> ScoreBreakdown {
		let semantic = if raw_score.is_finite() { raw_score.clamp(0.0, 1.0) } else { 0.0 };

		ScoreBreakdown {
			semantic: self.semantic_weight * semantic,
			outcome: self.outcome_weight * self.outcome_bonus(chunk.outcome),
			recency: self.recency_weight * self.recency_decay(chunk.recency_at, now),
			quality: self.quality_weight * self.quality_signal(chunk.quality_score),
		}
	}
}

/// Weighted contribution of each signal to the composite score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
	pub semantic: f32,
	pub outcome: f32,
	pub recency: f32,
	pub quality: f32,
}
impl ScoreBreakdown {
	pub fn total(&self) -> f32 {
		self.semantic + self.outcome + self.recency + self.quality
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoredMatch {
	pub point_id: String,
	/// Tier that produced this match; the provenance label shown downstream.
	pub tier: SourceTier,
	pub raw_score: f32,
	pub composite_score: f32,
	pub breakdown: ScoreBreakdown,
	pub chunk: Chunk,
}

/// Scores every candidate and sorts them into final rank order.
pub fn rank_candidates(
	candidates: Vec<Candidate>,
	policy: &RankingPolicy,
	now: OffsetDateTime,
) -> Vec<ScoredMatch> {
	let mut scored: Vec<ScoredMatch> = candidates
		.into_iter()
		.map(|candidate| {
			let breakdown = policy.score(candidate.raw_score, &candidate.chunk, now);

			ScoredMatch {
				point_id: candidate.point_id,
				tier: candidate.tier,
				raw_score: candidate.raw_score,
				composite_score: breakdown.total(),
				breakdown,
				chunk: candidate.chunk,
			}
		})
		.collect();

	scored.sort_by(cmp_ranked);

	scored
}

/// Composite score descending, then tier priority, raw score, document id and chunk index.
pub fn cmp_ranked(a: &ScoredMatch, b: &ScoredMatch) -> Ordering {
	cmp_f32_desc(a.composite_score, b.composite_score)
		.then_with(|| b.tier.priority().cmp(&a.tier.priority()))
		.then_with(|| cmp_f32_desc(a.raw_score, b.raw_score))
		.then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
		.then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
