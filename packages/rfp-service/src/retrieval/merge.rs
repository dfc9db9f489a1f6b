use std::collections::{BTreeMap, btree_map::Entry};

use rfp_domain::{Chunk, SourceTier};

/// A raw tier hit before composite scoring.
#[derive(Clone, Debug)]
pub struct Candidate {
	pub point_id: String,
	pub tier: SourceTier,
	pub raw_score: f32,
	pub chunk: Chunk,
}
impl Candidate {
	fn outranks(&self, other: &Self) -> bool {
		match self.tier.priority().cmp(&other.tier.priority()) {
			std::cmp::Ordering::Equal => self.raw_score > other.raw_score,
			ordering => ordering.is_gt(),
		}
	}
}

/// Keeps one candidate per `(document_id, chunk_index)`: the higher-priority tier wins, and
/// within one tier the higher raw score.
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
	let mut by_key: BTreeMap<(String, u32), Candidate> = BTreeMap::new();

	for candidate in candidates {
		let (document_id, chunk_index) = candidate.chunk.key();

		match by_key.entry((document_id.to_string(), chunk_index)) {
			Entry::Vacant(slot) => {
				slot.insert(candidate);
			},
			Entry::Occupied(mut slot) =>
				if candidate.outranks(slot.get()) {
					slot.insert(candidate);
				},
		}
	}

	by_key.into_values().collect()
}
