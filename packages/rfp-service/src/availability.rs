use serde::Serialize;

use crate::RetrievalResult;

/// Whether retrieval found anything worth grounding an answer on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Availability {
	pub available: bool,
	pub relevant_count: usize,
	/// Mean composite score of the relevant matches, zero when there are none.
	pub mean_score: f32,
}

/// Counts matches whose composite score is strictly above `min_score`.
pub fn assess_availability(result: &RetrievalResult, min_score: f32) -> Availability {
	let relevant: Vec<f32> = result
		.matches
		.iter()
		.map(|scored| scored.composite_score)
		.filter(|score| *score > min_score)
		.collect();
	let mean_score = if relevant.is_empty() {
		0.0
	} else {
		relevant.iter().sum::<f32>() / relevant.len() as f32
	};

	Availability { available: !relevant.is_empty(), relevant_count: relevant.len(), mean_score }
}
