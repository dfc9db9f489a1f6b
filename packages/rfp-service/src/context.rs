use rfp_domain::SourceTier;

use crate::{RetrievalResult, ScoredMatch};

/// Serializes a result into a pinned block followed by a knowledge-base block.
///
/// The output never exceeds `cfg.char_budget` characters. Chunks are dropped whole, lowest
/// rank first, until the rest fits.
pub fn assemble_context(result: &RetrievalResult, cfg: &rfp_config::Context) -> String {
	let budget = cfg.char_budget as usize;
	let mut best = String::new();

	for take in 1..=result.matches.len() {
		let rendered = render(&result.matches[..take], cfg);

		if rendered.chars().count() > budget {
			break;
		}

		best = rendered;
	}

	best
}

fn render(matches: &[ScoredMatch], cfg: &rfp_config::Context) -> String {
	let (pinned, knowledge): (Vec<&ScoredMatch>, Vec<&ScoredMatch>) =
		matches.iter().partition(|scored| scored.tier == SourceTier::Pinned);
	let mut blocks = Vec::with_capacity(2);

	for (heading, group) in [(&cfg.pinned_heading, pinned), (&cfg.knowledge_heading, knowledge)] {
		if group.is_empty() {
			continue;
		}

		let body = group
			.iter()
			.map(|scored| scored.chunk.text.trim())
			.collect::<Vec<_>>()
			.join(cfg.delimiter.as_str());

		blocks.push(format!("{heading}\n\n{body}"));
	}

	blocks.join("\n\n")
}
