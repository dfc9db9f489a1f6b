use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Upper bound on characters sent per input, roughly 8k tokens of English text.
pub const MAX_EMBEDDING_INPUT_CHARS: usize = 32_000;

pub async fn embed(
	cfg: &rfp_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let inputs = prepare_inputs(texts)?;
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": inputs,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vectors = parse_embedding_response(json)?;

	check_vectors(&vectors, inputs.len(), cfg.dimensions as usize)?;

	Ok(vectors)
}

/// Cuts `text` to at most [`MAX_EMBEDDING_INPUT_CHARS`] characters on a char boundary.
pub fn truncate_input(text: &str) -> &str {
	match text.char_indices().nth(MAX_EMBEDDING_INPUT_CHARS) {
		Some((byte_idx, _)) => &text[..byte_idx],
		None => text,
	}
}

fn prepare_inputs(texts: &[String]) -> Result<Vec<&str>> {
	if texts.is_empty() {
		return Err(Error::InvalidInput { message: "Embedding input must be non-empty.".to_string() });
	}

	let mut inputs = Vec::with_capacity(texts.len());

	for (idx, text) in texts.iter().enumerate() {
		if text.trim().is_empty() {
			return Err(Error::InvalidInput {
				message: format!("Embedding input {idx} must be non-empty."),
			});
		}

		inputs.push(truncate_input(text));
	}

	Ok(inputs)
}

fn check_vectors(vectors: &[Vec<f32>], expected_count: usize, dimensions: usize) -> Result<()> {
	if vectors.len() != expected_count {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding response returned {} vectors for {expected_count} inputs.",
				vectors.len()
			),
		});
	}
	if let Some(bad) = vectors.iter().find(|vec| vec.len() != dimensions) {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding vector has {} dimensions, expected {dimensions}.",
				bad.len()
			),
		});
	}

	Ok(())
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Embedding response is missing data array.".to_string() }
	})?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").and_then(|v| v.as_array()).ok_or_else(|| {
			Error::InvalidResponse {
				message: "Embedding item missing embedding array.".to_string(),
			}
		})?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
				message: "Embedding value must be numeric.".to_string(),
			})?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
