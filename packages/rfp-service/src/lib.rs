pub mod availability;
pub mod context;
pub mod ingest;
pub mod retrieval;
pub mod sources;

mod error;

pub use availability::{Availability, assess_availability};
pub use context::assemble_context;
pub use error::{Error, Result};
pub use ingest::{DocumentInput, EMBEDDING_BATCH_SIZE, IndexReport};
pub use retrieval::{
	DocumentGroup, RankingPolicy, RetrievalQuery, RetrievalResult, ScoreBreakdown, ScoredMatch,
	TierCounts, TierPlan, TierPlans, plan_tiers,
};
pub use rfp_storage::BoxFuture;
pub use sources::{DEFAULT_SOURCE_LIMIT, SourceCandidate, SourceQuery};

use std::sync::Arc;

use rfp_config::{Config, EmbeddingProviderConfig};
use rfp_providers::embedding;
use rfp_storage::VectorIndex;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self { embedding: Arc::new(DefaultProviders) }
	}
}

/// Retrieval, ranking and ingestion over one shared tenant-partitioned index.
///
/// Every collaborator is injected, so tests swap in fakes without global state.
pub struct RfpService {
	pub cfg: Config,
	pub index: Arc<dyn VectorIndex>,
	pub providers: Providers,
	ranking: RankingPolicy,
}
impl RfpService {
	pub fn new(cfg: Config, index: Arc<dyn VectorIndex>) -> Self {
		Self::with_providers(cfg, index, Providers::default())
	}

	pub fn with_providers(cfg: Config, index: Arc<dyn VectorIndex>, providers: Providers) -> Self {
		let ranking = RankingPolicy::from_config(&cfg.ranking);

		Self { cfg, index, providers, ranking }
	}

	pub fn ranking(&self) -> &RankingPolicy {
		&self.ranking
	}

	/// Embeds `texts` and checks the provider returned one finite, non-zero vector of the
	/// configured dimension per input.
	pub(crate) async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		let inputs: Vec<String> =
			texts.iter().map(|text| embedding::truncate_input(text.trim()).to_string()).collect();
		let vectors = self.providers.embedding.embed(&self.cfg.providers.embedding, &inputs).await?;

		if vectors.len() != inputs.len() {
			return Err(Error::EmbeddingFailure {
				message: format!(
					"Embedding provider returned {} vectors for {} inputs.",
					vectors.len(),
					inputs.len()
				),
			});
		}

		for vec in &vectors {
			validate_vector(vec, self.cfg.storage.qdrant.vector_dim)?;
		}

		Ok(vectors)
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}

pub(crate) fn validate_vector(vec: &[f32], expected_dim: u32) -> Result<()> {
	if vec.len() != expected_dim as usize {
		return Err(Error::EmbeddingFailure {
			message: format!(
				"Embedding dimension {} does not match configured vector_dim {expected_dim}.",
				vec.len()
			),
		});
	}
	if vec.iter().any(|value| !value.is_finite()) {
		return Err(Error::EmbeddingFailure {
			message: "Embedding vector contains non-finite values.".to_string(),
		});
	}
	if vec.iter().all(|value| *value == 0.0) {
		return Err(Error::EmbeddingFailure {
			message: "Embedding provider returned a zero vector.".to_string(),
		});
	}

	Ok(())
}
