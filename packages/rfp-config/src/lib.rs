mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Context, DEFAULT_ABSENT_OUTCOME_BONUS, DEFAULT_CONTEXT_CHAR_BUDGET,
	DEFAULT_HISTORICAL_TOP_K, DEFAULT_LOST_BONUS, DEFAULT_MIN_RELEVANCE_SCORE,
	DEFAULT_NEUTRAL_QUALITY, DEFAULT_OUTCOME_WEIGHT, DEFAULT_PENDING_BONUS, DEFAULT_PINNED_TOP_K,
	DEFAULT_QUALITY_WEIGHT, DEFAULT_RECENCY_FLOOR, DEFAULT_RECENCY_HALF_LIFE_DAYS,
	DEFAULT_RECENCY_WEIGHT, DEFAULT_SEMANTIC_WEIGHT, DEFAULT_SUPPORT_TOP_K, DEFAULT_TOTAL_BUDGET,
	DEFAULT_WON_BONUS, EmbeddingProviderConfig, MAX_TOP_K, Providers, Qdrant, Ranking,
	RankingOutcome, RankingQuality, RankingRecency, RankingWeights, Retrieval, Service, Storage,
};

use std::{fs, path::Path};

const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}

	validate_retrieval(&cfg.retrieval)?;
	validate_ranking(&cfg.ranking)?;

	if cfg.context.char_budget == 0 {
		return Err(Error::Validation {
			message: "context.char_budget must be greater than zero.".to_string(),
		});
	}
	if cfg.context.delimiter.is_empty() {
		return Err(Error::Validation {
			message: "context.delimiter must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn validate_retrieval(retrieval: &Retrieval) -> Result<()> {
	for (label, value) in [
		("retrieval.pinned_top_k", retrieval.pinned_top_k),
		("retrieval.support_top_k", retrieval.support_top_k),
		("retrieval.historical_top_k", retrieval.historical_top_k),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
		if value > MAX_TOP_K {
			return Err(Error::Validation {
				message: format!("{label} must not exceed {MAX_TOP_K}."),
			});
		}
	}

	if retrieval.total_budget == 0 {
		return Err(Error::Validation {
			message: "retrieval.total_budget must be greater than zero.".to_string(),
		});
	}
	if retrieval.general_category.trim().is_empty() {
		return Err(Error::Validation {
			message: "retrieval.general_category must be non-empty.".to_string(),
		});
	}
	if !retrieval.min_relevance_score.is_finite() {
		return Err(Error::Validation {
			message: "retrieval.min_relevance_score must be a finite number.".to_string(),
		});
	}

	Ok(())
}

fn validate_ranking(ranking: &Ranking) -> Result<()> {
	let weights = &ranking.weights;

	for (label, value) in [
		("ranking.weights.semantic", weights.semantic),
		("ranking.weights.outcome", weights.outcome),
		("ranking.weights.recency", weights.recency),
		("ranking.weights.quality", weights.quality),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if value < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if (weights.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
		return Err(Error::Validation {
			message: "ranking.weights must sum to 1.0.".to_string(),
		});
	}
	if !ranking.recency.half_life_days.is_finite() || ranking.recency.half_life_days <= 0.0 {
		return Err(Error::Validation {
			message: "ranking.recency.half_life_days must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("ranking.recency.floor", ranking.recency.floor),
		("ranking.outcome.won", ranking.outcome.won),
		("ranking.outcome.pending", ranking.outcome.pending),
		("ranking.outcome.lost", ranking.outcome.lost),
		("ranking.outcome.absent", ranking.outcome.absent),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if !ranking.quality.neutral.is_finite() || !(0.0..=100.0).contains(&ranking.quality.neutral) {
		return Err(Error::Validation {
			message: "ranking.quality.neutral must be in the range 0-100.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();
	cfg.retrieval.general_category = cfg.retrieval.general_category.trim().to_string();

	if cfg.storage.qdrant.url.ends_with('/') {
		cfg.storage.qdrant.url = cfg.storage.qdrant.url.trim_end_matches('/').to_string();
	}
}
