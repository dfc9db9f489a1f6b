use serde::Deserialize;
use serde_json::{Map, Value};

pub const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.6;
pub const DEFAULT_OUTCOME_WEIGHT: f32 = 0.2;
pub const DEFAULT_RECENCY_WEIGHT: f32 = 0.1;
pub const DEFAULT_QUALITY_WEIGHT: f32 = 0.1;
pub const DEFAULT_RECENCY_HALF_LIFE_DAYS: f32 = 180.0;
/// Decay applied to undated chunks and the lower bound for dated ones.
pub const DEFAULT_RECENCY_FLOOR: f32 = 0.0;
pub const DEFAULT_NEUTRAL_QUALITY: f32 = 50.0;
pub const DEFAULT_WON_BONUS: f32 = 1.0;
pub const DEFAULT_PENDING_BONUS: f32 = 0.5;
pub const DEFAULT_LOST_BONUS: f32 = 0.0;
pub const DEFAULT_ABSENT_OUTCOME_BONUS: f32 = 0.5;

pub const DEFAULT_PINNED_TOP_K: u32 = 5;
pub const DEFAULT_SUPPORT_TOP_K: u32 = 10;
pub const DEFAULT_HISTORICAL_TOP_K: u32 = 10;
pub const DEFAULT_TOTAL_BUDGET: u32 = 15;
/// Hard ceiling on hits requested from the index per tier search.
pub const MAX_TOP_K: u32 = 50;
pub const DEFAULT_MIN_RELEVANCE_SCORE: f32 = 0.4;

pub const DEFAULT_CONTEXT_CHAR_BUDGET: u32 = 12_000;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub context: Context,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	#[serde(default = "default_qdrant_timeout_ms")]
	pub timeout_ms: u64,
	/// Delay before the single transport retry of a failed search.
	#[serde(default = "default_qdrant_retry_backoff_ms")]
	pub retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub pinned_top_k: u32,
	pub support_top_k: u32,
	pub historical_top_k: u32,
	/// Overall cap applied after ranking, distinct from the per-tier top-K.
	pub total_budget: u32,
	/// Category tag that matches every support query regardless of the requested category.
	pub general_category: String,
	pub category_fallback: bool,
	pub min_relevance_score: f32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			pinned_top_k: DEFAULT_PINNED_TOP_K,
			support_top_k: DEFAULT_SUPPORT_TOP_K,
			historical_top_k: DEFAULT_HISTORICAL_TOP_K,
			total_budget: DEFAULT_TOTAL_BUDGET,
			general_category: "general".to_string(),
			category_fallback: true,
			min_relevance_score: DEFAULT_MIN_RELEVANCE_SCORE,
		}
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub weights: RankingWeights,
	pub recency: RankingRecency,
	pub outcome: RankingOutcome,
	pub quality: RankingQuality,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
	pub semantic: f32,
	pub outcome: f32,
	pub recency: f32,
	pub quality: f32,
}
impl RankingWeights {
	pub fn sum(&self) -> f32 {
		self.semantic + self.outcome + self.recency + self.quality
	}
}
impl Default for RankingWeights {
	fn default() -> Self {
		Self {
			semantic: DEFAULT_SEMANTIC_WEIGHT,
			outcome: DEFAULT_OUTCOME_WEIGHT,
			recency: DEFAULT_RECENCY_WEIGHT,
			quality: DEFAULT_QUALITY_WEIGHT,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RankingRecency {
	pub half_life_days: f32,
	pub floor: f32,
}
impl Default for RankingRecency {
	fn default() -> Self {
		Self { half_life_days: DEFAULT_RECENCY_HALF_LIFE_DAYS, floor: DEFAULT_RECENCY_FLOOR }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RankingOutcome {
	pub won: f32,
	pub pending: f32,
	pub lost: f32,
	pub absent: f32,
}
impl Default for RankingOutcome {
	fn default() -> Self {
		Self {
			won: DEFAULT_WON_BONUS,
			pending: DEFAULT_PENDING_BONUS,
			lost: DEFAULT_LOST_BONUS,
			absent: DEFAULT_ABSENT_OUTCOME_BONUS,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RankingQuality {
	pub neutral: f32,
}
impl Default for RankingQuality {
	fn default() -> Self {
		Self { neutral: DEFAULT_NEUTRAL_QUALITY }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Context {
	pub char_budget: u32,
	pub delimiter: String,
	pub pinned_heading: String,
	pub knowledge_heading: String,
}
impl Default for Context {
	fn default() -> Self {
		Self {
			char_budget: DEFAULT_CONTEXT_CHAR_BUDGET,
			delimiter: "\n\n---\n\n".to_string(),
			pinned_heading: "PINNED SOURCE".to_string(),
			knowledge_heading: "KNOWLEDGE BASE".to_string(),
		}
	}
}

fn default_qdrant_timeout_ms() -> u64 {
	5_000
}

fn default_qdrant_retry_backoff_ms() -> u64 {
	200
}
