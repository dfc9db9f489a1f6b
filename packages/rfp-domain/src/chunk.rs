use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, TenantId};

pub const MAX_QUALITY_SCORE: f32 = 100.0;

/// Retrieval source category. `Pinned` is a query-time provenance tag; stored chunks are
/// either `Support` or `Historical`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
	Pinned,
	Support,
	Historical,
}
impl SourceTier {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pinned => "pinned",
			Self::Support => "support",
			Self::Historical => "historical",
		}
	}

	/// Higher wins during dedup and tie-breaks: pinned > historical > support.
	pub fn priority(self) -> u8 {
		match self {
			Self::Pinned => 2,
			Self::Historical => 1,
			Self::Support => 0,
		}
	}

	pub fn is_stored(self) -> bool {
		!matches!(self, Self::Pinned)
	}
}
impl fmt::Display for SourceTier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for SourceTier {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"pinned" => Ok(Self::Pinned),
			"support" => Ok(Self::Support),
			"historical" => Ok(Self::Historical),
			other => Err(Error::UnknownVariant { kind: "source tier", value: other.to_string() }),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
	Won,
	Lost,
	Pending,
}
impl Outcome {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Won => "won",
			Self::Lost => "lost",
			Self::Pending => "pending",
		}
	}
}
impl fmt::Display for Outcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Outcome {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"won" => Ok(Self::Won),
			"lost" => Ok(Self::Lost),
			"pending" => Ok(Self::Pending),
			other => Err(Error::UnknownVariant { kind: "outcome", value: other.to_string() }),
		}
	}
}

/// Retrieval depth. `Basic` restricts the historical tier to winning bids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
	Basic,
	#[default]
	Detailed,
}
impl Depth {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Basic => "basic",
			Self::Detailed => "detailed",
		}
	}
}
impl FromStr for Depth {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"basic" => Ok(Self::Basic),
			"detailed" => Ok(Self::Detailed),
			other => Err(Error::UnknownVariant { kind: "depth", value: other.to_string() }),
		}
	}
}

/// The atomic retrieval unit: one contiguous span of a source document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
	pub tenant_id: TenantId,
	pub document_id: String,
	pub chunk_index: u32,
	pub chunk_count: u32,
	pub tier: SourceTier,
	#[serde(default)]
	pub category: Option<String>,
	#[serde(default)]
	pub outcome: Option<Outcome>,
	#[serde(default, with = "crate::time_serde")]
	pub recency_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub quality_score: Option<f32>,
	pub text: String,
}
impl Chunk {
	pub fn key(&self) -> (&str, u32) {
		(self.document_id.as_str(), self.chunk_index)
	}

	/// Checks the ingestion-boundary invariants so scoring never has to re-check them.
	pub fn validate(&self) -> Result<()> {
		let invalid = |message: &str| Error::InvalidChunk {
			document_id: self.document_id.clone(),
			chunk_index: self.chunk_index,
			message: message.to_string(),
		};

		if self.document_id.trim().is_empty() {
			return Err(invalid("document_id must be non-empty."));
		}
		if self.text.trim().is_empty() {
			return Err(invalid("text must be non-empty."));
		}
		if !self.tier.is_stored() {
			return Err(invalid("tier must be support or historical."));
		}
		if self.chunk_count == 0 {
			return Err(invalid("chunk_count must be greater than zero."));
		}
		if self.chunk_index >= self.chunk_count {
			return Err(invalid("chunk_index must be less than chunk_count."));
		}
		if let Some(category) = self.category.as_deref()
			&& category.trim().is_empty()
		{
			return Err(invalid("category must be non-empty when present."));
		}
		if let Some(score) = self.quality_score
			&& (!score.is_finite() || !(0.0..=MAX_QUALITY_SCORE).contains(&score))
		{
			return Err(invalid("quality_score must be in the range 0-100."));
		}

		Ok(())
	}
}

/// A chunk plus its dense embedding, the unit stored in the vector index.
#[derive(Clone, Debug)]
pub struct VectorRecord {
	pub point_id: Uuid,
	pub vector: Vec<f32>,
	pub chunk: Chunk,
}
impl VectorRecord {
	pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
		let point_id = point_id_for(&chunk.tenant_id, &chunk.document_id, chunk.chunk_index);

		Self { point_id, vector, chunk }
	}
}

/// One raw hit returned by the vector index.
#[derive(Clone, Debug)]
pub struct VectorMatch {
	pub point_id: String,
	pub raw_score: f32,
	pub chunk: Chunk,
}

/// Deterministic point id so re-ingesting a document overwrites its previous vectors.
pub fn point_id_for(tenant_id: &TenantId, document_id: &str, chunk_index: u32) -> Uuid {
	let name = format!("{tenant_id}:{document_id}:{chunk_index}");

	Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}
