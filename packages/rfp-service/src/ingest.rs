use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, Result, RfpService};
use rfp_domain::{Chunk, Outcome, SourceTier, TenantId, VectorRecord};

pub const EMBEDDING_BATCH_SIZE: usize = 100;

/// One parsed source document, already split into chunk texts.
#[derive(Clone, Debug, Deserialize)]
pub struct DocumentInput {
	pub tenant_id: TenantId,
	pub document_id: String,
	pub tier: SourceTier,
	#[serde(default)]
	pub category: Option<String>,
	#[serde(default)]
	pub outcome: Option<Outcome>,
	#[serde(default, with = "rfp_domain::time_serde")]
	pub recency_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub quality_score: Option<f32>,
	pub chunks: Vec<String>,
}
impl DocumentInput {
	pub fn into_chunks(self) -> Result<Vec<Chunk>> {
		let chunk_count = u32::try_from(self.chunks.len()).map_err(|_| Error::InvalidRequest {
			message: format!("Document {} has too many chunks.", self.document_id),
		})?;

		Ok(self
			.chunks
			.into_iter()
			.enumerate()
			.map(|(idx, text)| Chunk {
				tenant_id: self.tenant_id.clone(),
				document_id: self.document_id.clone(),
				chunk_index: idx as u32,
				chunk_count,
				tier: self.tier,
				category: self.category.clone(),
				outcome: self.outcome,
				recency_at: self.recency_at,
				quality_score: self.quality_score,
				text,
			})
			.collect())
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
	pub indexed: usize,
	pub batches: usize,
}

impl RfpService {
	/// Validates, embeds and upserts chunks. Nothing is written unless every chunk is valid.
	pub async fn index_chunks(&self, chunks: &[Chunk]) -> Result<IndexReport> {
		let mut seen = HashSet::new();

		for chunk in chunks {
			chunk.validate()?;

			if !seen.insert((chunk.tenant_id.as_str(), chunk.document_id.as_str(), chunk.chunk_index))
			{
				return Err(Error::InvalidRequest {
					message: format!(
						"Duplicate chunk {}#{} in one ingestion batch.",
						chunk.document_id, chunk.chunk_index
					),
				});
			}
		}

		let mut report = IndexReport::default();

		for batch in chunks.chunks(EMBEDDING_BATCH_SIZE) {
			let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
			let vectors = self.embed_texts(&texts).await?;
			let records: Vec<VectorRecord> = batch
				.iter()
				.cloned()
				.zip(vectors)
				.map(|(chunk, vector)| VectorRecord::new(chunk, vector))
				.collect();

			self.index.upsert(&records).await?;

			report.indexed += records.len();
			report.batches += 1;

			tracing::info!(count = records.len(), "Indexed chunk batch.");
		}

		Ok(report)
	}

	/// Replaces every stored chunk of the document with the new ones.
	pub async fn index_document(&self, document: DocumentInput) -> Result<IndexReport> {
		let tenant_id = document.tenant_id.clone();
		let document_id = document.document_id.clone();
		let chunks = document.into_chunks()?;

		if chunks.is_empty() {
			return Err(Error::InvalidRequest {
				message: format!("Document {document_id} has no chunks."),
			});
		}

		for chunk in &chunks {
			chunk.validate()?;
		}

		self.delete_document(&tenant_id, &document_id).await?;

		self.index_chunks(&chunks).await
	}

	pub async fn delete_document(&self, tenant_id: &TenantId, document_id: &str) -> Result<()> {
		if document_id.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "document_id must be non-empty.".to_string(),
			});
		}

		self.index.delete_document(tenant_id, document_id).await?;

		tracing::info!(tenant_id = %tenant_id, document_id, "Deleted document vectors.");

		Ok(())
	}

	/// Removes every vector the tenant owns, across all tiers.
	pub async fn delete_tenant(&self, tenant_id: &TenantId) -> Result<()> {
		self.index.delete_tenant(tenant_id).await?;

		tracing::info!(tenant_id = %tenant_id, "Deleted all tenant vectors.");

		Ok(())
	}
}
