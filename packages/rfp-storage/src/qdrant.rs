pub const DENSE_VECTOR_NAME: &str = "dense";

/// Keyword payload fields every tier filter can touch.
pub const KEYWORD_INDEX_FIELDS: [&str; 5] =
	["tenant_id", "document_id", "source_tier", "category", "outcome"];

use std::{collections::HashMap, future::Future, time::Duration};

use qdrant_client::{
	QdrantError,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, CreateFieldIndexCollection, DeletePointsBuilder,
		Distance, FieldType, Filter, PointId, PointStruct, Query, QueryPointsBuilder,
		ScoredPoint, UpsertPointsBuilder, Value, Vector, VectorParamsBuilder, VectorsConfigBuilder,
		point_id::PointIdOptions, value::Kind,
	},
};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{BoxFuture, Error, Result, VectorIndex, clamp_top_k};
use rfp_domain::{
	Chunk, Outcome, Predicate, SearchFilter, SourceTier, TenantId, VectorMatch, VectorRecord,
};

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
	pub retry_backoff: Duration,
}
impl QdrantStore {
	pub fn new(cfg: &rfp_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url)
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			vector_dim: cfg.vector_dim,
			retry_backoff: Duration::from_millis(cfg.retry_backoff_ms),
		})
	}

	/// Creates the cosine collection when missing and makes sure every filter field is indexed.
	pub async fn ensure_collection(&self) -> Result<()> {
		if !self.client.collection_exists(self.collection.clone()).await? {
			let mut vectors_config = VectorsConfigBuilder::default();

			vectors_config.add_named_vector_params(
				DENSE_VECTOR_NAME,
				VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine),
			);

			self.client
				.create_collection(
					CreateCollectionBuilder::new(self.collection.clone())
						.vectors_config(vectors_config),
				)
				.await?;

			tracing::info!(collection = %self.collection, "Created Qdrant collection.");
		}

		for field_name in KEYWORD_INDEX_FIELDS {
			let request = CreateFieldIndexCollection {
				collection_name: self.collection.clone(),
				wait: Some(true),
				field_name: field_name.to_string(),
				field_type: Some(FieldType::Keyword as i32),
				field_index_params: None,
				ordering: None,
			};

			self.client.create_field_index(request).await?;
		}

		Ok(())
	}

	async fn search_points(
		&self,
		vector: &[f32],
		filter: &SearchFilter,
		top_k: u32,
	) -> Result<Vec<VectorMatch>> {
		let limit = clamp_top_k(top_k);

		if limit == 0 {
			return Ok(Vec::new());
		}
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions, expected {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let request = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.using(DENSE_VECTOR_NAME)
			.filter(to_qdrant_filter(filter))
			.limit(limit as u64)
			.with_payload(true)
			.build();
		let response =
			self.with_transient_retry("search", || self.client.query(request.clone())).await?;

		Ok(decode_points(response.result))
	}

	async fn upsert_records(&self, records: &[VectorRecord]) -> Result<()> {
		if records.is_empty() {
			return Ok(());
		}

		let mut points = Vec::with_capacity(records.len());

		for record in records {
			if record.vector.len() != self.vector_dim as usize {
				return Err(Error::InvalidArgument(format!(
					"Vector for {}#{} has {} dimensions, expected {}.",
					record.chunk.document_id,
					record.chunk.chunk_index,
					record.vector.len(),
					self.vector_dim
				)));
			}

			let mut vectors = HashMap::new();

			vectors.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(record.vector.clone()));
			points.push(PointStruct::new(
				record.point_id.to_string(),
				vectors,
				Payload::from(encode_chunk(&record.chunk)?),
			));
		}

		let request = UpsertPointsBuilder::new(self.collection.clone(), points).wait(true).build();

		self.with_transient_retry("upsert", || self.client.upsert_points(request.clone())).await?;

		Ok(())
	}

	async fn delete_points(&self, tenant_id: &TenantId, document_id: &str) -> Result<()> {
		if document_id.trim().is_empty() {
			return Err(Error::InvalidArgument("document_id must be non-empty.".to_string()));
		}

		self.delete_matching(&SearchFilter::for_tenant(tenant_id.clone()).with_document(document_id))
			.await
	}

	async fn delete_tenant_points(&self, tenant_id: &TenantId) -> Result<()> {
		self.delete_matching(&SearchFilter::for_tenant(tenant_id.clone())).await
	}

	async fn delete_matching(&self, filter: &SearchFilter) -> Result<()> {
		let request = DeletePointsBuilder::new(self.collection.clone())
			.points(to_qdrant_filter(filter))
			.wait(true)
			.build();

		self.with_transient_retry("delete", || self.client.delete_points(request.clone())).await?;

		Ok(())
	}

	async fn with_transient_retry<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, QdrantError>>,
	{
		match call().await {
			Ok(value) => Ok(value),
			Err(err) if is_transient_error(&err) => {
				tracing::warn!(
					op,
					error = %err,
					backoff_ms = self.retry_backoff.as_millis() as u64,
					"Transient Qdrant error. Retrying once."
				);
				tokio::time::sleep(self.retry_backoff).await;

				Ok(call().await?)
			},
			Err(err) => Err(err.into()),
		}
	}
}
impl VectorIndex for QdrantStore {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		filter: &'a SearchFilter,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<VectorMatch>>> {
		Box::pin(self.search_points(vector, filter, top_k))
	}

	fn upsert<'a>(&'a self, records: &'a [VectorRecord]) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert_records(records))
	}

	fn delete_document<'a>(
		&'a self,
		tenant_id: &'a TenantId,
		document_id: &'a str,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.delete_points(tenant_id, document_id))
	}

	fn delete_tenant<'a>(&'a self, tenant_id: &'a TenantId) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.delete_tenant_points(tenant_id))
	}
}

/// Translates a domain filter into a Qdrant `must` conjunction. The tenant condition is
/// always the first clause.
pub fn to_qdrant_filter(filter: &SearchFilter) -> Filter {
	let mut must = vec![Condition::matches("tenant_id", filter.tenant_id().as_str().to_string())];

	for predicate in filter.predicates() {
		let condition = match predicate {
			Predicate::DocumentId(id) => Condition::matches("document_id", id.clone()),
			Predicate::SourceTier(tier) => {
				Condition::matches("source_tier", tier.as_str().to_string())
			},
			Predicate::CategoryAnyOf(categories) => {
				Condition::matches("category", categories.clone())
			},
			Predicate::Outcome(outcome) => Condition::matches("outcome", outcome.as_str().to_string()),
		};

		must.push(condition);
	}

	Filter::must(must)
}

pub fn encode_chunk(chunk: &Chunk) -> Result<HashMap<String, Value>> {
	let mut payload = HashMap::new();

	payload.insert("tenant_id".to_string(), Value::from(chunk.tenant_id.as_str().to_string()));
	payload.insert("document_id".to_string(), Value::from(chunk.document_id.clone()));
	payload.insert("chunk_index".to_string(), Value::from(i64::from(chunk.chunk_index)));
	payload.insert("chunk_count".to_string(), Value::from(i64::from(chunk.chunk_count)));
	payload.insert("source_tier".to_string(), Value::from(chunk.tier.as_str().to_string()));
	payload.insert("text".to_string(), Value::from(chunk.text.clone()));

	if let Some(category) = chunk.category.as_deref() {
		payload.insert("category".to_string(), Value::from(category.to_string()));
	}
	if let Some(outcome) = chunk.outcome {
		payload.insert("outcome".to_string(), Value::from(outcome.as_str().to_string()));
	}
	if let Some(recency_at) = chunk.recency_at {
		let formatted = recency_at.format(&Rfc3339).map_err(|_| {
			Error::InvalidArgument("Failed to format recency timestamp.".to_string())
		})?;

		payload.insert("recency_at".to_string(), Value::from(formatted));
	}
	if let Some(score) = chunk.quality_score {
		payload.insert("quality_score".to_string(), Value::from(f64::from(score)));
	}

	Ok(payload)
}

/// Rebuilds a chunk from a stored payload. Unknown fields are ignored.
pub fn decode_chunk(payload: &HashMap<String, Value>) -> Result<Chunk> {
	let tenant_id = TenantId::new(required_string(payload, "tenant_id")?)
		.map_err(|err| Error::InvalidPayload(err.to_string()))?;
	let tier: SourceTier = required_string(payload, "source_tier")?
		.parse()
		.map_err(|err: rfp_domain::Error| Error::InvalidPayload(err.to_string()))?;
	let outcome = payload_string(payload, "outcome")
		.map(|raw| raw.parse::<Outcome>())
		.transpose()
		.map_err(|err| Error::InvalidPayload(err.to_string()))?;
	let recency_at = payload_string(payload, "recency_at")
		.map(|raw| OffsetDateTime::parse(&raw, &Rfc3339))
		.transpose()
		.map_err(|_| Error::InvalidPayload("recency_at must be an RFC3339 timestamp.".to_string()))?;

	Ok(Chunk {
		tenant_id,
		document_id: required_string(payload, "document_id")?,
		chunk_index: required_u32(payload, "chunk_index")?,
		chunk_count: required_u32(payload, "chunk_count")?,
		tier,
		category: payload_string(payload, "category"),
		outcome,
		recency_at,
		quality_score: payload_f32(payload, "quality_score"),
		text: required_string(payload, "text")?,
	})
}

pub fn is_transient_error(err: &QdrantError) -> bool {
	let message = err.to_string().to_lowercase();

	["unavailable", "deadline", "timed out", "timeout", "connection", "transport error"]
		.iter()
		.any(|needle| message.contains(needle))
}

fn decode_points(points: Vec<ScoredPoint>) -> Vec<VectorMatch> {
	let mut out = Vec::with_capacity(points.len());

	for point in points {
		let point_id = point.id.as_ref().map(point_id_string).unwrap_or_default();

		match decode_chunk(&point.payload) {
			Ok(chunk) => out.push(VectorMatch { point_id, raw_score: point.score, chunk }),
			Err(err) => {
				tracing::warn!(point_id = %point_id, error = %err, "Skipping point with invalid payload.");
			},
		}
	}

	out
}

fn point_id_string(point_id: &PointId) -> String {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => id.clone(),
		Some(PointIdOptions::Num(num)) => num.to_string(),
		None => String::new(),
	}
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => Some(*value),
		Some(Kind::DoubleValue(value)) if value.fract() == 0.0 => Some(*value as i64),
		_ => None,
	}
}

fn payload_f32(payload: &HashMap<String, Value>, key: &str) -> Option<f32> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::DoubleValue(value)) => Some(*value as f32),
		Some(Kind::IntegerValue(value)) => Some(*value as f32),
		_ => None,
	}
}

fn required_string(payload: &HashMap<String, Value>, key: &str) -> Result<String> {
	payload_string(payload, key)
		.ok_or_else(|| Error::InvalidPayload(format!("Payload is missing string field {key}.")))
}

fn required_u32(payload: &HashMap<String, Value>, key: &str) -> Result<u32> {
	payload_i64(payload, key)
		.and_then(|value| u32::try_from(value).ok())
		.ok_or_else(|| Error::InvalidPayload(format!("Payload is missing integer field {key}.")))
}
