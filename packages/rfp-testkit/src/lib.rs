mod error;

pub use error::{Error, Result};

use std::{
	env,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use qdrant_client::Qdrant;
use tokio::time;
use uuid::Uuid;

use rfp_domain::{
	Chunk, Predicate, SearchFilter, SourceTier, TenantId, VectorMatch, VectorRecord,
};
use rfp_storage::{BoxFuture, VectorIndex, clamp_top_k};

type FailurePredicate = Arc<dyn Fn(&SearchFilter) -> bool + Send + Sync>;

/// In-process [`VectorIndex`] with the same filter semantics as the Qdrant store.
///
/// Scores are cosine similarities. Searches can be delayed or forced to fail per tier.
#[derive(Default)]
pub struct MemoryIndex {
	records: Mutex<Vec<VectorRecord>>,
	failures: Mutex<Vec<FailurePredicate>>,
	latency: Mutex<Option<Duration>>,
	search_calls: AtomicUsize,
}
impl MemoryIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, chunk: Chunk, vector: Vec<f32>) {
		let record = VectorRecord::new(chunk, vector);
		let mut records = self.records.lock().unwrap_or_else(|err| err.into_inner());

		records.retain(|existing| existing.point_id != record.point_id);
		records.push(record);
	}

	pub fn len(&self) -> usize {
		self.records.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn records(&self) -> Vec<VectorRecord> {
		self.records.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn search_calls(&self) -> usize {
		self.search_calls.load(Ordering::SeqCst)
	}

	/// Makes every search planned for `tier` fail.
	pub fn fail_tier(&self, tier: SourceTier) {
		self.fail_when(move |filter| filter_tier(filter) == Some(tier));
	}

	pub fn fail_when<F>(&self, predicate: F)
	where
		F: Fn(&SearchFilter) -> bool + Send + Sync + 'static,
	{
		self.failures.lock().unwrap_or_else(|err| err.into_inner()).push(Arc::new(predicate));
	}

	pub fn set_latency(&self, latency: Duration) {
		*self.latency.lock().unwrap_or_else(|err| err.into_inner()) = Some(latency);
	}

	async fn search_records(
		&self,
		vector: &[f32],
		filter: &SearchFilter,
		top_k: u32,
	) -> rfp_storage::Result<Vec<VectorMatch>> {
		self.search_calls.fetch_add(1, Ordering::SeqCst);

		let latency = *self.latency.lock().unwrap_or_else(|err| err.into_inner());

		if let Some(latency) = latency {
			time::sleep(latency).await;
		}

		let should_fail = self
			.failures
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.iter()
			.any(|predicate| predicate(filter));

		if should_fail {
			return Err(rfp_storage::Error::Unavailable("Injected search failure.".to_string()));
		}

		let mut hits: Vec<VectorMatch> = self
			.records
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.iter()
			.filter(|record| filter.matches(&record.chunk))
			.map(|record| VectorMatch {
				point_id: record.point_id.to_string(),
				raw_score: cosine(vector, &record.vector),
				chunk: record.chunk.clone(),
			})
			.collect();

		hits.sort_by(|a, b| b.raw_score.total_cmp(&a.raw_score));
		hits.truncate(clamp_top_k(top_k) as usize);

		Ok(hits)
	}
}
impl VectorIndex for MemoryIndex {
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		filter: &'a SearchFilter,
		top_k: u32,
	) -> BoxFuture<'a, rfp_storage::Result<Vec<VectorMatch>>> {
		Box::pin(self.search_records(vector, filter, top_k))
	}

	fn upsert<'a>(&'a self, records: &'a [VectorRecord]) -> BoxFuture<'a, rfp_storage::Result<()>> {
		Box::pin(async move {
			for record in records {
				self.insert(record.chunk.clone(), record.vector.clone());
			}

			Ok(())
		})
	}

	fn delete_document<'a>(
		&'a self,
		tenant_id: &'a TenantId,
		document_id: &'a str,
	) -> BoxFuture<'a, rfp_storage::Result<()>> {
		Box::pin(async move {
			self.records.lock().unwrap_or_else(|err| err.into_inner()).retain(|record| {
				record.chunk.tenant_id != *tenant_id || record.chunk.document_id != document_id
			});

			Ok(())
		})
	}

	fn delete_tenant<'a>(&'a self, tenant_id: &'a TenantId) -> BoxFuture<'a, rfp_storage::Result<()>> {
		Box::pin(async move {
			self.records
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.retain(|record| record.chunk.tenant_id != *tenant_id);

			Ok(())
		})
	}
}

/// A uniquely named collection on a live Qdrant, deleted by [`TestCollection::cleanup`].
pub struct TestCollection {
	pub name: String,
	client: Qdrant,
}
impl TestCollection {
	pub fn new(qdrant_url: &str, prefix: &str) -> Result<Self> {
		let client = Qdrant::from_url(qdrant_url)
			.build()
			.map_err(|err| Error::Message(format!("Failed to build Qdrant client: {err}.")))?;

		Ok(Self { name: format!("{prefix}_{}", Uuid::new_v4().simple()), client })
	}

	pub async fn cleanup(self) -> Result<()> {
		time::timeout(Duration::from_secs(10), self.client.delete_collection(self.name.clone()))
			.await
			.map_err(|_| Error::Message("Qdrant delete_collection timed out.".to_string()))??;

		Ok(())
	}
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("RFP_QDRANT_URL").ok()
}

pub fn tenant(raw: &str) -> TenantId {
	TenantId::new(raw).unwrap_or_else(|err| panic!("Invalid test tenant {raw:?}: {err}."))
}

/// Axis-aligned unit vector, the usual query vector in tests.
pub fn unit_vector(dim: usize, axis: usize) -> Vec<f32> {
	let mut vec = vec![0.0; dim];

	vec[axis % dim] = 1.0;

	vec
}

/// A unit vector whose cosine similarity with `unit_vector(dim, 0)` is `similarity`.
pub fn vector_with_similarity(dim: usize, similarity: f32) -> Vec<f32> {
	assert!(dim >= 2, "Need at least two dimensions.");

	let mut vec = vec![0.0; dim];

	vec[0] = similarity;
	vec[1] = (1.0 - similarity * similarity).max(0.0).sqrt();

	vec
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	dot / (norm_a * norm_b)
}

/// The tier a planned filter targets; a document-only filter is the pinned tier.
pub fn filter_tier(filter: &SearchFilter) -> Option<SourceTier> {
	let mut pinned = false;

	for predicate in filter.predicates() {
		match predicate {
			Predicate::SourceTier(tier) => return Some(*tier),
			Predicate::DocumentId(_) => pinned = true,
			_ => {},
		}
	}

	pinned.then_some(SourceTier::Pinned)
}
