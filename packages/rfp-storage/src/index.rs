use std::{future::Future, pin::Pin};

use crate::Result;
use rfp_config::MAX_TOP_K;
use rfp_domain::{SearchFilter, TenantId, VectorMatch, VectorRecord};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Tenant-partitioned similarity search over stored chunks.
///
/// Searches take a [`SearchFilter`], which cannot be built without a tenant, so no
/// implementation can be asked for an unscoped query.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	/// Returns at most `clamp_top_k(top_k)` hits ordered by decreasing raw score.
	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		filter: &'a SearchFilter,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<VectorMatch>>>;

	fn upsert<'a>(&'a self, records: &'a [VectorRecord]) -> BoxFuture<'a, Result<()>>;

	fn delete_document<'a>(
		&'a self,
		tenant_id: &'a TenantId,
		document_id: &'a str,
	) -> BoxFuture<'a, Result<()>>;

	/// Removes every stored chunk of one tenant and nothing else.
	fn delete_tenant<'a>(&'a self, tenant_id: &'a TenantId) -> BoxFuture<'a, Result<()>>;
}

pub fn clamp_top_k(top_k: u32) -> u32 {
	top_k.min(MAX_TOP_K)
}
