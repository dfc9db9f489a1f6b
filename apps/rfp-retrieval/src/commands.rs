use std::{fs, path::Path, time::Duration};

use color_eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{QueryArgs, SourcesArgs};
use rfp_domain::TenantId;
use rfp_service::{
	Availability, DocumentInput, RetrievalQuery, RetrievalResult, RfpService, SourceQuery,
	assemble_context, assess_availability,
};
use rfp_storage::qdrant::QdrantStore;

#[derive(Serialize)]
struct QueryOutput<'a> {
	availability: Availability,
	result: &'a RetrievalResult,
}

#[derive(Serialize)]
struct IngestOutput {
	document_id: String,
	indexed: usize,
	batches: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IngestFile {
	Many(Vec<DocumentInput>),
	One(Box<DocumentInput>),
}

pub async fn init(store: &QdrantStore) -> Result<()> {
	store.ensure_collection().await?;

	tracing::info!(collection = %store.collection, "Collection is ready.");

	Ok(())
}

pub async fn query(service: &RfpService, args: &QueryArgs) -> Result<()> {
	let query = build_query(args)?;
	let result = service.retrieve(&query).await?;
	let availability = assess_availability(&result, service.cfg.retrieval.min_relevance_score);

	print_json(&QueryOutput { availability, result: &result })
}

pub async fn context(service: &RfpService, args: &QueryArgs) -> Result<()> {
	let query = build_query(args)?;
	let result = service.retrieve(&query).await?;
	let availability = assess_availability(&result, service.cfg.retrieval.min_relevance_score);

	if !availability.available {
		tracing::warn!(
			tenant_id = %query.tenant_id,
			candidate_count = result.candidate_count,
			"No match cleared the relevance threshold."
		);
	}
	if result.is_degraded() {
		tracing::warn!(degraded = ?result.degraded, "Context was assembled from a degraded result.");
	}

	println!("{}", assemble_context(&result, &service.cfg.context));

	Ok(())
}

pub async fn ingest(service: &RfpService, path: &Path) -> Result<()> {
	let raw = fs::read_to_string(path)
		.map_err(|err| eyre::eyre!("Failed to read {}: {err}.", path.display()))?;
	let documents = parse_documents(&raw)?;
	let mut outputs = Vec::with_capacity(documents.len());

	for document in documents {
		let document_id = document.document_id.clone();
		let report = service.index_document(document).await?;

		outputs.push(IngestOutput { document_id, indexed: report.indexed, batches: report.batches });
	}

	print_json(&outputs)
}

pub async fn delete(service: &RfpService, tenant: &str, document_id: &str) -> Result<()> {
	let tenant_id = TenantId::new(tenant)?;

	service.delete_document(&tenant_id, document_id).await?;

	Ok(())
}

pub async fn purge(service: &RfpService, tenant: &str, confirmed: bool) -> Result<()> {
	let tenant_id = TenantId::new(tenant)?;

	if !confirmed {
		return Err(eyre::eyre!("Refusing to purge tenant {tenant_id} without --yes."));
	}

	service.delete_tenant(&tenant_id).await?;

	Ok(())
}

pub async fn sources(service: &RfpService, args: &SourcesArgs) -> Result<()> {
	let query = build_source_query(args)?;
	let ranked = service.rank_sources(&query).await?;

	print_json(&ranked)
}

pub fn build_query(args: &QueryArgs) -> Result<RetrievalQuery> {
	let mut query = RetrievalQuery::new(TenantId::new(args.tenant.as_str())?, args.question.clone());

	query.category = args.category.clone();
	query.pinned_source_id = args.pinned_source.clone();
	query.depth = args.depth;
	query.budget = args.budget;
	query.deadline = args.deadline_ms.map(|ms| Instant::now() + Duration::from_millis(ms));

	Ok(query)
}

pub fn build_source_query(args: &SourcesArgs) -> Result<SourceQuery> {
	let mut query = SourceQuery::new(TenantId::new(args.tenant.as_str())?, args.question.clone());

	query.only_won = args.only_won;
	query.exclude_document_id = args.exclude.clone();
	query.limit = args.limit;
	query.deadline = args.deadline_ms.map(|ms| Instant::now() + Duration::from_millis(ms));

	Ok(query)
}

/// Accepts either one document object or an array of them.
pub fn parse_documents(raw: &str) -> Result<Vec<DocumentInput>> {
	let file: IngestFile = serde_json::from_str(raw)
		.map_err(|err| eyre::eyre!("Failed to parse ingestion file: {err}."))?;

	Ok(match file {
		IngestFile::Many(documents) => documents,
		IngestFile::One(document) => vec![*document],
	})
}

fn print_json<T>(value: &T) -> Result<()>
where
	T: Serialize,
{
	println!("{}", serde_json::to_string_pretty(value)?);

	Ok(())
}
