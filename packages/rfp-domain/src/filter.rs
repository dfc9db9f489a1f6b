use crate::{Chunk, Outcome, SourceTier, TenantId};

/// One conjunctive predicate beyond the mandatory tenant scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
	DocumentId(String),
	SourceTier(SourceTier),
	CategoryAnyOf(Vec<String>),
	Outcome(Outcome),
}
impl Predicate {
	pub fn matches(&self, chunk: &Chunk) -> bool {
		match self {
			Self::DocumentId(id) => chunk.document_id == *id,
			Self::SourceTier(tier) => chunk.tier == *tier,
			Self::CategoryAnyOf(categories) => chunk
				.category
				.as_deref()
				.is_some_and(|category| categories.iter().any(|c| c == category)),
			Self::Outcome(outcome) => chunk.outcome == Some(*outcome),
		}
	}
}

/// A search filter that always carries exactly one tenant.
///
/// The tenant is fixed at construction and cannot be removed or replaced, so every index
/// query is tenant scoped by its type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchFilter {
	tenant_id: TenantId,
	predicates: Vec<Predicate>,
}
impl SearchFilter {
	pub fn for_tenant(tenant_id: TenantId) -> Self {
		Self { tenant_id, predicates: Vec::new() }
	}

	pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
		self.predicates.push(Predicate::DocumentId(document_id.into()));

		self
	}

	pub fn with_tier(mut self, tier: SourceTier) -> Self {
		self.predicates.push(Predicate::SourceTier(tier));

		self
	}

	pub fn with_categories(mut self, categories: Vec<String>) -> Self {
		self.predicates.push(Predicate::CategoryAnyOf(categories));

		self
	}

	pub fn with_outcome(mut self, outcome: Outcome) -> Self {
		self.predicates.push(Predicate::Outcome(outcome));

		self
	}

	pub fn tenant_id(&self) -> &TenantId {
		&self.tenant_id
	}

	pub fn predicates(&self) -> &[Predicate] {
		&self.predicates
	}

	pub fn matches(&self, chunk: &Chunk) -> bool {
		chunk.tenant_id == self.tenant_id && self.predicates.iter().all(|p| p.matches(chunk))
	}
}
