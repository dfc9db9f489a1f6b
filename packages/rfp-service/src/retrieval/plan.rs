use rfp_domain::{Depth, Outcome, SearchFilter, SourceTier};

use crate::retrieval::RetrievalQuery;

/// One concrete search against the index.
#[derive(Clone, Debug, PartialEq)]
pub struct TierPlan {
	pub tier: SourceTier,
	pub filter: SearchFilter,
	pub top_k: u32,
	/// Broader filter to run when `filter` yields nothing.
	pub fallback: Option<SearchFilter>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TierPlans {
	pub pinned: Option<TierPlan>,
	pub support: TierPlan,
	pub historical: TierPlan,
}
impl TierPlans {
	pub fn iter(&self) -> impl Iterator<Item = &TierPlan> {
		self.pinned.iter().chain([&self.support, &self.historical])
	}
}

/// Builds the per-tier filters for `query`. Pure: the same query and config always yield
/// the same plans.
pub fn plan_tiers(query: &RetrievalQuery, cfg: &rfp_config::Retrieval) -> TierPlans {
	let tenant_id = &query.tenant_id;
	let pinned = non_blank(query.pinned_source_id.as_deref()).map(|document_id| TierPlan {
		tier: SourceTier::Pinned,
		filter: SearchFilter::for_tenant(tenant_id.clone()).with_document(document_id),
		top_k: cfg.pinned_top_k,
		fallback: None,
	});
	let support_base = SearchFilter::for_tenant(tenant_id.clone()).with_tier(SourceTier::Support);
	let support = match non_blank(query.category.as_deref()) {
		Some(category) => {
			let mut categories = vec![category.to_string()];

			if category != cfg.general_category {
				categories.push(cfg.general_category.clone());
			}

			TierPlan {
				tier: SourceTier::Support,
				filter: support_base.clone().with_categories(categories),
				top_k: cfg.support_top_k,
				fallback: cfg.category_fallback.then_some(support_base),
			}
		},
		None => TierPlan {
			tier: SourceTier::Support,
			filter: support_base,
			top_k: cfg.support_top_k,
			fallback: None,
		},
	};
	let mut historical_filter =
		SearchFilter::for_tenant(tenant_id.clone()).with_tier(SourceTier::Historical);

	if query.depth == Depth::Basic {
		historical_filter = historical_filter.with_outcome(Outcome::Won);
	}

	let historical = TierPlan {
		tier: SourceTier::Historical,
		filter: historical_filter,
		top_k: cfg.historical_top_k,
		fallback: None,
	};

	TierPlans { pinned, support, historical }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}
