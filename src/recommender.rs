// ---------------------------------------------------------------------------
// Recommender — single entry point over the scoring pipeline
// ---------------------------------------------------------------------------
//
// query -> QueryVectorizer -> {LatentFactorScorer | NeighborScorer} -> rank
//
// A `Recommender` holds no per-request state; every call is a pure function
// of its inputs and the shared `ModelStore`.
// ---------------------------------------------------------------------------

use std::sync::Arc;

use crate::catalog::TitleSource;
use crate::error::RecommendError;
use crate::factor::LatentFactorScorer;
use crate::neighbors::NeighborScorer;
use crate::ranking::{rank, validate_k};
use crate::scoring::Scorer;
use crate::store::ModelStore;
use crate::types::{Candidate, ItemId, RatingScale, RecommendedItem, Strategy, UserQuery};
use crate::vectorize::QueryVectorizer;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A validated recommendation request. Construction fails fast on an unknown
/// strategy name or a non-positive `k`, before any scoring work.
#[derive(Debug, Clone)]
pub struct RecommendRequest {
	pub query: UserQuery,
	pub strategy: Strategy,
	pub k: usize,
}

impl RecommendRequest {
	pub fn new(query: UserQuery, strategy: &str, k: i64) -> Result<Self, RecommendError> {
		let strategy = strategy.parse()?;
		let k = validate_k(k)?;
		Ok(Self { query, strategy, k })
	}
}

// ---------------------------------------------------------------------------
// Recommender
// ---------------------------------------------------------------------------

pub struct Recommender {
	store: Arc<ModelStore>,
	scale: RatingScale,
	title_source: Option<Arc<dyn TitleSource>>,
}

impl Recommender {
	pub fn new(store: Arc<ModelStore>, scale: RatingScale) -> Self {
		Self {
			store,
			scale,
			title_source: None,
		}
	}

	/// Resolve titles through an external metadata source instead of the
	/// titles shipped with the catalog.
	pub fn with_title_source(mut self, source: Arc<dyn TitleSource>) -> Self {
		self.title_source = Some(source);
		self
	}

	pub fn store(&self) -> &ModelStore {
		&self.store
	}

	pub fn rating_scale(&self) -> RatingScale {
		self.scale
	}

	fn scorer(&self, strategy: Strategy) -> Box<dyn Scorer + '_> {
		let store = &*self.store;
		match strategy {
			Strategy::LatentFactor => Box::new(LatentFactorScorer::new(store.factors(), store.catalog())),
			Strategy::Neighbor => Box::new(NeighborScorer::new(
				store.neighbors(),
				store.ratings(),
				store.catalog(),
			)),
		}
	}

	/// Top-`k` unseen items with their predicted scores.
	pub fn recommend_scored(
		&self,
		query: &UserQuery,
		strategy: Strategy,
		k: usize,
	) -> Result<Vec<Candidate>, RecommendError> {
		if k == 0 {
			return Err(RecommendError::InvalidK(0));
		}
		let vector = QueryVectorizer::new(self.store.catalog(), self.scale).vectorize(query)?;
		let scorer = self.scorer(strategy);
		let candidates = scorer.score(&vector)?;
		let ranked = rank(candidates, &vector.rated, k)?;

		tracing::debug!(
			strategy = %scorer.strategy(),
			k,
			rated = query.len(),
			returned = ranked.len(),
			cold = vector.is_cold(),
			"recommendation computed"
		);
		Ok(ranked)
	}

	/// Top-`k` unseen item ids, best first.
	pub fn recommend(
		&self,
		query: &UserQuery,
		strategy: Strategy,
		k: usize,
	) -> Result<Vec<ItemId>, RecommendError> {
		Ok(self
			.recommend_scored(query, strategy, k)?
			.into_iter()
			.map(|c| c.item)
			.collect())
	}

	/// Ranked items with titles resolved where available.
	pub fn recommend_with_titles(
		&self,
		request: &RecommendRequest,
	) -> Result<Vec<RecommendedItem>, RecommendError> {
		let ranked = self.recommend_scored(&request.query, request.strategy, request.k)?;
		let ids: Vec<ItemId> = ranked.iter().map(|c| c.item).collect();
		let titles = self.titles(&ids);
		Ok(ranked
			.into_iter()
			.zip(titles)
			.map(|(c, title)| RecommendedItem {
				id: c.item,
				score: c.score,
				title,
			})
			.collect())
	}

	/// Titles in the same order as `ids`. A missing title is not an error.
	pub fn titles(&self, ids: &[ItemId]) -> Vec<Option<String>> {
		ids.iter()
			.map(|id| {
				let title = match &self.title_source {
					Some(source) => source.title(*id),
					None => self.store.titles().title(*id),
				};
				if title.is_none() {
					tracing::debug!(item = %id, "no title for item");
				}
				title
			})
			.collect()
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
