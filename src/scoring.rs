use crate::error::RecommendError;
use crate::types::{Candidate, ItemId, Strategy};
use crate::vectorize::QueryVector;

/// Produces a Candidate Score List for one query.
pub trait Scorer {
	fn strategy(&self) -> Strategy;

	fn score(&self, query: &QueryVector) -> Result<Vec<Candidate>, RecommendError>;
}

/// Reject a score the loaded model should never produce.
pub(crate) fn finite_candidate(
	strategy: Strategy,
	item: ItemId,
	score: f64,
) -> Result<Candidate, RecommendError> {
	if !score.is_finite() {
		return Err(RecommendError::NonFinite {
			strategy,
			item,
			value: score,
		});
	}
	Ok(Candidate { item, score })
}
